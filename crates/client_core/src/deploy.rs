//! Ordered deployment of the CookBook collection and the recipe action
//! module, including metadata publication and registry registration.

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use abi::{
    codec::word_to_u128,
    encode,
    recipe::{encode_call, module_fn, registry_fn},
    Token,
};
use chain::{ChainClient, ChainError};
use chrono::Utc;
use shared::{
    domain::{encode_prefixed_hex, Address, TxHash},
    error::{ErrorCode, ErrorReport},
    protocol::{TransactionReceipt, TransactionRequest},
};
use storage::{ArtifactSource, DeploymentRecord, DeploymentStore, StorageError};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    confirm::{wait_for_receipt, ConfirmError, ConfirmationPolicy},
    metadata::{publish_metadata, recipe_module_metadata, MetadataUploader, PublishError},
    settings::Settings,
};

pub const COOK_BOOK: &str = "CookBook";
pub const MOCK_MODULE_REGISTRY: &str = "MockModuleRegistry";
pub const TEST_TOKEN: &str = "TestToken";
pub const RECIPE_ACTION_MODULE: &str = "RecipeActionModule";

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("module registry unresolved: no MockModuleRegistry deployment on '{network}' and MODULE_REGISTRY is not set")]
    RegistryUnresolved { network: String },
    #[error("deployment of {name} in {hash} produced no contract address")]
    MissingContractAddress { name: String, hash: TxHash },
    #[error("module registration failed: {reason}")]
    Registration { reason: String },
    #[error("unknown deploy tag '{0}'")]
    UnknownTag(String),
    #[error("node manages no accounts to deploy from")]
    NoDeployer,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Confirmation(#[from] ConfirmError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl DeployError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DeployError::RegistryUnresolved { .. } => ErrorCode::NotFound,
            DeployError::Storage(err) => err.code(),
            DeployError::UnknownTag(_) => ErrorCode::Validation,
            DeployError::Registration { .. } => ErrorCode::Reverted,
            DeployError::Confirmation(ConfirmError::Timeout { .. }) => ErrorCode::Timeout,
            DeployError::Confirmation(ConfirmError::Failed { .. }) => ErrorCode::Reverted,
            DeployError::Chain(ChainError::Reverted { .. }) => ErrorCode::Reverted,
            DeployError::Chain(_)
            | DeployError::Confirmation(ConfirmError::Chain(_))
            | DeployError::Publish(_) => ErrorCode::Transport,
            DeployError::MissingContractAddress { .. } | DeployError::NoDeployer => {
                ErrorCode::Internal
            }
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.code(), self.to_string())
    }
}

/// Selects deployment steps, in the manner of hardhat-deploy tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeployTag {
    All,
    CookBook,
    RecipeActionModule,
}

impl DeployTag {
    fn selects(tags: &[DeployTag], step: DeployTag) -> bool {
        tags.is_empty() || tags.iter().any(|tag| *tag == DeployTag::All || *tag == step)
    }
}

impl FromStr for DeployTag {
    type Err = DeployError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "all" | "All" => Ok(DeployTag::All),
            COOK_BOOK => Ok(DeployTag::CookBook),
            RECIPE_ACTION_MODULE => Ok(DeployTag::RecipeActionModule),
            other => Err(DeployError::UnknownTag(other.to_string())),
        }
    }
}

impl fmt::Display for DeployTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployTag::All => f.write_str("all"),
            DeployTag::CookBook => f.write_str(COOK_BOOK),
            DeployTag::RecipeActionModule => f.write_str(RECIPE_ACTION_MODULE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookBookParams {
    pub collection_metadata: String,
    pub max_supply: u128,
    /// Defaults to the deployer.
    pub royalty_receiver: Option<Address>,
    pub royalty_bps: u128,
}

impl Default for CookBookParams {
    fn default() -> Self {
        Self {
            collection_metadata: "ipfs://QmSU2R1ewXA7vmxD17KQTLRG1nu63KPxDmnb6xdtZ2Hmq5".into(),
            max_supply: 100,
            royalty_receiver: None,
            royalty_bps: 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub lens_hub: Address,
    pub module_registry: Option<Address>,
    pub metadata_uri_scheme: String,
    pub confirmation: ConfirmationPolicy,
    /// Extra wait after the metadata URI is confirmed, before registering.
    pub settle_delay: Duration,
    pub cook_book: CookBookParams,
}

impl DeployConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            lens_hub: settings.lens_hub,
            module_registry: settings.module_registry,
            metadata_uri_scheme: settings.metadata_uri_scheme.clone(),
            confirmation: settings.confirmation_policy(),
            settle_delay: settings.registration_settle_delay(),
            cook_book: CookBookParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDeployment {
    pub record: DeploymentRecord,
    pub registry: Address,
    pub metadata_uri: String,
    pub metadata_tx: TxHash,
    pub registration_tx: TxHash,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploySummary {
    pub cook_book: Option<DeploymentRecord>,
    pub registry: Option<DeploymentRecord>,
    pub test_token: Option<DeploymentRecord>,
    pub module: Option<ModuleDeployment>,
}

fn describe_arg(token: &Token) -> String {
    match token {
        Token::Address(address) => address.to_string(),
        Token::Uint(word) => word_to_u128(word)
            .map(|value| value.to_string())
            .unwrap_or_else(|_| encode_prefixed_hex(word)),
        Token::Bool(flag) => flag.to_string(),
        Token::String(value) => value.clone(),
        Token::FixedBytes(bytes) | Token::Bytes(bytes) => encode_prefixed_hex(bytes),
        Token::Array(items) | Token::Tuple(items) => format!(
            "[{}]",
            items.iter().map(describe_arg).collect::<Vec<_>>().join(",")
        ),
    }
}

pub struct Orchestrator {
    chain: Arc<dyn ChainClient>,
    artifacts: Arc<dyn ArtifactSource>,
    store: DeploymentStore,
    uploader: Arc<dyn MetadataUploader>,
    config: DeployConfig,
    deployer: Address,
}

impl Orchestrator {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        artifacts: Arc<dyn ArtifactSource>,
        store: DeploymentStore,
        uploader: Arc<dyn MetadataUploader>,
        config: DeployConfig,
        deployer: Address,
    ) -> Self {
        Self {
            chain,
            artifacts,
            store,
            uploader,
            config,
            deployer,
        }
    }

    /// Deploys from the node's first managed account.
    pub async fn with_first_account(
        chain: Arc<dyn ChainClient>,
        artifacts: Arc<dyn ArtifactSource>,
        store: DeploymentStore,
        uploader: Arc<dyn MetadataUploader>,
        config: DeployConfig,
    ) -> Result<Self, DeployError> {
        let deployer = chain
            .accounts()
            .await?
            .first()
            .copied()
            .ok_or(DeployError::NoDeployer)?;
        Ok(Self::new(chain, artifacts, store, uploader, config, deployer))
    }

    pub fn deployer(&self) -> Address {
        self.deployer
    }

    pub fn store(&self) -> &DeploymentStore {
        &self.store
    }

    async fn send_and_confirm(&self, tx: TransactionRequest) -> Result<TransactionReceipt, DeployError> {
        let hash = self.chain.send_transaction(tx).await?;
        Ok(wait_for_receipt(self.chain.as_ref(), hash, self.config.confirmation).await?)
    }

    /// Deploys `name` with ABI-encoded constructor `args` and records it.
    pub async fn deploy_contract(
        &self,
        name: &str,
        args: &[Token],
    ) -> Result<DeploymentRecord, DeployError> {
        let artifact = self.artifacts.load(name).await?;
        let code = artifact.creation_code(&encode(args));
        let receipt = self
            .send_and_confirm(TransactionRequest::create(self.deployer, code))
            .await?;
        let address = receipt
            .contract_address
            .ok_or_else(|| DeployError::MissingContractAddress {
                name: name.to_string(),
                hash: receipt.transaction_hash,
            })?;

        let record = DeploymentRecord {
            contract_name: name.to_string(),
            address,
            transaction_hash: receipt.transaction_hash,
            deployer: self.deployer,
            block_number: receipt.block_number,
            args: args.iter().map(describe_arg).collect(),
            deployed_at: Utc::now(),
        };
        self.store.save(&record).await?;
        info!(
            contract = name,
            %address,
            tx = %receipt.transaction_hash,
            block = receipt.block_number,
            "deployed"
        );
        Ok(record)
    }

    pub async fn deploy_cook_book(&self) -> Result<DeploymentRecord, DeployError> {
        let params = &self.config.cook_book;
        let royalty_receiver = params.royalty_receiver.unwrap_or(self.deployer);
        let record = self
            .deploy_contract(
                COOK_BOOK,
                &[
                    Token::String(params.collection_metadata.clone()),
                    Token::uint(params.max_supply),
                    Token::Address(royalty_receiver),
                    Token::uint(params.royalty_bps),
                ],
            )
            .await?;
        info!(address = %record.address, "CookBook contract deployed");
        Ok(record)
    }

    pub async fn deploy_mock_registry(&self) -> Result<DeploymentRecord, DeployError> {
        self.deploy_contract(MOCK_MODULE_REGISTRY, &[]).await
    }

    pub async fn deploy_test_token(&self) -> Result<DeploymentRecord, DeployError> {
        self.deploy_contract(TEST_TOKEN, &[]).await
    }

    pub async fn register_currency(
        &self,
        registry: Address,
        currency: Address,
    ) -> Result<TxHash, DeployError> {
        let data = encode_call(
            registry_fn::REGISTER_ERC20_CURRENCY,
            &[Token::Address(currency)],
        );
        let receipt = self
            .send_and_confirm(TransactionRequest::call(self.deployer, registry, data))
            .await?;
        info!(%registry, %currency, tx = %receipt.transaction_hash, "currency registered");
        Ok(receipt.transaction_hash)
    }

    /// Local mock registry first, then the configured address.
    pub async fn resolve_registry(&self) -> Result<Address, DeployError> {
        match self.store.get(MOCK_MODULE_REGISTRY).await {
            Ok(record) => return Ok(record.address),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }
        self.config
            .module_registry
            .ok_or_else(|| DeployError::RegistryUnresolved {
                network: self.store.network().to_string(),
            })
    }

    pub async fn deploy_recipe_module(&self) -> Result<ModuleDeployment, DeployError> {
        let registry = self.resolve_registry().await?;
        let record = self
            .deploy_contract(
                RECIPE_ACTION_MODULE,
                &[
                    Token::Address(self.config.lens_hub),
                    Token::Address(registry),
                ],
            )
            .await?;
        let module = record.address;

        let document = recipe_module_metadata()?;
        let metadata_uri = publish_metadata(
            self.uploader.as_ref(),
            &self.config.metadata_uri_scheme,
            &document,
        )
        .await?;

        let set_uri = encode_call(
            module_fn::SET_MODULE_METADATA_URI,
            &[Token::String(metadata_uri.clone())],
        );
        let metadata_receipt = self
            .send_and_confirm(TransactionRequest::call(self.deployer, module, set_uri))
            .await?;
        info!(
            %module,
            uri = %metadata_uri,
            block = metadata_receipt.block_number,
            "module metadata uri confirmed"
        );

        if !self.config.settle_delay.is_zero() {
            sleep(self.config.settle_delay).await;
        }

        let registration_tx = self.register_module(module).await?;
        Ok(ModuleDeployment {
            record,
            registry,
            metadata_uri,
            metadata_tx: metadata_receipt.transaction_hash,
            registration_tx,
        })
    }

    async fn register_module(&self, module: Address) -> Result<TxHash, DeployError> {
        let data = encode_call(module_fn::REGISTER_MODULE, &[]);
        let receipt = self
            .send_and_confirm(TransactionRequest::call(self.deployer, module, data))
            .await
            .map_err(|err| {
                warn!(%module, %err, "module registration failed");
                DeployError::Registration {
                    reason: err.to_string(),
                }
            })?;
        info!(tx = %receipt.transaction_hash, "registered open action");
        Ok(receipt.transaction_hash)
    }

    /// Runs the selected steps in dependency order. With the module selected,
    /// `local_mocks` first deploys a mock registry and a test token
    /// whitelisted in it.
    pub async fn run(
        &self,
        tags: &[DeployTag],
        local_mocks: bool,
    ) -> Result<DeploySummary, DeployError> {
        let mut summary = DeploySummary::default();

        if DeployTag::selects(tags, DeployTag::CookBook) {
            summary.cook_book = Some(self.deploy_cook_book().await?);
        }

        let module_selected = DeployTag::selects(tags, DeployTag::RecipeActionModule);
        if local_mocks && module_selected {
            let registry = self.deploy_mock_registry().await?;
            let token = self.deploy_test_token().await?;
            self.register_currency(registry.address, token.address)
                .await?;
            summary.registry = Some(registry);
            summary.test_token = Some(token);
        }

        if module_selected {
            summary.module = Some(self.deploy_recipe_module().await?);
        }

        Ok(summary)
    }
}

#[cfg(test)]
#[path = "tests/deploy_tests.rs"]
mod tests;
