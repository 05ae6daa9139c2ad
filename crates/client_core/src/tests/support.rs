use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chain::{ChainClient, ChainError, LocalChain};
use shared::{
    domain::{Address, TokenAmount, TxHash},
    protocol::{CallRequest, TransactionReceipt, TransactionRequest},
};
use storage::StaticArtifacts;
use tempfile::TempDir;

use crate::{
    action_client::ActionClient,
    confirm::ConfirmationPolicy,
    deploy::{CookBookParams, DeployConfig, DeployTag, DeploySummary, Orchestrator},
    metadata::InMemoryContentStore,
    token::Erc20Client,
};

pub(crate) fn fast_confirmation() -> ConfirmationPolicy {
    ConfirmationPolicy {
        poll_interval: Duration::from_millis(1),
        timeout: Some(Duration::from_secs(1)),
    }
}

pub(crate) fn local_config(hub: Address) -> DeployConfig {
    DeployConfig {
        lens_hub: hub,
        module_registry: None,
        metadata_uri_scheme: "ar".into(),
        confirmation: fast_confirmation(),
        settle_delay: Duration::ZERO,
        cook_book: CookBookParams::default(),
    }
}

pub(crate) struct LocalEnv {
    pub chain: Arc<LocalChain>,
    pub accounts: Vec<Address>,
    pub uploads: Arc<InMemoryContentStore>,
    pub dir: TempDir,
}

impl LocalEnv {
    pub async fn new() -> Self {
        let chain = Arc::new(LocalChain::new());
        let accounts = chain.accounts().await.expect("accounts");
        Self {
            chain,
            accounts,
            uploads: Arc::new(InMemoryContentStore::new()),
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn owner(&self) -> Address {
        self.accounts[0]
    }

    pub fn orchestrator(&self, config: DeployConfig) -> Orchestrator {
        Orchestrator::new(
            self.chain.clone(),
            Arc::new(StaticArtifacts::new(LocalChain::artifacts())),
            storage::DeploymentStore::new(self.dir.path(), "localhost"),
            self.uploads.clone(),
            config,
            self.owner(),
        )
    }

    /// Full local deployment with the owner acting as hub.
    pub async fn deploy_all(&self) -> DeploySummary {
        self.orchestrator(local_config(self.owner()))
            .run(&[DeployTag::All], true)
            .await
            .expect("deploy")
    }

    pub fn action_client(&self, module: Address) -> ActionClient {
        ActionClient::new(self.chain.clone(), module).with_confirmation(fast_confirmation())
    }

    pub fn token(&self, token: Address) -> Erc20Client {
        Erc20Client::new(self.chain.clone(), token).with_confirmation(fast_confirmation())
    }
}

pub(crate) fn one_token() -> TokenAmount {
    TokenAmount::parse_ether("1").expect("amount")
}

/// Accepts transactions but never mines them.
pub(crate) struct StalledChain;

#[async_trait]
impl ChainClient for StalledChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(1)
    }

    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        Ok(vec![Address([0x01; 20])])
    }

    async fn send_transaction(&self, _tx: TransactionRequest) -> Result<TxHash, ChainError> {
        Ok(TxHash([0xab; 32]))
    }

    async fn call(&self, _call: CallRequest) -> Result<Vec<u8>, ChainError> {
        Err(ChainError::Transport("offline".into()))
    }

    async fn transaction_receipt(
        &self,
        _hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        Ok(None)
    }
}
