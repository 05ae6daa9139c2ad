use std::sync::Arc;

use abi::{
    codec::expect_arity,
    decode, lens_module_interface_id,
    recipe::{
        decode_module_event, encode_call, encode_initialize_call, encode_process_call, errors,
        module_fn,
    },
    AbiError, ParamType, Token,
};
use chain::{ChainClient, ChainError};
use shared::{
    domain::{Address, PublicationRef, Selector, TokenAmount, TxHash},
    error::{ErrorCode, ErrorReport},
    protocol::{
        CallRequest, InitializeActionCall, ModuleEvent, ProcessActionParams, TransactionReceipt,
        TransactionRequest,
    },
};
use thiserror::Error;
use tracing::info;

use crate::confirm::{wait_for_receipt, ConfirmError, ConfirmationPolicy};

pub use abi::recipe::{encode_init_data, encode_process_data};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("currency is not registered with the module registry")]
    UnsupportedCurrency,
    #[error("no tip receiver registered for this publication")]
    ReceiverNotFound,
    #[error("caller is not the hub")]
    NotHub,
    #[error("initialize data is invalid")]
    InitParamsInvalid,
    #[error("transaction reverted: {reason}")]
    Reverted { reason: String },
    #[error("confirmation event {0} missing from receipt")]
    MissingEvent(&'static str),
    #[error(transparent)]
    Confirmation(ConfirmError),
    #[error(transparent)]
    Chain(ChainError),
    #[error("malformed module response: {0}")]
    Abi(#[from] AbiError),
}

impl ActionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ActionError::UnsupportedCurrency => ErrorCode::UnsupportedCurrency,
            ActionError::ReceiverNotFound => ErrorCode::ReceiverNotFound,
            ActionError::NotHub => ErrorCode::Unauthorized,
            ActionError::InitParamsInvalid => ErrorCode::Validation,
            ActionError::Reverted { .. } | ActionError::MissingEvent(_) => ErrorCode::Reverted,
            ActionError::Confirmation(ConfirmError::Timeout { .. }) => ErrorCode::Timeout,
            ActionError::Confirmation(ConfirmError::Failed { .. }) => ErrorCode::Reverted,
            ActionError::Confirmation(ConfirmError::Chain(_)) | ActionError::Chain(_) => {
                ErrorCode::Transport
            }
            ActionError::Abi(_) => ErrorCode::Internal,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.code(), self.to_string())
    }
}

impl From<ChainError> for ActionError {
    fn from(err: ChainError) -> Self {
        let Some(revert) = err.revert() else {
            return ActionError::Chain(err);
        };
        if revert.is_custom(errors::CURRENCY_NOT_WHITELISTED) {
            ActionError::UnsupportedCurrency
        } else if revert.is_custom(errors::TIP_RECEIVER_NOT_FOUND) {
            ActionError::ReceiverNotFound
        } else if revert.is_custom(errors::NOT_HUB) {
            ActionError::NotHub
        } else if revert.is_custom(errors::INIT_PARAMS_INVALID) {
            ActionError::InitParamsInvalid
        } else {
            ActionError::Reverted {
                reason: revert.describe(),
            }
        }
    }
}

impl From<ConfirmError> for ActionError {
    fn from(err: ConfirmError) -> Self {
        match err {
            ConfirmError::Chain(err) => err.into(),
            other => ActionError::Confirmation(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeOutcome {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub publication: PublicationRef,
    pub tip_receiver: Address,
}

/// A confirmed tip, as reported by the module's `TipCreated` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub transaction_executor: Address,
    pub tip_receiver: Address,
    pub currency: Address,
    pub tip_amount: TokenAmount,
}

/// Drives the two-phase open action protocol against one deployed module.
#[derive(Clone)]
pub struct ActionClient {
    chain: Arc<dyn ChainClient>,
    module: Address,
    confirmation: ConfirmationPolicy,
}

impl ActionClient {
    pub fn new(chain: Arc<dyn ChainClient>, module: Address) -> Self {
        Self {
            chain,
            module,
            confirmation: ConfirmationPolicy::default(),
        }
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn module(&self) -> Address {
        self.module
    }

    pub fn confirmation(&self) -> ConfirmationPolicy {
        self.confirmation
    }

    async fn transact(
        &self,
        from: Address,
        data: Vec<u8>,
        value: TokenAmount,
    ) -> Result<TransactionReceipt, ActionError> {
        let tx = TransactionRequest::call(from, self.module, data).with_value(value);
        let hash = self.chain.send_transaction(tx).await?;
        Ok(wait_for_receipt(self.chain.as_ref(), hash, self.confirmation).await?)
    }

    async fn read(&self, data: Vec<u8>, returns: ParamType) -> Result<Token, ActionError> {
        let output = self
            .chain
            .call(CallRequest {
                from: None,
                to: self.module,
                data,
            })
            .await?;
        let [value] = expect_arity(decode(&[returns], &output)?)?;
        Ok(value)
    }

    fn module_events(&self, receipt: &TransactionReceipt) -> Result<Vec<ModuleEvent>, AbiError> {
        let mut events = Vec::new();
        for log in receipt.logs.iter().filter(|log| log.address == self.module) {
            if let Some(event) = decode_module_event(log)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Registers the tip receiver for a publication. `from` must be the hub.
    pub async fn initialize(
        &self,
        from: Address,
        call: &InitializeActionCall,
    ) -> Result<InitializeOutcome, ActionError> {
        let data = encode_initialize_call(
            call.profile_id,
            call.publication_id,
            call.transaction_executor,
            &call.data,
        );
        let receipt = self.transact(from, data, TokenAmount::ZERO).await?;

        let registered = self.module_events(&receipt)?.into_iter().find_map(|event| match event {
            ModuleEvent::TipReceiverRegistered {
                profile_id,
                publication_id,
                tip_receiver,
            } => Some((PublicationRef::new(profile_id, publication_id), tip_receiver)),
            ModuleEvent::TipCreated { .. } => None,
        });
        let (publication, tip_receiver) =
            registered.ok_or(ActionError::MissingEvent("TipReceiverRegistered"))?;

        info!(
            %publication,
            %tip_receiver,
            block = receipt.block_number,
            "tip receiver registered"
        );
        Ok(InitializeOutcome {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            publication,
            tip_receiver,
        })
    }

    /// Executes the action for a publication, moving the tip from the
    /// transaction executor to the registered receiver.
    pub async fn process(
        &self,
        from: Address,
        params: &ProcessActionParams,
        value: TokenAmount,
    ) -> Result<ProcessOutcome, ActionError> {
        let receipt = self
            .transact(from, encode_process_call(params), value)
            .await?;

        let outcome = self
            .module_events(&receipt)?
            .into_iter()
            .find_map(|event| match event {
                ModuleEvent::TipCreated {
                    transaction_executor,
                    tip_receiver,
                    currency,
                    tip_amount,
                } => Some(ProcessOutcome {
                    transaction_hash: receipt.transaction_hash,
                    block_number: receipt.block_number,
                    transaction_executor,
                    tip_receiver,
                    currency,
                    tip_amount,
                }),
                ModuleEvent::TipReceiverRegistered { .. } => None,
            })
            .ok_or(ActionError::MissingEvent("TipCreated"))?;

        info!(
            publication = %params.publication(),
            tip_receiver = %outcome.tip_receiver,
            currency = %outcome.currency,
            amount = %outcome.tip_amount,
            block = outcome.block_number,
            "tip created"
        );
        Ok(outcome)
    }

    /// Recorded receiver, or `None` while the publication is uninitialized.
    pub async fn tip_receiver(
        &self,
        publication: PublicationRef,
    ) -> Result<Option<Address>, ActionError> {
        let data = encode_call(
            module_fn::GET_TIP_RECEIVER,
            &[
                Token::uint(publication.profile_id.0),
                Token::uint(publication.publication_id.0),
            ],
        );
        let receiver = self.read(data, ParamType::Address).await?.into_address()?;
        Ok((!receiver.is_zero()).then_some(receiver))
    }

    pub async fn supports_interface(&self, interface_id: Selector) -> Result<bool, ActionError> {
        let data = encode_call(
            module_fn::SUPPORTS_INTERFACE,
            &[Token::FixedBytes(interface_id.0.to_vec())],
        );
        Ok(self.read(data, ParamType::Bool).await?.into_bool()?)
    }

    pub async fn supports_lens_module(&self) -> Result<bool, ActionError> {
        self.supports_interface(lens_module_interface_id()).await
    }

    pub async fn module_metadata_uri(&self) -> Result<String, ActionError> {
        let data = encode_call(module_fn::GET_MODULE_METADATA_URI, &[]);
        Ok(self.read(data, ParamType::String).await?.into_string()?)
    }
}

#[cfg(test)]
#[path = "tests/action_client_tests.rs"]
mod tests;
