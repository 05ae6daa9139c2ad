use abi::Revert;
use async_trait::async_trait;
use shared::{
    domain::{Address, TxHash},
    protocol::{CallRequest, TransactionReceipt, TransactionRequest},
};
use thiserror::Error;

pub mod local;
pub mod rpc;

pub use local::{LocalChain, LocalContractKind};
pub use rpc::{RpcChain, RpcConfig};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("execution reverted: {}", Revert::decode(.data).describe())]
    Reverted { data: Vec<u8> },
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),
    #[error("account {0} is not managed by this node")]
    UnknownAccount(Address),
    #[error("creation code does not match any known contract")]
    UnknownCreationCode,
}

impl ChainError {
    /// Revert payload, when the failure came from contract execution.
    pub fn revert(&self) -> Option<Revert> {
        match self {
            ChainError::Reverted { data } => Some(Revert::decode(data)),
            _ => None,
        }
    }
}

/// The on-chain service the tooling drives. Transactions are sent from
/// node-managed accounts; signing never happens client-side.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, ChainError>;
    async fn accounts(&self) -> Result<Vec<Address>, ChainError>;
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ChainError>;
    async fn call(&self, call: CallRequest) -> Result<Vec<u8>, ChainError>;
    async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, ChainError>;
}
