use std::time::Duration;

use chain::{ChainClient, ChainError};
use shared::{domain::TxHash, protocol::TransactionReceipt};
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// How long to poll for a receipt before giving up. `timeout: None` waits
/// until the transaction is mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl ConfirmationPolicy {
    pub fn without_timeout(self) -> Self {
        Self {
            timeout: None,
            ..self
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfirmError {
    #[error("transaction {hash} not confirmed within {waited:?}")]
    Timeout { hash: TxHash, waited: Duration },
    #[error("transaction {hash} was mined in block {block_number} but failed")]
    Failed { hash: TxHash, block_number: u64 },
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Polls for the receipt of `hash` until it is mined or fails, or until the
/// policy timeout (if any) elapses.
pub async fn wait_for_receipt(
    chain: &dyn ChainClient,
    hash: TxHash,
    policy: ConfirmationPolicy,
) -> Result<TransactionReceipt, ConfirmError> {
    let started = Instant::now();
    loop {
        if let Some(receipt) = chain.transaction_receipt(hash).await? {
            if !receipt.status {
                return Err(ConfirmError::Failed {
                    hash,
                    block_number: receipt.block_number,
                });
            }
            debug!(%hash, block = receipt.block_number, "transaction confirmed");
            return Ok(receipt);
        }

        let pause = match policy.timeout {
            Some(timeout) => {
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(ConfirmError::Timeout { hash, waited });
                }
                policy.poll_interval.min(timeout - waited)
            }
            None => policy.poll_interval,
        };
        sleep(pause).await;
    }
}
