use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{
    domain::{decode_prefixed_hex, encode_prefixed_hex, Address, TxHash, B256},
    protocol::{CallRequest, LogEntry, TransactionReceipt, TransactionRequest},
};
use tracing::debug;
use url::Url;

use crate::{ChainClient, ChainError};

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    pub request_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".into(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// JSON-RPC 2.0 client for an Ethereum node with unlocked accounts.
pub struct RpcChain {
    http: Client,
    url: Url,
    next_id: AtomicU64,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: Address,
    topics: Vec<B256>,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    block_number: String,
    status: String,
    from: Address,
    #[serde(default)]
    to: Option<Address>,
    #[serde(default)]
    contract_address: Option<Address>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

pub(crate) fn parse_quantity(raw: &str) -> Result<u64, ChainError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::InvalidResponse(format!("quantity '{raw}' lacks 0x prefix")))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|err| ChainError::InvalidResponse(format!("quantity '{raw}': {err}")))
}

fn decode_hex_field(raw: &str) -> Result<Vec<u8>, ChainError> {
    decode_prefixed_hex(raw).map_err(|err| ChainError::InvalidResponse(err.to_string()))
}

impl TryFrom<RpcReceipt> for TransactionReceipt {
    type Error = ChainError;

    fn try_from(raw: RpcReceipt) -> Result<Self, Self::Error> {
        let logs = raw
            .logs
            .into_iter()
            .map(|log| {
                Ok(LogEntry {
                    address: log.address,
                    topics: log.topics,
                    data: decode_hex_field(&log.data)?,
                })
            })
            .collect::<Result<Vec<_>, ChainError>>()?;

        Ok(TransactionReceipt {
            transaction_hash: raw.transaction_hash,
            block_number: parse_quantity(&raw.block_number)?,
            status: parse_quantity(&raw.status)? == 1,
            from: raw.from,
            to: raw.to,
            contract_address: raw.contract_address,
            logs,
        })
    }
}

fn transaction_object(tx: &TransactionRequest) -> Value {
    let mut object = json!({
        "from": tx.from.to_string(),
        "data": encode_prefixed_hex(&tx.data),
        "value": format!("0x{:x}", tx.value.0),
    });
    if let Some(to) = tx.to {
        object["to"] = json!(to.to_string());
    }
    object
}

/// Nodes report reverts as an error whose `data` carries the revert payload,
/// either directly as a hex string or nested under `data.data`.
fn revert_payload(data: &Value) -> Option<Vec<u8>> {
    match data {
        Value::String(raw) => decode_prefixed_hex(raw).ok(),
        Value::Object(map) => map.get("data").and_then(revert_payload),
        _ => None,
    }
}

impl RpcChain {
    pub fn new(config: RpcConfig) -> Result<Self, ChainError> {
        let url = Url::parse(&config.url)
            .map_err(|err| ChainError::Transport(format!("invalid rpc url '{}': {err}", config.url)))?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ChainError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "rpc request");

        let response: RpcResponse = self
            .http
            .post(self.url.clone())
            .json(&RpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .map_err(|err| ChainError::Transport(err.to_string()))?
            .error_for_status()
            .map_err(|err| ChainError::Transport(err.to_string()))?
            .json()
            .await
            .map_err(|err| ChainError::InvalidResponse(err.to_string()))?;

        if let Some(error) = response.error {
            if let Some(data) = error.data.as_ref().and_then(revert_payload) {
                return Err(ChainError::Reverted { data });
            }
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|err| ChainError::InvalidResponse(err.to_string()))
    }
}

#[async_trait]
impl ChainClient for RpcChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        let raw: String = self.request("eth_chainId", json!([])).await?;
        parse_quantity(&raw)
    }

    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        self.request("eth_accounts", json!([])).await
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ChainError> {
        self.request("eth_sendTransaction", json!([transaction_object(&tx)]))
            .await
    }

    async fn call(&self, call: CallRequest) -> Result<Vec<u8>, ChainError> {
        let mut object = json!({
            "to": call.to.to_string(),
            "data": encode_prefixed_hex(&call.data),
        });
        if let Some(from) = call.from {
            object["from"] = json!(from.to_string());
        }
        let raw: String = self.request("eth_call", json!([object, "latest"])).await?;
        decode_hex_field(&raw)
    }

    async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        let raw: Option<RpcReceipt> = self
            .request("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await?;
        raw.map(TransactionReceipt::try_from).transpose()
    }
}

#[cfg(test)]
#[path = "tests/rpc_tests.rs"]
mod tests;
