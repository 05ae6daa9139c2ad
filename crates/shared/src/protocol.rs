use serde::{Deserialize, Serialize};

use crate::domain::{
    Address, ProfileId, PubType, PublicationId, PublicationRef, TokenAmount, TxHash, B256,
};

pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::domain::{decode_prefixed_hex, encode_prefixed_hex};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_prefixed_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        decode_prefixed_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Arguments the module decodes from `initializePublicationAction`'s data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeActionData {
    pub tip_receiver: Address,
    pub cook_book: Address,
    pub cook_book_id: u64,
    pub recipe_metadata: String,
}

/// Decoded form of `actionModuleData` for `processPublicationAction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessActionData {
    pub currency: Address,
    pub tip_amount: TokenAmount,
    pub cook_book: Address,
    pub cook_book_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeActionCall {
    pub profile_id: ProfileId,
    pub publication_id: PublicationId,
    pub transaction_executor: Address,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl InitializeActionCall {
    pub fn publication(&self) -> PublicationRef {
        PublicationRef::new(self.profile_id, self.publication_id)
    }
}

/// The `ProcessActionParams` tuple accepted by `processPublicationAction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessActionParams {
    pub publication_acted_profile_id: ProfileId,
    pub publication_acted_id: PublicationId,
    pub actor_profile_id: ProfileId,
    pub actor_profile_owner: Address,
    pub transaction_executor: Address,
    pub referrer_profile_ids: Vec<ProfileId>,
    pub referrer_pub_ids: Vec<PublicationId>,
    pub referrer_pub_types: Vec<PubType>,
    #[serde(with = "hex_bytes")]
    pub action_module_data: Vec<u8>,
}

impl ProcessActionParams {
    pub fn publication(&self) -> PublicationRef {
        PublicationRef::new(self.publication_acted_profile_id, self.publication_acted_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ModuleEvent {
    TipReceiverRegistered {
        profile_id: ProfileId,
        publication_id: PublicationId,
        tip_receiver: Address,
    },
    TipCreated {
        transaction_executor: Address,
        tip_receiver: Address,
        currency: Address,
        tip_amount: TokenAmount,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub value: TokenAmount,
}

impl TransactionRequest {
    pub fn call(from: Address, to: Address, data: Vec<u8>) -> Self {
        Self {
            from,
            to: Some(to),
            data,
            value: TokenAmount::ZERO,
        }
    }

    pub fn create(from: Address, data: Vec<u8>) -> Self {
        Self {
            from,
            to: None,
            data,
            value: TokenAmount::ZERO,
        }
    }

    pub fn with_value(mut self, value: TokenAmount) -> Self {
        self.value = value;
        self
    }
}

/// Read-only `eth_call` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub status: bool,
    pub from: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
    pub logs: Vec<LogEntry>,
}

/// Compiled creation code for a named contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractArtifact {
    pub contract_name: String,
    #[serde(with = "hex_bytes")]
    pub bytecode: Vec<u8>,
}

impl ContractArtifact {
    /// Creation payload: bytecode followed by ABI-encoded constructor args.
    pub fn creation_code(&self, constructor_args: &[u8]) -> Vec<u8> {
        let mut code = self.bytecode.clone();
        code.extend_from_slice(constructor_args);
        code
    }
}
