//! ABI surface of the recipe open action and the contracts around it.

use serde::{Deserialize, Serialize};
use shared::{
    domain::{Address, ProfileId, PubType, PublicationId, Selector, TokenAmount, B256},
    protocol::{
        InitializeActionData, LogEntry, ModuleEvent, ProcessActionData, ProcessActionParams,
    },
};

use crate::{
    codec::{decode, encode, expect_arity, AbiError, ParamType, Token},
    hash::{event_topic, selector},
};

pub mod module_fn {
    pub const INITIALIZE_PUBLICATION_ACTION: &str =
        "initializePublicationAction(uint256,uint256,address,bytes)";
    pub const PROCESS_PUBLICATION_ACTION: &str = "processPublicationAction((uint256,uint256,uint256,address,address,uint256[],uint256[],uint8[],bytes))";
    pub const GET_TIP_RECEIVER: &str = "getTipReceiver(uint256,uint256)";
    pub const SUPPORTS_INTERFACE: &str = "supportsInterface(bytes4)";
    pub const SET_MODULE_METADATA_URI: &str = "setModuleMetadataURI(string)";
    pub const GET_MODULE_METADATA_URI: &str = "getModuleMetadataURI()";
    pub const REGISTER_MODULE: &str = "registerModule()";
}

pub mod registry_fn {
    pub const REGISTER_ERC20_CURRENCY: &str = "registerErc20Currency(address)";
    pub const IS_ERC20_CURRENCY_REGISTERED: &str = "isErc20CurrencyRegistered(address)";
    pub const REGISTER_MODULE: &str = "registerModule(address,uint256)";
    pub const IS_MODULE_REGISTERED: &str = "isModuleRegistered(address)";
}

pub mod erc20_fn {
    pub const TOTAL_SUPPLY: &str = "totalSupply()";
    pub const BALANCE_OF: &str = "balanceOf(address)";
    pub const ALLOWANCE: &str = "allowance(address,address)";
    pub const APPROVE: &str = "approve(address,uint256)";
    pub const TRANSFER: &str = "transfer(address,uint256)";
    pub const TRANSFER_FROM: &str = "transferFrom(address,address,uint256)";
    pub const MINT: &str = "mint(address,uint256)";
    pub const DECIMALS: &str = "decimals()";
}

pub mod cookbook_fn {
    pub const MINT: &str = "mint(address,uint256,string)";
    pub const OWNER_OF: &str = "ownerOf(uint256)";
    pub const BALANCE_OF: &str = "balanceOf(address)";
    pub const TOTAL_SUPPLY: &str = "totalSupply()";
    pub const MAX_SUPPLY: &str = "maxSupply()";
    pub const TOKEN_URI: &str = "tokenURI(uint256)";
    pub const COLLECTION_METADATA: &str = "collectionMetadata()";
    pub const ROYALTY_INFO: &str = "royaltyInfo(uint256,uint256)";
}

pub mod events {
    pub const TIP_RECEIVER_REGISTERED: &str = "TipReceiverRegistered(uint256,uint256,address)";
    pub const TIP_CREATED: &str = "TipCreated(address,address,address,uint256)";
    pub const TRANSFER: &str = "Transfer(address,address,uint256)";
    pub const APPROVAL: &str = "Approval(address,address,uint256)";
}

pub mod errors {
    pub const CURRENCY_NOT_WHITELISTED: &str = "CurrencyNotWhitelisted()";
    pub const TIP_RECEIVER_NOT_FOUND: &str = "TipReceiverNotFound()";
    pub const NOT_HUB: &str = "NotHub()";
    pub const INIT_PARAMS_INVALID: &str = "InitParamsInvalid()";
}

/// Module type id the registry uses for publication action modules.
pub const PUBLICATION_ACTION_MODULE_TYPE: u128 = 1;

/// One entry of a calldata ABI listing, as published in module metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

impl AbiParam {
    fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

pub fn initialize_calldata_abi() -> Vec<AbiParam> {
    vec![
        AbiParam::new("address", "tipReceiver"),
        AbiParam::new("address", "cookBook"),
        AbiParam::new("uint256", "cookBookId"),
        AbiParam::new("string", "recipeMetadata"),
    ]
}

pub fn process_calldata_abi() -> Vec<AbiParam> {
    vec![
        AbiParam::new("address", "currency"),
        AbiParam::new("uint256", "tipAmount"),
        AbiParam::new("address", "cookBook"),
        AbiParam::new("uint256", "cookBookId"),
    ]
}

pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut out = selector(signature).0.to_vec();
    out.extend(encode(tokens));
    out
}

/// Splits calldata into its selector and argument bytes.
pub fn split_call(data: &[u8]) -> Result<(Selector, &[u8]), AbiError> {
    if data.len() < 4 {
        return Err(AbiError::OutOfBounds {
            offset: 0,
            needed: 4,
            available: data.len(),
        });
    }
    Ok((Selector([data[0], data[1], data[2], data[3]]), &data[4..]))
}

fn init_data_types() -> Vec<ParamType> {
    vec![
        ParamType::Address,
        ParamType::Address,
        ParamType::Uint(256),
        ParamType::String,
    ]
}

fn process_data_types() -> Vec<ParamType> {
    vec![
        ParamType::Address,
        ParamType::Uint(256),
        ParamType::Address,
        ParamType::Uint(256),
    ]
}

pub fn encode_init_data(data: &InitializeActionData) -> Vec<u8> {
    encode(&[
        Token::Address(data.tip_receiver),
        Token::Address(data.cook_book),
        Token::uint(data.cook_book_id),
        Token::String(data.recipe_metadata.clone()),
    ])
}

pub fn decode_init_data(bytes: &[u8]) -> Result<InitializeActionData, AbiError> {
    let [tip_receiver, cook_book, cook_book_id, recipe_metadata] =
        expect_arity(decode(&init_data_types(), bytes)?)?;
    Ok(InitializeActionData {
        tip_receiver: tip_receiver.into_address()?,
        cook_book: cook_book.into_address()?,
        cook_book_id: cook_book_id.into_u64()?,
        recipe_metadata: recipe_metadata.into_string()?,
    })
}

pub fn encode_process_data(data: &ProcessActionData) -> Vec<u8> {
    encode(&[
        Token::Address(data.currency),
        Token::uint(data.tip_amount.0),
        Token::Address(data.cook_book),
        Token::uint(data.cook_book_id),
    ])
}

pub fn decode_process_data(bytes: &[u8]) -> Result<ProcessActionData, AbiError> {
    let [currency, tip_amount, cook_book, cook_book_id] =
        expect_arity(decode(&process_data_types(), bytes)?)?;
    Ok(ProcessActionData {
        currency: currency.into_address()?,
        tip_amount: TokenAmount(tip_amount.into_u128()?),
        cook_book: cook_book.into_address()?,
        cook_book_id: cook_book_id.into_u64()?,
    })
}

fn process_params_type() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::Uint(256),
        ParamType::Uint(256),
        ParamType::Uint(256),
        ParamType::Address,
        ParamType::Address,
        ParamType::Array(Box::new(ParamType::Uint(256))),
        ParamType::Array(Box::new(ParamType::Uint(256))),
        ParamType::Array(Box::new(ParamType::Uint(8))),
        ParamType::Bytes,
    ])
}

pub fn encode_initialize_call(
    profile_id: ProfileId,
    publication_id: PublicationId,
    transaction_executor: Address,
    data: &[u8],
) -> Vec<u8> {
    encode_call(
        module_fn::INITIALIZE_PUBLICATION_ACTION,
        &[
            Token::uint(profile_id.0),
            Token::uint(publication_id.0),
            Token::Address(transaction_executor),
            Token::Bytes(data.to_vec()),
        ],
    )
}

pub fn decode_initialize_args(
    args: &[u8],
) -> Result<(ProfileId, PublicationId, Address, Vec<u8>), AbiError> {
    let types = [
        ParamType::Uint(256),
        ParamType::Uint(256),
        ParamType::Address,
        ParamType::Bytes,
    ];
    let [profile_id, publication_id, executor, data] = expect_arity(decode(&types, args)?)?;
    Ok((
        ProfileId(profile_id.into_u64()?),
        PublicationId(publication_id.into_u64()?),
        executor.into_address()?,
        data.into_bytes()?,
    ))
}

pub fn encode_process_call(params: &ProcessActionParams) -> Vec<u8> {
    let tuple = Token::Tuple(vec![
        Token::uint(params.publication_acted_profile_id.0),
        Token::uint(params.publication_acted_id.0),
        Token::uint(params.actor_profile_id.0),
        Token::Address(params.actor_profile_owner),
        Token::Address(params.transaction_executor),
        Token::Array(
            params
                .referrer_profile_ids
                .iter()
                .map(|id| Token::uint(id.0))
                .collect(),
        ),
        Token::Array(
            params
                .referrer_pub_ids
                .iter()
                .map(|id| Token::uint(id.0))
                .collect(),
        ),
        Token::Array(
            params
                .referrer_pub_types
                .iter()
                .map(|kind| Token::uint(*kind as u8))
                .collect(),
        ),
        Token::Bytes(params.action_module_data.clone()),
    ]);
    encode_call(module_fn::PROCESS_PUBLICATION_ACTION, &[tuple])
}

pub fn decode_process_args(args: &[u8]) -> Result<ProcessActionParams, AbiError> {
    let [tuple] = expect_arity(decode(&[process_params_type()], args)?)?;
    let [acted_profile, acted_pub, actor_profile, actor_owner, executor, ref_profiles, ref_pubs, ref_types, module_data] =
        expect_arity(tuple.into_tuple()?)?;

    let referrer_profile_ids = ref_profiles
        .into_array()?
        .into_iter()
        .map(|token| token.into_u64().map(ProfileId))
        .collect::<Result<Vec<_>, _>>()?;
    let referrer_pub_ids = ref_pubs
        .into_array()?
        .into_iter()
        .map(|token| token.into_u64().map(PublicationId))
        .collect::<Result<Vec<_>, _>>()?;
    let referrer_pub_types = ref_types
        .into_array()?
        .into_iter()
        .map(|token| {
            let raw = token.into_u8()?;
            PubType::try_from(raw).map_err(|_| AbiError::IntegerOverflow { bits: 3 })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ProcessActionParams {
        publication_acted_profile_id: ProfileId(acted_profile.into_u64()?),
        publication_acted_id: PublicationId(acted_pub.into_u64()?),
        actor_profile_id: ProfileId(actor_profile.into_u64()?),
        actor_profile_owner: actor_owner.into_address()?,
        transaction_executor: executor.into_address()?,
        referrer_profile_ids,
        referrer_pub_ids,
        referrer_pub_types,
        action_module_data: module_data.into_bytes()?,
    })
}

pub fn encode_tip_receiver_registered(
    module: Address,
    profile_id: ProfileId,
    publication_id: PublicationId,
    tip_receiver: Address,
) -> LogEntry {
    LogEntry {
        address: module,
        topics: vec![event_topic(events::TIP_RECEIVER_REGISTERED)],
        data: encode(&[
            Token::uint(profile_id.0),
            Token::uint(publication_id.0),
            Token::Address(tip_receiver),
        ]),
    }
}

pub fn encode_tip_created(
    module: Address,
    transaction_executor: Address,
    tip_receiver: Address,
    currency: Address,
    tip_amount: TokenAmount,
) -> LogEntry {
    LogEntry {
        address: module,
        topics: vec![
            event_topic(events::TIP_CREATED),
            address_topic(transaction_executor),
            address_topic(tip_receiver),
            address_topic(currency),
        ],
        data: encode(&[Token::uint(tip_amount.0)]),
    }
}

pub fn address_topic(address: Address) -> B256 {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    B256(word)
}

fn topic_address(topic: &B256) -> Result<Address, AbiError> {
    decode(&[ParamType::Address], &topic.0)?
        .pop()
        .ok_or(AbiError::Arity {
            expected: 1,
            found: 0,
        })?
        .into_address()
}

/// Decodes a module log, returning `None` for logs the module does not emit.
pub fn decode_module_event(log: &LogEntry) -> Result<Option<ModuleEvent>, AbiError> {
    let Some(topic0) = log.topics.first() else {
        return Ok(None);
    };

    if *topic0 == event_topic(events::TIP_RECEIVER_REGISTERED) {
        let types = [ParamType::Uint(256), ParamType::Uint(256), ParamType::Address];
        let [profile_id, publication_id, tip_receiver] =
            expect_arity(decode(&types, &log.data)?)?;
        return Ok(Some(ModuleEvent::TipReceiverRegistered {
            profile_id: ProfileId(profile_id.into_u64()?),
            publication_id: PublicationId(publication_id.into_u64()?),
            tip_receiver: tip_receiver.into_address()?,
        }));
    }

    if *topic0 == event_topic(events::TIP_CREATED) {
        if log.topics.len() != 4 {
            return Err(AbiError::Arity {
                expected: 4,
                found: log.topics.len(),
            });
        }
        let [tip_amount] = expect_arity(decode(&[ParamType::Uint(256)], &log.data)?)?;
        return Ok(Some(ModuleEvent::TipCreated {
            transaction_executor: topic_address(&log.topics[1])?,
            tip_receiver: topic_address(&log.topics[2])?,
            currency: topic_address(&log.topics[3])?,
            tip_amount: TokenAmount(tip_amount.into_u128()?),
        }));
    }

    Ok(None)
}

#[cfg(test)]
#[path = "tests/recipe_tests.rs"]
mod tests;
