use std::collections::HashMap;

use abi::{
    codec::expect_arity,
    decode, encode,
    hash::ERC165_INTERFACE_ID,
    lens_module_interface_id,
    recipe::{
        decode_init_data, decode_initialize_args, decode_process_args, decode_process_data,
        encode_call, encode_tip_created, encode_tip_receiver_registered, erc20_fn, errors,
        module_fn, registry_fn, PUBLICATION_ACTION_MODULE_TYPE,
    },
    selector, ParamType, Token,
};
use shared::{
    domain::{Address, ProfileId, PublicationId, PublicationRef, Selector},
    protocol::InitializeActionData,
};

use super::{CallContext, ExecResult, ExecutionRevert};

/// `RecipeActionModule`: hub-restricted open action that records a tip
/// receiver per publication and forwards ERC-20 tips to it.
#[derive(Debug, Clone)]
pub(super) struct RecipeActionModule {
    hub: Address,
    registry: Address,
    owner: Address,
    metadata_uri: String,
    recipes: HashMap<PublicationRef, InitializeActionData>,
}

fn empty_bytes_return() -> Vec<u8> {
    encode(&[Token::Bytes(Vec::new())])
}

fn decode_bool_return(data: &[u8]) -> Result<bool, ExecutionRevert> {
    let [flag] = expect_arity(decode(&[ParamType::Bool], data)?)?;
    Ok(flag.into_bool()?)
}

impl RecipeActionModule {
    pub(super) fn deploy(ctx: &mut CallContext<'_>, args: &[u8]) -> Result<Self, ExecutionRevert> {
        let [hub, registry] =
            expect_arity(decode(&[ParamType::Address, ParamType::Address], args)?)?;
        Ok(Self {
            hub: hub.into_address()?,
            registry: registry.into_address()?,
            owner: ctx.caller,
            metadata_uri: String::new(),
            recipes: HashMap::new(),
        })
    }

    fn only_hub(&self, ctx: &CallContext<'_>) -> Result<(), ExecutionRevert> {
        if ctx.caller != self.hub {
            return Err(ExecutionRevert::custom(errors::NOT_HUB));
        }
        Ok(())
    }

    fn only_owner(&self, ctx: &CallContext<'_>) -> Result<(), ExecutionRevert> {
        if ctx.caller != self.owner {
            return Err(ExecutionRevert::reason("Ownable: caller is not the owner"));
        }
        Ok(())
    }

    fn initialize(&mut self, ctx: &mut CallContext<'_>, args: &[u8]) -> ExecResult {
        self.only_hub(ctx)?;
        let (profile_id, publication_id, _executor, data) = decode_initialize_args(args)?;
        let recipe = decode_init_data(&data)
            .map_err(|_| ExecutionRevert::custom(errors::INIT_PARAMS_INVALID))?;

        let log =
            encode_tip_receiver_registered(ctx.this, profile_id, publication_id, recipe.tip_receiver);
        self.recipes
            .insert(PublicationRef::new(profile_id, publication_id), recipe);
        ctx.emit(log);
        Ok(empty_bytes_return())
    }

    fn process(&mut self, ctx: &mut CallContext<'_>, args: &[u8]) -> ExecResult {
        self.only_hub(ctx)?;
        let params = decode_process_args(args)?;
        let data = decode_process_data(&params.action_module_data)?;

        let currency_check = encode_call(
            registry_fn::IS_ERC20_CURRENCY_REGISTERED,
            &[Token::Address(data.currency)],
        );
        if !decode_bool_return(&ctx.call(self.registry, currency_check)?)? {
            return Err(ExecutionRevert::custom(errors::CURRENCY_NOT_WHITELISTED));
        }

        let tip_receiver = self
            .recipes
            .get(&params.publication())
            .map(|recipe| recipe.tip_receiver)
            .ok_or_else(|| ExecutionRevert::custom(errors::TIP_RECEIVER_NOT_FOUND))?;

        let transfer = encode_call(
            erc20_fn::TRANSFER_FROM,
            &[
                Token::Address(params.transaction_executor),
                Token::Address(tip_receiver),
                Token::uint(data.tip_amount.0),
            ],
        );
        ctx.call(data.currency, transfer)?;

        let log = encode_tip_created(
            ctx.this,
            params.transaction_executor,
            tip_receiver,
            data.currency,
            data.tip_amount,
        );
        ctx.emit(log);
        Ok(empty_bytes_return())
    }

    pub(super) fn dispatch(
        &mut self,
        ctx: &mut CallContext<'_>,
        sel: Selector,
        args: &[u8],
    ) -> ExecResult {
        if sel == selector(module_fn::INITIALIZE_PUBLICATION_ACTION) {
            return self.initialize(ctx, args);
        }
        if sel == selector(module_fn::PROCESS_PUBLICATION_ACTION) {
            return self.process(ctx, args);
        }
        if sel == selector(module_fn::GET_TIP_RECEIVER) {
            let [profile_id, publication_id] =
                expect_arity(decode(&[ParamType::Uint(256), ParamType::Uint(256)], args)?)?;
            let publication = PublicationRef::new(
                ProfileId(profile_id.into_u64()?),
                PublicationId(publication_id.into_u64()?),
            );
            let receiver = self
                .recipes
                .get(&publication)
                .map(|recipe| recipe.tip_receiver)
                .unwrap_or(Address::ZERO);
            return Ok(encode(&[Token::Address(receiver)]));
        }
        if sel == selector(module_fn::SUPPORTS_INTERFACE) {
            let [interface_id] = expect_arity(decode(&[ParamType::FixedBytes(4)], args)?)?;
            let interface_id = interface_id.into_fixed_bytes()?;
            let supported = interface_id == lens_module_interface_id().0
                || interface_id == ERC165_INTERFACE_ID.0;
            return Ok(encode(&[Token::Bool(supported)]));
        }
        if sel == selector(module_fn::SET_MODULE_METADATA_URI) {
            self.only_owner(ctx)?;
            let [uri] = expect_arity(decode(&[ParamType::String], args)?)?;
            self.metadata_uri = uri.into_string()?;
            return Ok(Vec::new());
        }
        if sel == selector(module_fn::GET_MODULE_METADATA_URI) {
            return Ok(encode(&[Token::String(self.metadata_uri.clone())]));
        }
        if sel == selector(module_fn::REGISTER_MODULE) {
            self.only_owner(ctx)?;
            let registration = encode_call(
                registry_fn::REGISTER_MODULE,
                &[
                    Token::Address(ctx.this),
                    Token::uint(PUBLICATION_ACTION_MODULE_TYPE),
                ],
            );
            let registered = decode_bool_return(&ctx.call(self.registry, registration)?)?;
            return Ok(encode(&[Token::Bool(registered)]));
        }

        Err(ExecutionRevert(Vec::new()))
    }
}
