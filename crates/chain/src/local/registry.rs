use std::collections::{HashMap, HashSet};

use abi::{codec::expect_arity, decode, encode, recipe::registry_fn, selector, ParamType, Token};
use shared::domain::{Address, Selector};

use super::{ExecResult, ExecutionRevert};

/// `MockModuleRegistry`: accepts every currency and module registration.
#[derive(Debug, Clone, Default)]
pub(super) struct MockModuleRegistry {
    currencies: HashSet<Address>,
    modules: HashMap<Address, u128>,
}

impl MockModuleRegistry {
    pub(super) fn dispatch(&mut self, sel: Selector, args: &[u8]) -> ExecResult {
        if sel == selector(registry_fn::REGISTER_ERC20_CURRENCY) {
            let [currency] = expect_arity(decode(&[ParamType::Address], args)?)?;
            self.currencies.insert(currency.into_address()?);
            return Ok(encode(&[Token::Bool(true)]));
        }
        if sel == selector(registry_fn::IS_ERC20_CURRENCY_REGISTERED) {
            let [currency] = expect_arity(decode(&[ParamType::Address], args)?)?;
            let registered = self.currencies.contains(&currency.into_address()?);
            return Ok(encode(&[Token::Bool(registered)]));
        }
        if sel == selector(registry_fn::REGISTER_MODULE) {
            let [module, module_type] =
                expect_arity(decode(&[ParamType::Address, ParamType::Uint(256)], args)?)?;
            self.modules
                .insert(module.into_address()?, module_type.into_u128()?);
            return Ok(encode(&[Token::Bool(true)]));
        }
        if sel == selector(registry_fn::IS_MODULE_REGISTERED) {
            let [module] = expect_arity(decode(&[ParamType::Address], args)?)?;
            let registered = self.modules.contains_key(&module.into_address()?);
            return Ok(encode(&[Token::Bool(registered)]));
        }

        Err(ExecutionRevert(Vec::new()))
    }
}
