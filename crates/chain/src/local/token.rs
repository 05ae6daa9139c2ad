use std::collections::HashMap;

use abi::{
    codec::expect_arity,
    decode, encode, event_topic,
    recipe::{address_topic, erc20_fn, events},
    selector, ParamType, Token,
};
use shared::{
    domain::{Address, Selector, ETHER_DECIMALS},
    protocol::LogEntry,
};

use super::{CallContext, ExecResult, ExecutionRevert};

const INITIAL_SUPPLY_TOKENS: u128 = 1_000_000;

/// `TestToken`: a plain ERC-20 that mints its initial supply to the deployer
/// and lets anyone mint more.
#[derive(Debug, Clone, Default)]
pub(super) struct Erc20Token {
    total_supply: u128,
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
}

fn amount_log(contract: Address, signature: &str, from: Address, to: Address, amount: u128) -> LogEntry {
    LogEntry {
        address: contract,
        topics: vec![event_topic(signature), address_topic(from), address_topic(to)],
        data: encode(&[Token::uint(amount)]),
    }
}

impl Erc20Token {
    pub(super) fn deploy(ctx: &mut CallContext<'_>) -> Result<Self, ExecutionRevert> {
        let mut token = Self::default();
        let initial = INITIAL_SUPPLY_TOKENS * 10u128.pow(ETHER_DECIMALS);
        let deployer = ctx.caller;
        token.mint(ctx, deployer, initial)?;
        Ok(token)
    }

    fn balance_of(&self, account: Address) -> u128 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    fn mint(
        &mut self,
        ctx: &mut CallContext<'_>,
        to: Address,
        amount: u128,
    ) -> Result<(), ExecutionRevert> {
        let overflow = || ExecutionRevert::reason("ERC20: mint overflow");
        let total_supply = self.total_supply.checked_add(amount).ok_or_else(overflow)?;
        let balance = self.balance_of(to).checked_add(amount).ok_or_else(overflow)?;
        self.total_supply = total_supply;
        self.balances.insert(to, balance);
        let log = amount_log(ctx.this, events::TRANSFER, Address::ZERO, to, amount);
        ctx.emit(log);
        Ok(())
    }

    fn move_balance(
        &mut self,
        ctx: &mut CallContext<'_>,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), ExecutionRevert> {
        if to.is_zero() {
            return Err(ExecutionRevert::reason("ERC20: transfer to the zero address"));
        }
        let remaining = self
            .balance_of(from)
            .checked_sub(amount)
            .ok_or_else(|| ExecutionRevert::reason("ERC20: transfer amount exceeds balance"))?;
        let before = if from == to { remaining } else { self.balance_of(to) };
        let credited = before
            .checked_add(amount)
            .ok_or_else(|| ExecutionRevert::reason("ERC20: balance overflow"))?;
        self.balances.insert(from, remaining);
        self.balances.insert(to, credited);
        let log = amount_log(ctx.this, events::TRANSFER, from, to, amount);
        ctx.emit(log);
        Ok(())
    }

    pub(super) fn dispatch(
        &mut self,
        ctx: &mut CallContext<'_>,
        sel: Selector,
        args: &[u8],
    ) -> ExecResult {
        if sel == selector(erc20_fn::TOTAL_SUPPLY) {
            return Ok(encode(&[Token::uint(self.total_supply)]));
        }
        if sel == selector(erc20_fn::DECIMALS) {
            return Ok(encode(&[Token::uint(ETHER_DECIMALS as u8)]));
        }
        if sel == selector(erc20_fn::BALANCE_OF) {
            let [account] = expect_arity(decode(&[ParamType::Address], args)?)?;
            return Ok(encode(&[Token::uint(self.balance_of(account.into_address()?))]));
        }
        if sel == selector(erc20_fn::ALLOWANCE) {
            let [owner, spender] =
                expect_arity(decode(&[ParamType::Address, ParamType::Address], args)?)?;
            let key = (owner.into_address()?, spender.into_address()?);
            let allowance = self.allowances.get(&key).copied().unwrap_or(0);
            return Ok(encode(&[Token::uint(allowance)]));
        }
        if sel == selector(erc20_fn::APPROVE) {
            let [spender, amount] =
                expect_arity(decode(&[ParamType::Address, ParamType::Uint(256)], args)?)?;
            let spender = spender.into_address()?;
            let amount = amount.into_u128()?;
            self.allowances.insert((ctx.caller, spender), amount);
            let log = amount_log(ctx.this, events::APPROVAL, ctx.caller, spender, amount);
            ctx.emit(log);
            return Ok(encode(&[Token::Bool(true)]));
        }
        if sel == selector(erc20_fn::TRANSFER) {
            let [to, amount] =
                expect_arity(decode(&[ParamType::Address, ParamType::Uint(256)], args)?)?;
            let sender = ctx.caller;
            self.move_balance(ctx, sender, to.into_address()?, amount.into_u128()?)?;
            return Ok(encode(&[Token::Bool(true)]));
        }
        if sel == selector(erc20_fn::TRANSFER_FROM) {
            let [from, to, amount] = expect_arity(decode(
                &[ParamType::Address, ParamType::Address, ParamType::Uint(256)],
                args,
            )?)?;
            let from = from.into_address()?;
            let amount = amount.into_u128()?;
            let key = (from, ctx.caller);
            let allowance = self.allowances.get(&key).copied().unwrap_or(0);
            let remaining = allowance
                .checked_sub(amount)
                .ok_or_else(|| ExecutionRevert::reason("ERC20: insufficient allowance"))?;
            self.move_balance(ctx, from, to.into_address()?, amount)?;
            self.allowances.insert(key, remaining);
            return Ok(encode(&[Token::Bool(true)]));
        }
        if sel == selector(erc20_fn::MINT) {
            let [to, amount] =
                expect_arity(decode(&[ParamType::Address, ParamType::Uint(256)], args)?)?;
            self.mint(ctx, to.into_address()?, amount.into_u128()?)?;
            return Ok(Vec::new());
        }

        Err(ExecutionRevert(Vec::new()))
    }
}
