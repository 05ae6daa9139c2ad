use std::collections::HashMap;

use abi::{
    codec::expect_arity,
    decode, encode, event_topic,
    recipe::{address_topic, cookbook_fn, events},
    selector, ParamType, Token,
};
use shared::{
    domain::{Address, Selector, B256},
    protocol::LogEntry,
};

use super::{CallContext, ExecResult, ExecutionRevert};

const BPS_DENOMINATOR: u128 = 10_000;
/// Upper bound on tokens minted by a single `mint` call.
pub(super) const MAX_MINT_BATCH: u128 = 100;

/// `CookBook`: capped NFT collection with ERC-2981 royalties. Token ids start
/// at 1.
#[derive(Debug, Clone)]
pub(super) struct CookBook {
    collection_metadata: String,
    max_supply: u128,
    royalty_receiver: Address,
    royalty_bps: u128,
    owners: Vec<Address>,
    token_uris: Vec<String>,
    balances: HashMap<Address, u128>,
}

impl CookBook {
    pub(super) fn deploy(args: &[u8]) -> Result<Self, ExecutionRevert> {
        let [metadata, max_supply, royalty_receiver, royalty_bps] = expect_arity(decode(
            &[
                ParamType::String,
                ParamType::Uint(256),
                ParamType::Address,
                ParamType::Uint(256),
            ],
            args,
        )?)?;
        let royalty_bps = royalty_bps.into_u128()?;
        if royalty_bps > BPS_DENOMINATOR {
            return Err(ExecutionRevert::reason("CookBook: royalty exceeds sale price"));
        }

        Ok(Self {
            collection_metadata: metadata.into_string()?,
            max_supply: max_supply.into_u128()?,
            royalty_receiver: royalty_receiver.into_address()?,
            royalty_bps,
            owners: Vec::new(),
            token_uris: Vec::new(),
            balances: HashMap::new(),
        })
    }

    fn token_index(&self, token: Token) -> Result<usize, ExecutionRevert> {
        let id = token.into_u128()?;
        usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .filter(|index| *index < self.owners.len())
            .ok_or_else(|| ExecutionRevert::reason("CookBook: token does not exist"))
    }

    pub(super) fn dispatch(
        &mut self,
        ctx: &mut CallContext<'_>,
        sel: Selector,
        args: &[u8],
    ) -> ExecResult {
        if sel == selector(cookbook_fn::MINT) {
            let [to, count, uri] = expect_arity(decode(
                &[ParamType::Address, ParamType::Uint(256), ParamType::String],
                args,
            )?)?;
            let to = to.into_address()?;
            let count = count.into_u128()?;
            let uri = uri.into_string()?;
            if to.is_zero() {
                return Err(ExecutionRevert::reason("CookBook: mint to the zero address"));
            }
            if count > MAX_MINT_BATCH {
                return Err(ExecutionRevert::reason("CookBook: mint batch too large"));
            }
            let minted = self.owners.len() as u128;
            if minted.saturating_add(count) > self.max_supply {
                return Err(ExecutionRevert::reason("CookBook: max supply reached"));
            }

            for _ in 0..count {
                self.owners.push(to);
                self.token_uris.push(uri.clone());
                let token_id = self.owners.len() as u128;
                let log = LogEntry {
                    address: ctx.this,
                    topics: vec![
                        event_topic(events::TRANSFER),
                        address_topic(Address::ZERO),
                        address_topic(to),
                        B256(abi::codec::uint_word(token_id)),
                    ],
                    data: Vec::new(),
                };
                ctx.emit(log);
            }
            *self.balances.entry(to).or_default() += count;
            return Ok(encode(&[Token::uint(self.owners.len() as u128)]));
        }
        if sel == selector(cookbook_fn::OWNER_OF) {
            let [token_id] = expect_arity(decode(&[ParamType::Uint(256)], args)?)?;
            let index = self.token_index(token_id)?;
            return Ok(encode(&[Token::Address(self.owners[index])]));
        }
        if sel == selector(cookbook_fn::TOKEN_URI) {
            let [token_id] = expect_arity(decode(&[ParamType::Uint(256)], args)?)?;
            let index = self.token_index(token_id)?;
            return Ok(encode(&[Token::String(self.token_uris[index].clone())]));
        }
        if sel == selector(cookbook_fn::BALANCE_OF) {
            let [owner] = expect_arity(decode(&[ParamType::Address], args)?)?;
            let balance = self
                .balances
                .get(&owner.into_address()?)
                .copied()
                .unwrap_or(0);
            return Ok(encode(&[Token::uint(balance)]));
        }
        if sel == selector(cookbook_fn::TOTAL_SUPPLY) {
            return Ok(encode(&[Token::uint(self.owners.len() as u128)]));
        }
        if sel == selector(cookbook_fn::MAX_SUPPLY) {
            return Ok(encode(&[Token::uint(self.max_supply)]));
        }
        if sel == selector(cookbook_fn::COLLECTION_METADATA) {
            return Ok(encode(&[Token::String(self.collection_metadata.clone())]));
        }
        if sel == selector(cookbook_fn::ROYALTY_INFO) {
            let [_token_id, sale_price] =
                expect_arity(decode(&[ParamType::Uint(256), ParamType::Uint(256)], args)?)?;
            let royalty = sale_price
                .into_u128()?
                .checked_mul(self.royalty_bps)
                .map(|scaled| scaled / BPS_DENOMINATOR)
                .ok_or_else(|| ExecutionRevert::reason("CookBook: royalty overflow"))?;
            return Ok(encode(&[
                Token::Address(self.royalty_receiver),
                Token::uint(royalty),
            ]));
        }

        Err(ExecutionRevert(Vec::new()))
    }
}
