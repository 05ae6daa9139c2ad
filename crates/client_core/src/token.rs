use std::sync::Arc;

use abi::{
    codec::expect_arity,
    decode,
    recipe::{encode_call, erc20_fn},
    ParamType, Token,
};
use chain::ChainClient;
use shared::{
    domain::{Address, TokenAmount, TxHash},
    protocol::{CallRequest, TransactionRequest},
};
use tracing::info;

use crate::{
    action_client::ActionError,
    confirm::{wait_for_receipt, ConfirmationPolicy},
};

/// ERC-20 currency used for tips. The module pulls tips with `transferFrom`,
/// so executors approve it first.
#[derive(Clone)]
pub struct Erc20Client {
    chain: Arc<dyn ChainClient>,
    token: Address,
    confirmation: ConfirmationPolicy,
}

impl Erc20Client {
    pub fn new(chain: Arc<dyn ChainClient>, token: Address) -> Self {
        Self {
            chain,
            token,
            confirmation: ConfirmationPolicy::default(),
        }
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn address(&self) -> Address {
        self.token
    }

    async fn read_amount(&self, data: Vec<u8>) -> Result<TokenAmount, ActionError> {
        let output = self
            .chain
            .call(CallRequest {
                from: None,
                to: self.token,
                data,
            })
            .await?;
        let [amount] = expect_arity(decode(&[ParamType::Uint(256)], &output)?)?;
        Ok(TokenAmount(amount.into_u128()?))
    }

    async fn transact(&self, from: Address, data: Vec<u8>) -> Result<TxHash, ActionError> {
        let hash = self
            .chain
            .send_transaction(TransactionRequest::call(from, self.token, data))
            .await?;
        wait_for_receipt(self.chain.as_ref(), hash, self.confirmation).await?;
        Ok(hash)
    }

    pub async fn balance_of(&self, owner: Address) -> Result<TokenAmount, ActionError> {
        self.read_amount(encode_call(erc20_fn::BALANCE_OF, &[Token::Address(owner)]))
            .await
    }

    pub async fn allowance(
        &self,
        owner: Address,
        spender: Address,
    ) -> Result<TokenAmount, ActionError> {
        self.read_amount(encode_call(
            erc20_fn::ALLOWANCE,
            &[Token::Address(owner), Token::Address(spender)],
        ))
        .await
    }

    pub async fn approve(
        &self,
        owner: Address,
        spender: Address,
        amount: TokenAmount,
    ) -> Result<TxHash, ActionError> {
        let hash = self
            .transact(
                owner,
                encode_call(
                    erc20_fn::APPROVE,
                    &[Token::Address(spender), Token::uint(amount.0)],
                ),
            )
            .await?;
        info!(token = %self.token, %owner, %spender, %amount, "allowance approved");
        Ok(hash)
    }

    pub async fn transfer(
        &self,
        from: Address,
        to: Address,
        amount: TokenAmount,
    ) -> Result<TxHash, ActionError> {
        self.transact(
            from,
            encode_call(erc20_fn::TRANSFER, &[Token::Address(to), Token::uint(amount.0)]),
        )
        .await
    }
}
