use super::*;
use abi::{
    encode,
    recipe::{cookbook_fn, encode_call, erc20_fn, module_fn, registry_fn},
    ParamType, Token,
};

async fn deploy(chain: &LocalChain, from: Address, kind: LocalContractKind, args: Vec<u8>) -> Address {
    let hash = chain
        .send_transaction(TransactionRequest::create(
            from,
            kind.artifact().creation_code(&args),
        ))
        .await
        .expect("deploy");
    chain
        .transaction_receipt(hash)
        .await
        .expect("receipt lookup")
        .expect("mined")
        .contract_address
        .expect("contract address")
}

async fn read(
    chain: &LocalChain,
    to: Address,
    signature: &str,
    args: &[Token],
    returns: &[ParamType],
) -> Vec<Token> {
    let output = chain
        .call(CallRequest {
            from: None,
            to,
            data: encode_call(signature, args),
        })
        .await
        .expect("call");
    abi::decode(returns, &output).expect("decode return")
}

async fn token_balance(chain: &LocalChain, token: Address, account: Address) -> u128 {
    read(
        chain,
        token,
        erc20_fn::BALANCE_OF,
        &[Token::Address(account)],
        &[ParamType::Uint(256)],
    )
    .await
    .remove(0)
    .into_u128()
    .expect("balance")
}

#[tokio::test]
async fn test_token_mints_initial_supply_to_deployer() {
    let chain = LocalChain::new();
    let accounts = chain.accounts().await.expect("accounts");
    let token = deploy(&chain, accounts[0], LocalContractKind::TestToken, Vec::new()).await;

    assert_eq!(
        token_balance(&chain, token, accounts[0]).await,
        1_000_000 * 10u128.pow(18)
    );
    assert_eq!(token_balance(&chain, token, accounts[1]).await, 0);
}

#[tokio::test]
async fn reverted_transaction_leaves_state_untouched() {
    let chain = LocalChain::new();
    let accounts = chain.accounts().await.expect("accounts");
    let token = deploy(&chain, accounts[0], LocalContractKind::TestToken, Vec::new()).await;
    let block_before = chain.block_number().await;

    let err = chain
        .send_transaction(TransactionRequest::call(
            accounts[1],
            token,
            encode_call(
                erc20_fn::TRANSFER,
                &[Token::Address(accounts[2]), Token::uint(1u8)],
            ),
        ))
        .await
        .expect_err("transfer without balance");

    assert_eq!(
        err.revert(),
        Some(Revert::Reason(
            "ERC20: transfer amount exceeds balance".to_string()
        ))
    );
    assert_eq!(chain.block_number().await, block_before);
    assert_eq!(token_balance(&chain, token, accounts[2]).await, 0);
}

#[tokio::test]
async fn mint_overflow_reverts_without_changing_supply() {
    let chain = LocalChain::new();
    let accounts = chain.accounts().await.expect("accounts");
    let token = deploy(&chain, accounts[0], LocalContractKind::TestToken, Vec::new()).await;
    let supply_before = read(&chain, token, erc20_fn::TOTAL_SUPPLY, &[], &[ParamType::Uint(256)]).await;
    let balance_before = token_balance(&chain, token, accounts[0]).await;

    let err = chain
        .send_transaction(TransactionRequest::call(
            accounts[1],
            token,
            encode_call(
                erc20_fn::MINT,
                &[Token::Address(accounts[0]), Token::uint(u128::MAX)],
            ),
        ))
        .await
        .expect_err("overflowing mint");

    assert_eq!(
        err.revert(),
        Some(Revert::Reason("ERC20: mint overflow".to_string()))
    );
    assert_eq!(token_balance(&chain, token, accounts[0]).await, balance_before);
    assert_eq!(
        read(&chain, token, erc20_fn::TOTAL_SUPPLY, &[], &[ParamType::Uint(256)]).await,
        supply_before
    );

    // A fresh account can still be minted up to the remaining headroom.
    let headroom = u128::MAX - balance_before;
    chain
        .send_transaction(TransactionRequest::call(
            accounts[1],
            token,
            encode_call(
                erc20_fn::MINT,
                &[Token::Address(accounts[2]), Token::uint(headroom)],
            ),
        ))
        .await
        .expect("mint within headroom");
    assert_eq!(token_balance(&chain, token, accounts[2]).await, headroom);
}

#[tokio::test]
async fn transfer_from_requires_allowance() {
    let chain = LocalChain::new();
    let accounts = chain.accounts().await.expect("accounts");
    let token = deploy(&chain, accounts[0], LocalContractKind::TestToken, Vec::new()).await;

    let pull = encode_call(
        erc20_fn::TRANSFER_FROM,
        &[
            Token::Address(accounts[0]),
            Token::Address(accounts[1]),
            Token::uint(5u8),
        ],
    );
    let err = chain
        .send_transaction(TransactionRequest::call(accounts[1], token, pull.clone()))
        .await
        .expect_err("no allowance");
    assert!(err.to_string().contains("insufficient allowance"));

    chain
        .send_transaction(TransactionRequest::call(
            accounts[0],
            token,
            encode_call(erc20_fn::APPROVE, &[Token::Address(accounts[1]), Token::uint(5u8)]),
        ))
        .await
        .expect("approve");
    chain
        .send_transaction(TransactionRequest::call(accounts[1], token, pull))
        .await
        .expect("pull with allowance");

    assert_eq!(token_balance(&chain, token, accounts[1]).await, 5);
}

#[tokio::test]
async fn unknown_creation_code_is_rejected() {
    let chain = LocalChain::new();
    let accounts = chain.accounts().await.expect("accounts");

    let err = chain
        .send_transaction(TransactionRequest::create(accounts[0], vec![0x60, 0x80]))
        .await
        .expect_err("unknown code");
    assert!(matches!(err, ChainError::UnknownCreationCode));
}

#[tokio::test]
async fn foreign_sender_is_rejected() {
    let chain = LocalChain::new();
    let stranger = Address([0x42; 20]);

    let err = chain
        .send_transaction(TransactionRequest::create(
            stranger,
            LocalContractKind::TestToken.artifact().bytecode,
        ))
        .await
        .expect_err("unmanaged account");
    assert!(matches!(err, ChainError::UnknownAccount(account) if account == stranger));
}

#[tokio::test]
async fn cook_book_enforces_max_supply_and_reports_royalties() {
    let chain = LocalChain::new();
    let accounts = chain.accounts().await.expect("accounts");
    let args = encode(&[
        Token::String("ipfs://QmSU2R1ewXA7vmxD17KQTLRG1nu63KPxDmnb6xdtZ2Hmq5".to_string()),
        Token::uint(2u8),
        Token::Address(accounts[0]),
        Token::uint(500u16),
    ]);
    let cook_book = deploy(&chain, accounts[0], LocalContractKind::CookBook, args).await;

    let mint = |to: Address, count: u8| {
        encode_call(
            cookbook_fn::MINT,
            &[
                Token::Address(to),
                Token::uint(count),
                Token::String("ipfs://masters-cookbook.json".to_string()),
            ],
        )
    };
    chain
        .send_transaction(TransactionRequest::call(accounts[1], cook_book, mint(accounts[1], 1)))
        .await
        .expect("first mint");
    let err = chain
        .send_transaction(TransactionRequest::call(accounts[2], cook_book, mint(accounts[2], 2)))
        .await
        .expect_err("over max supply");
    assert!(err.to_string().contains("max supply"));

    let owner = read(
        &chain,
        cook_book,
        cookbook_fn::OWNER_OF,
        &[Token::uint(1u8)],
        &[ParamType::Address],
    )
    .await;
    assert_eq!(owner, vec![Token::Address(accounts[1])]);

    let royalty = read(
        &chain,
        cook_book,
        cookbook_fn::ROYALTY_INFO,
        &[Token::uint(1u8), Token::uint(10_000u16)],
        &[ParamType::Address, ParamType::Uint(256)],
    )
    .await;
    assert_eq!(royalty, vec![Token::Address(accounts[0]), Token::uint(500u16)]);
}

#[tokio::test]
async fn cook_book_caps_batch_size_under_unbounded_supply() {
    let chain = LocalChain::new();
    let accounts = chain.accounts().await.expect("accounts");
    let args = encode(&[
        Token::String("ipfs://open-collection.json".to_string()),
        Token::uint(u128::MAX),
        Token::Address(accounts[0]),
        Token::uint(0u8),
    ]);
    let cook_book = deploy(&chain, accounts[0], LocalContractKind::CookBook, args).await;
    let mint = |count: u128| {
        TransactionRequest::call(
            accounts[1],
            cook_book,
            encode_call(
                cookbook_fn::MINT,
                &[
                    Token::Address(accounts[1]),
                    Token::uint(count),
                    Token::String("ipfs://recipe.json".to_string()),
                ],
            ),
        )
    };

    let err = chain
        .send_transaction(mint(u128::MAX))
        .await
        .expect_err("oversized batch");
    assert_eq!(
        err.revert(),
        Some(Revert::Reason("CookBook: mint batch too large".to_string()))
    );

    chain
        .send_transaction(mint(cookbook::MAX_MINT_BATCH))
        .await
        .expect("largest batch");
    let supply = read(&chain, cook_book, cookbook_fn::TOTAL_SUPPLY, &[], &[ParamType::Uint(256)]).await;
    assert_eq!(supply, vec![Token::uint(cookbook::MAX_MINT_BATCH)]);
}

#[tokio::test]
async fn module_registration_reaches_registry() {
    let chain = LocalChain::new();
    let accounts = chain.accounts().await.expect("accounts");
    let registry = deploy(&chain, accounts[0], LocalContractKind::MockModuleRegistry, Vec::new()).await;
    let module = deploy(
        &chain,
        accounts[0],
        LocalContractKind::RecipeActionModule,
        encode(&[Token::Address(accounts[0]), Token::Address(registry)]),
    )
    .await;

    let err = chain
        .send_transaction(TransactionRequest::call(
            accounts[1],
            module,
            encode_call(module_fn::REGISTER_MODULE, &[]),
        ))
        .await
        .expect_err("only owner registers");
    assert!(err.to_string().contains("not the owner"));

    chain
        .send_transaction(TransactionRequest::call(
            accounts[0],
            module,
            encode_call(module_fn::REGISTER_MODULE, &[]),
        ))
        .await
        .expect("register");

    let registered = read(
        &chain,
        registry,
        registry_fn::IS_MODULE_REGISTERED,
        &[Token::Address(module)],
        &[ParamType::Bool],
    )
    .await;
    assert_eq!(registered, vec![Token::Bool(true)]);
}

#[tokio::test]
async fn value_transfers_move_native_balance() {
    let chain = LocalChain::new();
    let accounts = chain.accounts().await.expect("accounts");
    let before = chain.native_balance(accounts[1]).await;

    chain
        .send_transaction(
            TransactionRequest::call(accounts[0], accounts[1], Vec::new())
                .with_value(TokenAmount(7)),
        )
        .await
        .expect("value transfer");

    assert_eq!(chain.native_balance(accounts[1]).await.0, before.0 + 7);
}
