use super::*;
use abi::revert::{encode_custom, encode_reason};
use shared::{
    domain::{ProfileId, PublicationId},
    protocol::InitializeActionData,
};

use crate::test_support::{one_token, LocalEnv, StalledChain};

fn reverted(data: Vec<u8>) -> ChainError {
    ChainError::Reverted { data }
}

#[test]
fn module_errors_map_to_typed_variants() {
    assert!(matches!(
        ActionError::from(reverted(encode_custom(errors::CURRENCY_NOT_WHITELISTED))),
        ActionError::UnsupportedCurrency
    ));
    assert!(matches!(
        ActionError::from(reverted(encode_custom(errors::TIP_RECEIVER_NOT_FOUND))),
        ActionError::ReceiverNotFound
    ));
    assert!(matches!(
        ActionError::from(reverted(encode_custom(errors::NOT_HUB))),
        ActionError::NotHub
    ));
    match ActionError::from(reverted(encode_reason("ERC20: insufficient allowance"))) {
        ActionError::Reverted { reason } => assert_eq!(reason, "ERC20: insufficient allowance"),
        other => panic!("unexpected: {other}"),
    }
    assert!(matches!(
        ActionError::from(ChainError::Transport("connection refused".into())),
        ActionError::Chain(_)
    ));
}

#[test]
fn error_codes_follow_taxonomy() {
    assert_eq!(
        ActionError::UnsupportedCurrency.code(),
        ErrorCode::UnsupportedCurrency
    );
    assert_eq!(ActionError::ReceiverNotFound.code(), ErrorCode::ReceiverNotFound);
    assert_eq!(ActionError::NotHub.code(), ErrorCode::Unauthorized);
    let report = ActionError::ReceiverNotFound.report();
    assert_eq!(report.code, ErrorCode::ReceiverNotFound);
    assert!(report.message.contains("tip receiver"));
}

fn init_call(receiver: Address, cook_book: Address, executor: Address) -> InitializeActionCall {
    InitializeActionCall {
        profile_id: ProfileId(1),
        publication_id: PublicationId(1),
        transaction_executor: executor,
        data: encode_init_data(&InitializeActionData {
            tip_receiver: receiver,
            cook_book,
            cook_book_id: 1,
            recipe_metadata: "ipfs://recipe.json".into(),
        }),
    }
}

#[tokio::test]
async fn interface_and_receiver_queries() {
    let env = LocalEnv::new().await;
    let summary = env.deploy_all().await;
    let client = env.action_client(summary.module.expect("module").record.address);

    assert!(client.supports_lens_module().await.expect("lens"));
    assert!(client
        .supports_interface(Selector([0x01, 0xff, 0xc9, 0xa7]))
        .await
        .expect("erc165"));
    assert!(!client
        .supports_interface(Selector([0xde, 0xad, 0xbe, 0xef]))
        .await
        .expect("other"));

    let publication = PublicationRef::new(ProfileId(1), PublicationId(1));
    assert_eq!(client.tip_receiver(publication).await.expect("query"), None);
}

#[tokio::test]
async fn initialize_reports_registration_event() {
    let env = LocalEnv::new().await;
    let summary = env.deploy_all().await;
    let cook_book = summary.cook_book.expect("cook book").address;
    let client = env.action_client(summary.module.expect("module").record.address);
    let receiver = env.accounts[3];

    let outcome = client
        .initialize(env.owner(), &init_call(receiver, cook_book, env.owner()))
        .await
        .expect("initialize");
    assert_eq!(
        outcome.publication,
        PublicationRef::new(ProfileId(1), PublicationId(1))
    );
    assert_eq!(outcome.tip_receiver, receiver);
    assert!(outcome.block_number > 0);
    assert_eq!(
        client.tip_receiver(outcome.publication).await.expect("query"),
        Some(receiver)
    );
}

#[tokio::test]
async fn only_hub_may_initialize() {
    let env = LocalEnv::new().await;
    let summary = env.deploy_all().await;
    let client = env.action_client(summary.module.expect("module").record.address);

    let err = client
        .initialize(
            env.accounts[1],
            &init_call(env.accounts[3], Address::ZERO, env.accounts[1]),
        )
        .await
        .expect_err("not hub");
    assert!(matches!(err, ActionError::NotHub));
}

#[tokio::test]
async fn malformed_init_data_is_rejected() {
    let env = LocalEnv::new().await;
    let summary = env.deploy_all().await;
    let client = env.action_client(summary.module.expect("module").record.address);

    let mut call = init_call(env.accounts[3], Address::ZERO, env.owner());
    call.data = vec![0x01, 0x02];
    let err = client
        .initialize(env.owner(), &call)
        .await
        .expect_err("bad data");
    assert!(matches!(err, ActionError::InitParamsInvalid));
}

#[tokio::test]
async fn process_pulls_approved_tip() {
    let env = LocalEnv::new().await;
    let summary = env.deploy_all().await;
    let module = summary.module.expect("module").record.address;
    let token = env.token(summary.test_token.expect("token").address);
    let cook_book = summary.cook_book.expect("cook book").address;
    let client = env.action_client(module);
    let receiver = env.accounts[3];

    client
        .initialize(env.owner(), &init_call(receiver, cook_book, env.owner()))
        .await
        .expect("initialize");
    token
        .approve(env.owner(), module, one_token())
        .await
        .expect("approve");
    assert_eq!(
        token.allowance(env.owner(), module).await.expect("allowance"),
        one_token()
    );

    let params = ProcessActionParams {
        publication_acted_profile_id: ProfileId(1),
        publication_acted_id: PublicationId(1),
        actor_profile_id: ProfileId(1),
        actor_profile_owner: env.owner(),
        transaction_executor: env.owner(),
        referrer_profile_ids: Vec::new(),
        referrer_pub_ids: Vec::new(),
        referrer_pub_types: Vec::new(),
        action_module_data: encode_process_data(&shared::protocol::ProcessActionData {
            currency: token.address(),
            tip_amount: one_token(),
            cook_book,
            cook_book_id: 1,
        }),
    };
    let outcome = client
        .process(env.owner(), &params, TokenAmount::ZERO)
        .await
        .expect("process");

    assert_eq!(outcome.transaction_executor, env.owner());
    assert_eq!(outcome.tip_receiver, receiver);
    assert_eq!(outcome.currency, token.address());
    assert_eq!(outcome.tip_amount, one_token());
    assert_eq!(token.balance_of(receiver).await.expect("balance"), one_token());
    assert_eq!(
        token.allowance(env.owner(), module).await.expect("allowance"),
        TokenAmount::ZERO
    );
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn unconfirmed_transaction_times_out() {
    let client = ActionClient::new(Arc::new(StalledChain), Address([0x02; 20])).with_confirmation(
        ConfirmationPolicy {
            poll_interval: std::time::Duration::from_millis(250),
            timeout: Some(std::time::Duration::from_secs(3)),
        },
    );

    let err = client
        .initialize(
            Address([0x01; 20]),
            &init_call(Address([0x03; 20]), Address::ZERO, Address([0x01; 20])),
        )
        .await
        .expect_err("never mined");
    assert!(matches!(
        err,
        ActionError::Confirmation(ConfirmError::Timeout { .. })
    ));
    assert_eq!(err.code(), ErrorCode::Timeout);

    let err = client.module_metadata_uri().await.expect_err("offline");
    assert_eq!(err.code(), ErrorCode::Transport);
}
