use super::*;
use abi::recipe::encode_init_data;
use shared::{domain::PublicationRef, protocol::InitializeActionData};

use crate::{
    confirm::ConfirmationPolicy,
    test_support::{LocalEnv, StalledChain},
};

const OWNER: &str = "0x2222222222222222222222222222222222222222";

fn process_form() -> ProcessForm {
    ProcessForm {
        publication_acted_profile_id: "1".into(),
        publication_acted_id: "1".into(),
        actor_profile_id: "7".into(),
        actor_profile_owner: OWNER.into(),
        transaction_executor: OWNER.into(),
        referrer_profile_ids: "3, 4".into(),
        referrer_pub_ids: "5,6".into(),
        referrer_pub_types: "1,4".into(),
        action_module_data: "0x".into(),
        value: "0.01".into(),
    }
}

#[test]
fn process_form_coerces_every_field() {
    let (params, value) = process_form().coerce().expect("coerce");
    assert_eq!(params.actor_profile_id, ProfileId(7));
    assert_eq!(params.actor_profile_owner, OWNER.parse().expect("owner"));
    assert_eq!(params.referrer_profile_ids, vec![ProfileId(3), ProfileId(4)]);
    assert_eq!(
        params.referrer_pub_ids,
        vec![PublicationId(5), PublicationId(6)]
    );
    assert_eq!(params.referrer_pub_types, vec![PubType::Post, PubType::Quote]);
    assert!(params.action_module_data.is_empty());
    assert_eq!(value, TokenAmount(10_000_000_000_000_000));
}

#[test]
fn empty_lists_and_value_default() {
    let mut form = process_form();
    form.referrer_profile_ids = String::new();
    form.referrer_pub_ids = " ".into();
    form.referrer_pub_types = String::new();
    form.value = String::new();

    let (params, value) = form.coerce().expect("coerce");
    assert!(params.referrer_profile_ids.is_empty());
    assert!(params.referrer_pub_ids.is_empty());
    assert!(params.referrer_pub_types.is_empty());
    assert_eq!(value, TokenAmount::ZERO);
}

#[test]
fn malformed_fields_are_named() {
    let cases: [(&str, fn(&mut ProcessForm)); 8] = [
        ("publicationActedProfileId", |f| f.publication_acted_profile_id = "-1".into()),
        ("actorProfileId", |f| f.actor_profile_id = String::new()),
        ("actorProfileOwner", |f| f.actor_profile_owner = "0x1234".into()),
        ("transactionExecutor", |f| f.transaction_executor = "2222".into()),
        ("referrerProfileIds", |f| f.referrer_profile_ids = "1,,2".into()),
        ("referrerPubTypes", |f| f.referrer_pub_types = "9".into()),
        ("actionModuleData", |f| f.action_module_data = "0x0".into()),
        ("value", |f| f.value = "0.1.2".into()),
    ];

    for (field, corrupt) in cases {
        let mut form = process_form();
        corrupt(&mut form);
        let err = form.coerce().expect_err(field);
        assert_eq!(err.field, field);
        assert_eq!(err.report().code, ErrorCode::Validation);
    }
}

#[test]
fn initialize_form_coerces_calldata() {
    let form = InitializeForm {
        profile_id: "12".into(),
        publication_id: " 34 ".into(),
        executor_address: OWNER.into(),
        calldata: "0xdeadbeef".into(),
    };
    let call = form.coerce().expect("coerce");
    assert_eq!(
        call.publication(),
        PublicationRef::new(ProfileId(12), PublicationId(34))
    );
    assert_eq!(call.data, vec![0xde, 0xad, 0xbe, 0xef]);

    let err = InitializeForm {
        calldata: "deadbeef".into(),
        ..form
    }
    .coerce()
    .expect_err("missing prefix");
    assert_eq!(err.field, "calldata");
}

#[tokio::test]
async fn invoker_publishes_settled_state() {
    let env = LocalEnv::new().await;
    let summary = env.deploy_all().await;
    let invoker = FormInvoker::new(
        env.action_client(summary.module.expect("module").record.address),
        env.owner(),
    );
    let mut states = invoker.subscribe();
    assert_eq!(*states.borrow_and_update(), SubmissionState::Idle);

    let calldata = encode_init_data(&InitializeActionData {
        tip_receiver: env.accounts[2],
        cook_book: summary.cook_book.expect("cook book").address,
        cook_book_id: 1,
        recipe_metadata: "ipfs://recipe.json".into(),
    });
    let form = InitializeForm {
        profile_id: "1".into(),
        publication_id: "1".into(),
        executor_address: env.owner().to_string(),
        calldata: shared::domain::encode_prefixed_hex(&calldata),
    };

    let outcome = invoker.submit_initialize(&form).await.expect("submit");
    assert!(states.has_changed().expect("sender alive"));
    assert_eq!(
        invoker.state(),
        SubmissionState::Settled {
            transaction_hash: outcome.transaction_hash,
            block_number: outcome.block_number,
        }
    );
}

#[tokio::test]
async fn invoker_reports_failures() {
    let env = LocalEnv::new().await;
    let summary = env.deploy_all().await;
    let invoker = FormInvoker::new(
        env.action_client(summary.module.expect("module").record.address),
        env.owner(),
    );

    let mut form = process_form();
    form.actor_profile_owner = env.owner().to_string();
    form.transaction_executor = env.owner().to_string();
    form.value = "0".into();
    form.action_module_data = shared::domain::encode_prefixed_hex(
        &crate::action_client::encode_process_data(&shared::protocol::ProcessActionData {
            currency: summary.test_token.expect("token").address,
            tip_amount: TokenAmount(1),
            cook_book: Address::ZERO,
            cook_book_id: 1,
        }),
    );

    let err = invoker
        .submit_process(&form)
        .await
        .expect_err("publication not initialized");
    assert!(matches!(
        err,
        InvokeError::Action(ActionError::ReceiverNotFound)
    ));
    match invoker.state() {
        SubmissionState::Failed(report) => assert_eq!(report.code, ErrorCode::ReceiverNotFound),
        other => panic!("unexpected state: {other:?}"),
    }

    form.publication_acted_id = "x".into();
    let err = invoker.submit_process(&form).await.expect_err("bad form");
    assert!(matches!(err, InvokeError::Form(FormError { field: "publicationActedId", .. })));
    assert!(matches!(
        invoker.state(),
        SubmissionState::Failed(report) if report.code == ErrorCode::Validation
    ));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn submission_waits_for_mining_without_deadline() {
    let client = ActionClient::new(std::sync::Arc::new(StalledChain), Address([0x02; 20]))
        .with_confirmation(ConfirmationPolicy {
            poll_interval: std::time::Duration::from_millis(500),
            timeout: Some(std::time::Duration::from_secs(60)),
        });
    let invoker = FormInvoker::new(client, Address([0x01; 20]));
    let form = InitializeForm {
        profile_id: "1".into(),
        publication_id: "1".into(),
        executor_address: Address([0x01; 20]).to_string(),
        calldata: "0x".into(),
    };

    let started = tokio::time::Instant::now();
    let waited = tokio::time::timeout(
        std::time::Duration::from_secs(300),
        invoker.submit_initialize(&form),
    )
    .await;

    assert!(waited.is_err(), "submission finished: {waited:?}");
    assert!(started.elapsed() >= std::time::Duration::from_secs(300));
    assert_eq!(invoker.state(), SubmissionState::Pending);
}
