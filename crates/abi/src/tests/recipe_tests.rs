use super::*;

fn addr(byte: u8) -> Address {
    Address([byte; 20])
}

#[test]
fn init_data_matches_declared_calldata_abi() {
    let data = InitializeActionData {
        tip_receiver: addr(0xaa),
        cook_book: addr(0xcc),
        cook_book_id: 1,
        recipe_metadata: "{\"name\":\"Spaghetti Carbonara\"}".to_string(),
    };
    let encoded = encode_init_data(&data);

    assert_eq!(decode_init_data(&encoded).expect("decode"), data);
    let names: Vec<_> = initialize_calldata_abi()
        .into_iter()
        .map(|param| param.name)
        .collect();
    assert_eq!(names, ["tipReceiver", "cookBook", "cookBookId", "recipeMetadata"]);
}

#[test]
fn process_data_is_four_static_words() {
    let data = ProcessActionData {
        currency: addr(0x01),
        tip_amount: TokenAmount(10u128.pow(18)),
        cook_book: addr(0x02),
        cook_book_id: 2,
    };
    let encoded = encode_process_data(&data);

    assert_eq!(encoded.len(), 4 * 32);
    assert_eq!(decode_process_data(&encoded).expect("decode"), data);
}

#[test]
fn process_call_carries_selector_and_params_tuple() {
    let params = ProcessActionParams {
        publication_acted_profile_id: ProfileId(1),
        publication_acted_id: PublicationId(1),
        actor_profile_id: ProfileId(1),
        actor_profile_owner: addr(0x0a),
        transaction_executor: addr(0x0a),
        referrer_profile_ids: vec![ProfileId(5)],
        referrer_pub_ids: vec![PublicationId(9)],
        referrer_pub_types: vec![PubType::Mirror],
        action_module_data: vec![1, 2, 3],
    };
    let calldata = encode_process_call(&params);
    let (head, args) = split_call(&calldata).expect("split");

    assert_eq!(head, selector(module_fn::PROCESS_PUBLICATION_ACTION));
    assert_eq!(decode_process_args(args).expect("decode"), params);
}

#[test]
fn initialize_call_round_trips_arguments() {
    let calldata = encode_initialize_call(ProfileId(3), PublicationId(4), addr(0x0b), &[9, 9]);
    let (head, args) = split_call(&calldata).expect("split");

    assert_eq!(head, selector(module_fn::INITIALIZE_PUBLICATION_ACTION));
    assert_eq!(
        decode_initialize_args(args).expect("decode"),
        (ProfileId(3), PublicationId(4), addr(0x0b), vec![9, 9])
    );
}

#[test]
fn decodes_tip_created_from_indexed_topics() {
    let log = encode_tip_created(addr(0xee), addr(0x01), addr(0x02), addr(0x03), TokenAmount(42));

    assert_eq!(
        decode_module_event(&log).expect("decode"),
        Some(ModuleEvent::TipCreated {
            transaction_executor: addr(0x01),
            tip_receiver: addr(0x02),
            currency: addr(0x03),
            tip_amount: TokenAmount(42),
        })
    );
}

#[test]
fn decodes_tip_receiver_registered() {
    let log = encode_tip_receiver_registered(addr(0xee), ProfileId(1), PublicationId(1), addr(0x02));

    assert_eq!(
        decode_module_event(&log).expect("decode"),
        Some(ModuleEvent::TipReceiverRegistered {
            profile_id: ProfileId(1),
            publication_id: PublicationId(1),
            tip_receiver: addr(0x02),
        })
    );
}

#[test]
fn foreign_logs_are_skipped() {
    let log = LogEntry {
        address: addr(0xee),
        topics: vec![event_topic(events::TRANSFER)],
        data: Vec::new(),
    };
    assert_eq!(decode_module_event(&log).expect("decode"), None);
}
