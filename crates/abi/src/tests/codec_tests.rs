use super::*;

fn word_hex(data: &[u8], index: usize) -> String {
    hex::encode(&data[index * 32..(index + 1) * 32])
}

#[test]
fn encodes_static_head_before_dynamic_tail() {
    let data = encode(&[Token::uint(1u8), Token::String("hi".to_string())]);

    assert_eq!(data.len(), 4 * 32);
    assert_eq!(word_hex(&data, 0), format!("{:064x}", 1));
    assert_eq!(word_hex(&data, 1), format!("{:064x}", 0x40));
    assert_eq!(word_hex(&data, 2), format!("{:064x}", 2));
    assert_eq!(&data[96..98], b"hi");
    assert!(data[98..].iter().all(|b| *b == 0));
}

#[test]
fn decodes_nested_tuple_with_arrays() {
    let tuple = Token::Tuple(vec![
        Token::uint(7u8),
        Token::Array(vec![Token::uint(1u8), Token::uint(2u8)]),
        Token::Bytes(vec![0xde, 0xad]),
    ]);
    let data = encode(std::slice::from_ref(&tuple));
    let decoded = decode(
        &[ParamType::Tuple(vec![
            ParamType::Uint(256),
            ParamType::Array(Box::new(ParamType::Uint(256))),
            ParamType::Bytes,
        ])],
        &data,
    )
    .expect("decode");

    assert_eq!(decoded, vec![tuple]);
}

#[test]
fn static_tuple_is_inlined() {
    let data = encode(&[
        Token::Tuple(vec![Token::uint(1u8), Token::Bool(true)]),
        Token::uint(3u8),
    ]);
    assert_eq!(data.len(), 3 * 32);
    assert_eq!(word_hex(&data, 2), format!("{:064x}", 3));
}

#[test]
fn rejects_truncated_input() {
    let data = encode(&[Token::String("recipe".to_string())]);
    let err = decode(&[ParamType::String], &data[..40]).expect_err("truncated");
    assert!(matches!(err, AbiError::OutOfBounds { .. }));
}

#[test]
fn rejects_dirty_address_words() {
    let mut data = encode(&[Token::Address(shared::domain::Address([0x11; 20]))]);
    data[0] = 1;
    assert_eq!(
        decode(&[ParamType::Address], &data),
        Err(AbiError::DirtyAddress)
    );
}

#[test]
fn narrow_uint_rejects_wide_values() {
    let data = encode(&[Token::uint(256u16)]);
    assert_eq!(
        decode(&[ParamType::Uint(8)], &data),
        Err(AbiError::IntegerOverflow { bits: 8 })
    );
}

#[test]
fn u128_conversion_reports_overflow() {
    let mut word = [0u8; 32];
    word[0] = 1;
    assert_eq!(
        Token::Uint(word).into_u128(),
        Err(AbiError::IntegerOverflow { bits: 128 })
    );
}

#[test]
fn bool_rejects_values_above_one() {
    let data = encode(&[Token::uint(2u8)]);
    assert_eq!(decode(&[ParamType::Bool], &data), Err(AbiError::InvalidBool));
}
