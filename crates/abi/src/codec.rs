use shared::domain::Address;
use thiserror::Error;

pub type Word = [u8; 32];

const WORD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("calldata too short: need {needed} bytes at offset {offset}, have {available}")]
    OutOfBounds {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("value does not fit in {bits} bits")]
    IntegerOverflow { bits: u32 },
    #[error("address word has non-zero high bytes")]
    DirtyAddress,
    #[error("invalid bool word")]
    InvalidBool,
    #[error("string is not valid utf-8")]
    InvalidUtf8,
    #[error("expected {expected} token, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: &'static str,
    },
    #[error("expected {expected} values, found {found}")]
    Arity { expected: usize, found: usize },
    #[error("unknown function selector {0}")]
    UnknownSelector(String),
    #[error("unknown event topic {0}")]
    UnknownEvent(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Address,
    Uint(u32),
    Bool,
    FixedBytes(usize),
    Bytes,
    String,
    Array(Box<ParamType>),
    Tuple(Vec<ParamType>),
}

impl ParamType {
    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::Bytes | ParamType::String | ParamType::Array(_) => true,
            ParamType::Tuple(members) => members.iter().any(ParamType::is_dynamic),
            _ => false,
        }
    }

    fn head_size(&self) -> usize {
        match self {
            ParamType::Tuple(members) if !self.is_dynamic() => {
                members.iter().map(ParamType::head_size).sum()
            }
            _ => WORD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(Word),
    Bool(bool),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<Token>),
    Tuple(Vec<Token>),
}

impl Token {
    pub fn uint(value: impl Into<u128>) -> Self {
        Token::Uint(uint_word(value.into()))
    }

    fn kind(&self) -> &'static str {
        match self {
            Token::Address(_) => "address",
            Token::Uint(_) => "uint",
            Token::Bool(_) => "bool",
            Token::FixedBytes(_) => "fixed bytes",
            Token::Bytes(_) => "bytes",
            Token::String(_) => "string",
            Token::Array(_) => "array",
            Token::Tuple(_) => "tuple",
        }
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            Token::Bytes(_) | Token::String(_) | Token::Array(_) => true,
            Token::Tuple(members) => members.iter().any(Token::is_dynamic),
            _ => false,
        }
    }

    fn head_size(&self) -> usize {
        match self {
            Token::Tuple(members) if !self.is_dynamic() => {
                members.iter().map(Token::head_size).sum()
            }
            _ => WORD,
        }
    }

    fn mismatch(&self, expected: &'static str) -> AbiError {
        AbiError::UnexpectedToken {
            expected,
            found: self.kind(),
        }
    }

    pub fn into_address(self) -> Result<Address, AbiError> {
        match self {
            Token::Address(address) => Ok(address),
            other => Err(other.mismatch("address")),
        }
    }

    pub fn into_u128(self) -> Result<u128, AbiError> {
        match self {
            Token::Uint(word) => word_to_u128(&word),
            other => Err(other.mismatch("uint")),
        }
    }

    pub fn into_u64(self) -> Result<u64, AbiError> {
        let value = self.into_u128()?;
        u64::try_from(value).map_err(|_| AbiError::IntegerOverflow { bits: 64 })
    }

    pub fn into_u8(self) -> Result<u8, AbiError> {
        let value = self.into_u128()?;
        u8::try_from(value).map_err(|_| AbiError::IntegerOverflow { bits: 8 })
    }

    pub fn into_bool(self) -> Result<bool, AbiError> {
        match self {
            Token::Bool(value) => Ok(value),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn into_fixed_bytes(self) -> Result<Vec<u8>, AbiError> {
        match self {
            Token::FixedBytes(bytes) => Ok(bytes),
            other => Err(other.mismatch("fixed bytes")),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, AbiError> {
        match self {
            Token::Bytes(bytes) => Ok(bytes),
            other => Err(other.mismatch("bytes")),
        }
    }

    pub fn into_string(self) -> Result<String, AbiError> {
        match self {
            Token::String(value) => Ok(value),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn into_array(self) -> Result<Vec<Token>, AbiError> {
        match self {
            Token::Array(items) => Ok(items),
            other => Err(other.mismatch("array")),
        }
    }

    pub fn into_tuple(self) -> Result<Vec<Token>, AbiError> {
        match self {
            Token::Tuple(items) => Ok(items),
            other => Err(other.mismatch("tuple")),
        }
    }
}

pub fn uint_word(value: u128) -> Word {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn word_to_u128(word: &Word) -> Result<u128, AbiError> {
    if word[..16].iter().any(|b| *b != 0) {
        return Err(AbiError::IntegerOverflow { bits: 128 });
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

/// Standard head/tail encoding of a parameter list.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len: usize = tokens.iter().map(Token::head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
            tail.extend(encode_token(token));
        } else {
            head.extend(encode_token(token));
        }
    }

    head.extend(tail);
    head
}

fn encode_token(token: &Token) -> Vec<u8> {
    match token {
        Token::Address(address) => {
            let mut word = [0u8; WORD];
            word[12..].copy_from_slice(address.as_bytes());
            word.to_vec()
        }
        Token::Uint(word) => word.to_vec(),
        Token::Bool(value) => uint_word(u128::from(*value)).to_vec(),
        Token::FixedBytes(bytes) => {
            let mut word = [0u8; WORD];
            let len = bytes.len().min(WORD);
            word[..len].copy_from_slice(&bytes[..len]);
            word.to_vec()
        }
        Token::Bytes(bytes) => encode_packed_dynamic(bytes),
        Token::String(value) => encode_packed_dynamic(value.as_bytes()),
        Token::Array(items) => {
            let mut out = uint_word(items.len() as u128).to_vec();
            out.extend(encode(items));
            out
        }
        Token::Tuple(items) => encode(items),
    }
}

fn encode_packed_dynamic(bytes: &[u8]) -> Vec<u8> {
    let mut out = uint_word(bytes.len() as u128).to_vec();
    out.extend_from_slice(bytes);
    out.resize(WORD + padded_len(bytes.len()), 0);
    out
}

pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    decode_params(types, data, 0)
}

fn decode_params(types: &[ParamType], data: &[u8], base: usize) -> Result<Vec<Token>, AbiError> {
    let mut cursor = base;
    let mut tokens = Vec::with_capacity(types.len());

    for ty in types {
        if ty.is_dynamic() {
            let relative = read_usize(data, cursor)?;
            let at = base
                .checked_add(relative)
                .ok_or(AbiError::IntegerOverflow { bits: 64 })?;
            tokens.push(decode_at(ty, data, at)?);
            cursor += WORD;
        } else {
            tokens.push(decode_at(ty, data, cursor)?);
            cursor += ty.head_size();
        }
    }

    Ok(tokens)
}

fn decode_at(ty: &ParamType, data: &[u8], at: usize) -> Result<Token, AbiError> {
    match ty {
        ParamType::Address => {
            let word = read_word(data, at)?;
            if word[..12].iter().any(|b| *b != 0) {
                return Err(AbiError::DirtyAddress);
            }
            let mut address = [0u8; 20];
            address.copy_from_slice(&word[12..]);
            Ok(Token::Address(Address(address)))
        }
        ParamType::Uint(bits) => {
            let word = read_word(data, at)?;
            if *bits < 256 {
                let full_bytes = (256 - *bits as usize) / 8;
                if word[..full_bytes].iter().any(|b| *b != 0) {
                    return Err(AbiError::IntegerOverflow { bits: *bits });
                }
            }
            Ok(Token::Uint(word))
        }
        ParamType::Bool => match word_to_u128(&read_word(data, at)?) {
            Ok(0) => Ok(Token::Bool(false)),
            Ok(1) => Ok(Token::Bool(true)),
            _ => Err(AbiError::InvalidBool),
        },
        ParamType::FixedBytes(len) => {
            let word = read_word(data, at)?;
            Ok(Token::FixedBytes(word[..(*len).min(WORD)].to_vec()))
        }
        ParamType::Bytes => Ok(Token::Bytes(read_dynamic(data, at)?.to_vec())),
        ParamType::String => {
            let bytes = read_dynamic(data, at)?;
            String::from_utf8(bytes.to_vec())
                .map(Token::String)
                .map_err(|_| AbiError::InvalidUtf8)
        }
        ParamType::Array(inner) => {
            let len = read_usize(data, at)?;
            let body = at + WORD;
            let needed = len.saturating_mul(inner.head_size());
            ensure_available(data, body, needed)?;
            let types = vec![(**inner).clone(); len];
            decode_params(&types, data, body).map(Token::Array)
        }
        ParamType::Tuple(members) => decode_params(members, data, at).map(Token::Tuple),
    }
}

fn ensure_available(data: &[u8], offset: usize, needed: usize) -> Result<(), AbiError> {
    match offset.checked_add(needed) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(AbiError::OutOfBounds {
            offset,
            needed,
            available: data.len(),
        }),
    }
}

fn read_word(data: &[u8], at: usize) -> Result<Word, AbiError> {
    ensure_available(data, at, WORD)?;
    let mut word = [0u8; WORD];
    word.copy_from_slice(&data[at..at + WORD]);
    Ok(word)
}

fn read_usize(data: &[u8], at: usize) -> Result<usize, AbiError> {
    let value = word_to_u128(&read_word(data, at)?)?;
    usize::try_from(value).map_err(|_| AbiError::IntegerOverflow { bits: usize::BITS })
}

fn read_dynamic(data: &[u8], at: usize) -> Result<&[u8], AbiError> {
    let len = read_usize(data, at)?;
    let start = at + WORD;
    ensure_available(data, start, len)?;
    Ok(&data[start..start + len])
}

/// Checks a decoded list has exactly `N` members and hands them back as an array.
pub fn expect_arity<const N: usize>(tokens: Vec<Token>) -> Result<[Token; N], AbiError> {
    let found = tokens.len();
    tokens
        .try_into()
        .map_err(|_| AbiError::Arity { expected: N, found })
}

#[cfg(test)]
#[path = "tests/codec_tests.rs"]
mod tests;
