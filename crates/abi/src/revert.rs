use shared::domain::Selector;

use crate::{
    codec::{decode, encode, word_to_u128, ParamType, Token},
    hash::selector,
};

pub const ERROR_STRING_SIGNATURE: &str = "Error(string)";
pub const PANIC_SIGNATURE: &str = "Panic(uint256)";

/// Decoded revert payload of a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revert {
    Reason(String),
    Panic(u128),
    Custom { selector: Selector, data: Vec<u8> },
    Empty,
}

impl Revert {
    pub fn decode(data: &[u8]) -> Self {
        if data.len() < 4 {
            return Revert::Empty;
        }
        let head = Selector([data[0], data[1], data[2], data[3]]);
        let body = &data[4..];

        if head == selector(ERROR_STRING_SIGNATURE) {
            if let Ok(mut tokens) = decode(&[ParamType::String], body) {
                if let Some(Token::String(reason)) = tokens.pop() {
                    return Revert::Reason(reason);
                }
            }
        }
        if head == selector(PANIC_SIGNATURE) {
            if let Ok(mut tokens) = decode(&[ParamType::Uint(256)], body) {
                if let Some(Token::Uint(word)) = tokens.pop() {
                    if let Ok(code) = word_to_u128(&word) {
                        return Revert::Panic(code);
                    }
                }
            }
        }

        Revert::Custom {
            selector: head,
            data: body.to_vec(),
        }
    }

    pub fn is_custom(&self, signature: &str) -> bool {
        matches!(self, Revert::Custom { selector: s, .. } if *s == selector(signature))
    }

    pub fn describe(&self) -> String {
        match self {
            Revert::Reason(reason) => reason.clone(),
            Revert::Panic(code) => format!("panic 0x{code:02x}"),
            Revert::Custom { selector, .. } => format!("custom error {selector}"),
            Revert::Empty => "reverted without data".to_string(),
        }
    }
}

pub fn encode_reason(reason: &str) -> Vec<u8> {
    let mut out = selector(ERROR_STRING_SIGNATURE).0.to_vec();
    out.extend(encode(&[Token::String(reason.to_string())]));
    out
}

pub fn encode_custom(signature: &str) -> Vec<u8> {
    selector(signature).0.to_vec()
}
