use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ProfileId);
id_newtype!(PublicationId);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexParseError {
    #[error("missing 0x prefix")]
    MissingPrefix,
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("invalid hex: {0}")]
    Hex(String),
}

/// Decodes a `0x`-prefixed hex string of any even length.
pub fn decode_prefixed_hex(raw: &str) -> Result<Vec<u8>, HexParseError> {
    let digits = raw
        .trim()
        .strip_prefix("0x")
        .or_else(|| raw.trim().strip_prefix("0X"))
        .ok_or(HexParseError::MissingPrefix)?;
    hex::decode(digits).map_err(|err| HexParseError::Hex(err.to_string()))
}

pub fn encode_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

macro_rules! fixed_bytes_newtype {
    ($name:ident, $len:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;
            pub const ZERO: Self = Self([0u8; $len]);

            pub fn from_slice(bytes: &[u8]) -> Result<Self, HexParseError> {
                let inner: [u8; $len] =
                    bytes.try_into().map_err(|_| HexParseError::Length {
                        expected: $len,
                        actual: bytes.len(),
                    })?;
                Ok(Self(inner))
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = HexParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_slice(&decode_prefixed_hex(s)?)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&encode_prefixed_hex(&self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes_newtype!(Address, 20);
fixed_bytes_newtype!(TxHash, 32);
fixed_bytes_newtype!(B256, 32);
fixed_bytes_newtype!(Selector, 4);

/// A content item on the host social graph. Never mutated once the host
/// platform has created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicationRef {
    pub profile_id: ProfileId,
    pub publication_id: PublicationId,
}

impl PublicationRef {
    pub fn new(profile_id: ProfileId, publication_id: PublicationId) -> Self {
        Self {
            profile_id,
            publication_id,
        }
    }
}

impl fmt::Display for PublicationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.profile_id, self.publication_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PubType {
    Nonexistent = 0,
    Post = 1,
    Comment = 2,
    Mirror = 3,
    Quote = 4,
}

impl TryFrom<u8> for PubType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Nonexistent),
            1 => Ok(Self::Post),
            2 => Ok(Self::Comment),
            3 => Ok(Self::Mirror),
            4 => Ok(Self::Quote),
            other => Err(other),
        }
    }
}

pub const ETHER_DECIMALS: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("empty amount")]
    Empty,
    #[error("invalid digit in amount '{0}'")]
    InvalidDigit(String),
    #[error("too many fractional digits in '{value}' (max {decimals})")]
    TooPrecise { value: String, decimals: u32 },
    #[error("amount '{0}' overflows")]
    Overflow(String),
}

/// Token amount in the token's smallest unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TokenAmount(pub u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    /// Parses a human decimal such as `"0.01"` scaled by `decimals`.
    pub fn parse_units(raw: &str, decimals: u32) -> Result<Self, AmountParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AmountParseError::Empty);
        }

        let (whole, fraction) = match raw.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (raw, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(AmountParseError::InvalidDigit(raw.to_string()));
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(AmountParseError::InvalidDigit(raw.to_string()));
        }
        if fraction.len() > decimals as usize {
            return Err(AmountParseError::TooPrecise {
                value: raw.to_string(),
                decimals,
            });
        }

        let overflow = || AmountParseError::Overflow(raw.to_string());
        let scale = 10u128.checked_pow(decimals).ok_or_else(overflow)?;
        let whole_units = if whole.is_empty() {
            0
        } else {
            whole.parse::<u128>().map_err(|_| overflow())?
        };
        let fraction_units = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{fraction:0<width$}", width = decimals as usize);
            padded.parse::<u128>().map_err(|_| overflow())?
        };

        whole_units
            .checked_mul(scale)
            .and_then(|units| units.checked_add(fraction_units))
            .map(Self)
            .ok_or_else(overflow)
    }

    pub fn parse_ether(raw: &str) -> Result<Self, AmountParseError> {
        Self::parse_units(raw, ETHER_DECIMALS)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ether_amounts() {
        assert_eq!(
            TokenAmount::parse_ether("1").expect("one"),
            TokenAmount(1_000_000_000_000_000_000)
        );
        assert_eq!(
            TokenAmount::parse_ether("0.01").expect("cent"),
            TokenAmount(10_000_000_000_000_000)
        );
        assert_eq!(TokenAmount::parse_ether(".5").expect("half").0, 5 * 10u128.pow(17));
        assert!(matches!(
            TokenAmount::parse_ether("1.0000000000000000001"),
            Err(AmountParseError::TooPrecise { .. })
        ));
        assert!(TokenAmount::parse_ether("1e18").is_err());
        assert!(TokenAmount::parse_ether("").is_err());
    }

    #[test]
    fn address_round_trips_through_display() {
        let raw = "0x5de679113ea5fdc6a0239fbbbb8c476456dd4a1a";
        let address: Address = raw.parse().expect("address");
        assert_eq!(address.to_string(), raw);

        let mixed: Address = "0x5de679113eA5fdC6a0239fBbBb8C476456dD4A1A"
            .parse()
            .expect("mixed case");
        assert_eq!(mixed, address);
    }

    #[test]
    fn rejects_short_or_unprefixed_addresses() {
        assert_eq!(
            "0x1234".parse::<Address>(),
            Err(HexParseError::Length {
                expected: 20,
                actual: 2
            })
        );
        assert_eq!(
            "5de679113ea5fdc6a0239fbbbb8c476456dd4a1a".parse::<Address>(),
            Err(HexParseError::MissingPrefix)
        );
    }
}
