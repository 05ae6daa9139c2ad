//! Solidity ABI encoding for the recipe open action tooling.

pub mod codec;
pub mod hash;
pub mod recipe;
pub mod revert;

pub use codec::{decode, encode, AbiError, ParamType, Token};
pub use hash::{event_topic, keccak256, lens_module_interface_id, selector};
pub use revert::Revert;
