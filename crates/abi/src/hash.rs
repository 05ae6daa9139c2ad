use sha3::{Digest, Keccak256};
use shared::domain::{Selector, B256};

pub const LENS_MODULE: &str = "LENS_MODULE";
/// ERC-165 `supportsInterface(bytes4)` itself.
pub const ERC165_INTERFACE_ID: Selector = Selector([0x01, 0xff, 0xc9, 0xa7]);

pub fn keccak256(bytes: impl AsRef<[u8]>) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(bytes.as_ref());
    hasher.finalize().into()
}

pub fn selector(signature: &str) -> Selector {
    let digest = keccak256(signature.as_bytes());
    Selector([digest[0], digest[1], digest[2], digest[3]])
}

pub fn event_topic(signature: &str) -> B256 {
    B256(keccak256(signature.as_bytes()))
}

/// Interface id derived as the first four bytes of `keccak256(name)`, the
/// scheme Lens modules use for `LENS_MODULE`.
pub fn named_interface_id(name: &str) -> Selector {
    selector(name)
}

pub fn lens_module_interface_id() -> Selector {
    named_interface_id(LENS_MODULE)
}
