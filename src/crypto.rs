//! Hash primitives used by scripts and signatures

use crate::constants::HASH160_LEN;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// HASH160: RIPEMD160(SHA256(x))
pub fn hash160(data: &[u8]) -> [u8; HASH160_LEN] {
    let sha256_hash = Sha256::digest(data);
    let ripemd160_hash = Ripemd160::digest(&sha256_hash);
    let mut out = [0u8; HASH160_LEN];
    out.copy_from_slice(&ripemd160_hash);
    out
}

/// HASH160 rendered as lowercase hex
pub fn hash160_hex(data: &[u8]) -> String {
    hex::encode(hash160(data))
}

/// Bytes a stack item stands for when hashed.
///
/// Even-length hex items (keys, signatures, digests) hash as the bytes they
/// encode; anything else hashes as its UTF-8 text.
pub fn stack_item_bytes(item: &str) -> Vec<u8> {
    match hex::decode(item) {
        Ok(bytes) if !item.is_empty() => bytes,
        _ => item.as_bytes().to_vec(),
    }
}
