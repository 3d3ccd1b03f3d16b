//! Transaction signing digest and ECDSA verification
//!
//! The signed message is the HASH160 of a canonical JSON rendering of the
//! transaction with every `scriptSig` left out. Fields are emitted in the
//! declaration order of [`SigningView`], so the rendering is deterministic.

use crate::crypto::hash160;
use crate::error::{ConsensusError, Result};
use crate::types::*;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey, Verification};
use serde::Serialize;

/// Length of a compact `r || s` signature
const COMPACT_SIGNATURE_LEN: usize = 64;

/// Length of an uncompressed public key without its `0x04` tag
const RAW_PUBKEY_LEN: usize = 64;

#[derive(Serialize)]
struct SigningInput<'a> {
    txid: &'a str,
    vout: u32,
}

#[derive(Serialize)]
struct SigningOutput<'a> {
    value: Amount,
    n: u32,
    #[serde(rename = "scriptPubKey")]
    script_pubkey: &'a str,
}

/// Everything a signature commits to
#[derive(Serialize)]
struct SigningView<'a> {
    txid: &'a str,
    hash: Option<&'a str>,
    version: u32,
    size: Option<u64>,
    locktime: u32,
    vin: Vec<SigningInput<'a>>,
    vout: Vec<SigningOutput<'a>>,
    blockhash: Option<&'a str>,
    confirmations: Option<u64>,
    time: Option<u64>,
    blocktime: Option<u64>,
}

impl<'a> SigningView<'a> {
    fn of(tx: &'a Transaction) -> Self {
        Self {
            txid: &tx.txid,
            hash: tx.hash.as_deref(),
            version: tx.version,
            size: tx.size,
            locktime: tx.locktime,
            vin: tx
                .inputs
                .iter()
                .map(|input| SigningInput {
                    txid: &input.prevout.txid,
                    vout: input.prevout.index,
                })
                .collect(),
            vout: tx
                .outputs
                .iter()
                .map(|output| SigningOutput {
                    value: output.value,
                    n: output.index,
                    script_pubkey: &output.script_pubkey,
                })
                .collect(),
            blockhash: tx.blockhash.as_deref(),
            confirmations: tx.confirmations,
            time: tx.time,
            blocktime: tx.blocktime,
        }
    }
}

/// Canonical byte rendering of `tx` for signing
pub fn signing_bytes(tx: &Transaction) -> Result<Vec<u8>> {
    serde_json::to_vec(&SigningView::of(tx)).map_err(|e| ConsensusError::Serialization(e.to_string()))
}

/// Signature digest of `tx`.
///
/// HASH160 yields 20 bytes; it is left-padded with zeros to the 32 bytes
/// secp256k1 expects, which keeps the same integer value for ECDSA.
pub fn sighash(tx: &Transaction) -> Result<[u8; 32]> {
    let digest = hash160(&signing_bytes(tx)?);
    let mut message = [0u8; 32];
    message[32 - digest.len()..].copy_from_slice(&digest);
    Ok(message)
}

/// Decode a hex signature, compact or DER, normalized to low-S
pub fn decode_signature(sig_hex: &str) -> Result<Signature> {
    let bytes = hex::decode(sig_hex).map_err(|e| ConsensusError::InvalidSignature(format!("signature hex: {}", e)))?;
    let mut signature = if bytes.len() == COMPACT_SIGNATURE_LEN {
        Signature::from_compact(&bytes)
    } else {
        Signature::from_der(&bytes)
    }
    .map_err(|e| ConsensusError::InvalidSignature(format!("signature encoding: {}", e)))?;
    signature.normalize_s();
    Ok(signature)
}

/// Decode a hex public key: SEC compressed/uncompressed, or raw `x || y`
pub fn decode_pubkey(pubkey_hex: &str) -> Result<PublicKey> {
    let mut bytes = hex::decode(pubkey_hex).map_err(|e| ConsensusError::InvalidSignature(format!("public key hex: {}", e)))?;
    if bytes.len() == RAW_PUBKEY_LEN {
        bytes.insert(0, 0x04);
    }
    PublicKey::from_slice(&bytes).map_err(|e| ConsensusError::InvalidSignature(format!("public key: {}", e)))
}

fn try_verify<C: Verification>(secp: &Secp256k1<C>, tx: &Transaction, sig_hex: &str, pubkey_hex: &str) -> Result<()> {
    let pubkey = decode_pubkey(pubkey_hex)?;
    let signature = decode_signature(sig_hex)?;
    let message = Message::from_digest(sighash(tx)?);
    secp.verify_ecdsa(&message, &signature, &pubkey)
        .map_err(|e| ConsensusError::InvalidSignature(e.to_string()))
}

/// Verify `sig_hex` over `tx` with `pubkey_hex`.
///
/// Total: malformed input of any kind is reported as `false`.
pub fn verify_signature(tx: &Transaction, sig_hex: &str, pubkey_hex: &str) -> bool {
    let secp = Secp256k1::verification_only();
    match try_verify(&secp, tx, sig_hex, pubkey_hex) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("signature check failed for {}: {}", tx.txid, e);
            false
        }
    }
}

/// Sign `tx` with `secret_key`, returning a compact hex signature
pub fn sign_transaction(tx: &Transaction, secret_key: &SecretKey) -> Result<String> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(sighash(tx)?);
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(hex::encode(signature.serialize_compact()))
}
