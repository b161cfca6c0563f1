// src/utils/crypto.rs
//! Cryptographic utilities optimized for blockchain compatibility.
//!
//! Uses Keccak-256 (Ethereum's standard hash function) for all digests, and the
//! Ethereum convention for deriving account addresses from secp256k1 keys.

use crate::error::{DidError, Result};
use ethers::types::Address;
use ethers::utils::{hex, keccak256};

/// Computes a Keccak-256 hash of the input data (Ethereum-compatible).
///
/// # Arguments
/// * `data` - Binary data to hash (as bytes slice)
///
/// # Returns
/// Fixed-size 32-byte array (`[u8; 32]`) containing the hash.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

/// Derives the Ethereum address of an uncompressed SEC1 public key.
///
/// The address is the last 20 bytes of the Keccak-256 hash of the 64 raw
/// coordinate bytes (the key without its `0x04` prefix).
///
/// # Errors
/// [`DidError::Validation`] if the key is not 65 bytes starting with `0x04`.
pub fn address_from_public_key(public_key: &[u8]) -> Result<Address> {
    if public_key.len() != 65 || public_key[0] != 0x04 {
        return Err(DidError::Validation(
            "expected a 65-byte uncompressed public key".into(),
        ));
    }
    let hash = hash_data(&public_key[1..]);
    Ok(Address::from_slice(&hash[12..]))
}

/// Decodes hex with or without a `0x` prefix.
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(trimmed).map_err(|e| DidError::Encoding(format!("invalid hex: {}", e)))
}
