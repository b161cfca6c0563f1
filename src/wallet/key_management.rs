// src/wallet/key_management.rs
//! Signing capability for DID owners and credential issuers.
//!
//! A [`KeyManager`] owns one secp256k1 private key and exposes only what the
//! protocol needs from it:
//! - The uncompressed public key published in DID Documents
//! - The Ethereum address that owns registry entries
//! - Recoverable ECDSA signatures over 32-byte Keccak-256 digests
//!
//! # Security Notes
//! - The secret key is never exposed, formatted or logged
//! - `k256` zeroizes the key when the manager is dropped
//! - Signatures are deterministic (RFC 6979) and low-S normalized

use crate::error::{DidError, Result};
use crate::utils::crypto::decode_hex;
use ethers::signers::LocalWallet;
use ethers::types::Address;
use ethers::utils::secret_key_to_address;
use k256::ecdsa::SigningKey;
use std::fmt;

/// Owner of a secp256k1 signing key.
///
/// Pass it by reference (or behind an `Arc`) to the operations that sign;
/// it is deliberately not `Clone`.
pub struct KeyManager {
    signing_key: SigningKey,
    address: Address,
}

impl KeyManager {
    /// Generates a KeyManager with a fresh random key from the OS RNG.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    /// Loads a hex-encoded 32-byte private key (with or without `0x`).
    ///
    /// # Errors
    /// [`DidError::Validation`] if the input is not a valid secp256k1 scalar.
    /// The message never echoes the input.
    pub fn from_hex(private_key: &str) -> Result<Self> {
        let bytes = decode_hex(private_key.trim())
            .map_err(|_| DidError::Validation("private key is not valid hex".into()))?;
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|_| DidError::Validation("private key is not a valid secp256k1 key".into()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = secret_key_to_address(&signing_key);
        KeyManager {
            signing_key,
            address,
        }
    }

    /// Uncompressed SEC1 public key (65 bytes, `0x04 || X || Y`).
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Ethereum address derived from the public key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs a 32-byte digest, returning `r || s || v` (65 bytes).
    ///
    /// `v` is the recovery id (0 or 1), matching go-ethereum's `crypto.Sign`.
    pub fn sign_recoverable(&self, digest: &[u8; 32]) -> Result<[u8; 65]> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| DidError::Signing(e.to_string()))?;

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte();
        Ok(out)
    }

    /// Wallet used by the chain client to sign registry transactions.
    pub(crate) fn wallet(&self) -> LocalWallet {
        LocalWallet::from(self.signing_key.clone())
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::crypto::{address_from_public_key, hash_data};
    use ethers::signers::Signer;
    use k256::ecdsa::signature::hazmat::PrehashVerifier;
    use k256::ecdsa::{Signature, VerifyingKey};

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_known_address() {
        let km = KeyManager::from_hex(TEST_KEY).unwrap();
        let expected: Address = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23".parse().unwrap();
        assert_eq!(km.address(), expected);
        assert_eq!(km.wallet().address(), expected);
    }

    #[test]
    fn test_from_hex_accepts_prefix() {
        let a = KeyManager::from_hex(TEST_KEY).unwrap();
        let b = KeyManager::from_hex(&format!("0x{}", TEST_KEY)).unwrap();
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn test_from_hex_rejects_garbage_without_echoing_it() {
        let err = KeyManager::from_hex("not-a-key").unwrap_err();
        assert!(matches!(err, DidError::Validation(_)));
        assert!(!err.to_string().contains("not-a-key"));

        assert!(KeyManager::from_hex("00").is_err());
    }

    #[test]
    fn test_public_key_is_uncompressed() {
        let km = KeyManager::generate();
        let pk = km.public_key_bytes();
        assert_eq!(pk.len(), 65);
        assert_eq!(pk[0], 0x04);
        assert_eq!(address_from_public_key(&pk).unwrap(), km.address());
    }

    #[test]
    fn test_sign_recoverable_verifies() {
        let km = KeyManager::from_hex(TEST_KEY).unwrap();
        let digest = hash_data(b"hello world");
        let sig = km.sign_recoverable(&digest).unwrap();
        assert!(sig[64] <= 1);

        let vk = VerifyingKey::from_sec1_bytes(&km.public_key_bytes()).unwrap();
        let signature = Signature::from_slice(&sig[..64]).unwrap();
        assert!(vk.verify_prehash(&digest, &signature).is_ok());

        let other = hash_data(b"hello worlD");
        assert!(vk.verify_prehash(&other, &signature).is_err());
    }

    #[test]
    fn test_signatures_are_deterministic() {
        let km = KeyManager::from_hex(TEST_KEY).unwrap();
        let digest = hash_data(b"same input");
        assert_eq!(
            km.sign_recoverable(&digest).unwrap(),
            km.sign_recoverable(&digest).unwrap()
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let km = KeyManager::from_hex(TEST_KEY).unwrap();
        let rendered = format!("{:?}", km);
        assert!(!rendered.contains("4c0883a6"));
        assert!(rendered.contains("address"));
    }
}
