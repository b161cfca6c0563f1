// src/services/verifier.rs
//! Credential verification service for the DID system.
//!
//! Resolves the issuer's DID Document and checks the credential's signature
//! against the issuer's public keys. Proofs carry no recovery id, so every
//! key with a matching suite is tried in document order until one verifies.

use crate::error::{DidError, Result};
use crate::models::credential::{VerifiableCredential, VerificationResult};
use crate::models::did::{DIDDocument, PublicKey, SECP256K1_KEY_TYPE};
use crate::models::identifier::Did;
use crate::services::resolver::Resolver;
use crate::utils::crypto::{address_from_public_key, decode_hex};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

/// Credential verifier backed by a [`Resolver`].
#[derive(Clone)]
pub struct Verifier {
    resolver: Resolver,
}

impl Verifier {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    /// Verifies `credential` against its issuer's anchored document.
    ///
    /// # Errors
    /// Always [`DidError::Verification`]. Resolution failures are attached
    /// as the error's source.
    pub async fn verify(
        &self,
        credential: &VerifiableCredential,
        cancel: &CancellationToken,
    ) -> Result<VerificationResult> {
        if credential.proof.is_none() {
            return Err(DidError::verification("credential has no proof"));
        }
        let issuer = Did::parse(&credential.issuer).map_err(|e| {
            DidError::verification_caused_by("invalid issuer DID", DidError::Parse(e))
        })?;
        let document = self
            .resolver
            .resolve(&issuer, cancel)
            .await
            .map_err(|e| {
                warn!("Cannot resolve issuer {}: {}", issuer, e);
                DidError::verification_caused_by(
                    format!("cannot read issuer DID document for {}", issuer),
                    e,
                )
            })?;
        verify_with_document(credential, &document)
    }
}

/// Verifies `credential` against an already resolved issuer `document`.
///
/// # Errors
/// [`DidError::Verification`] if the proof is missing or malformed, its suite
/// is unsupported, or no candidate key validates the signature.
pub fn verify_with_document(
    credential: &VerifiableCredential,
    document: &DIDDocument,
) -> Result<VerificationResult> {
    let proof = credential
        .proof
        .as_ref()
        .ok_or_else(|| DidError::verification("credential has no proof"))?;
    if proof.proof_type != SECP256K1_KEY_TYPE {
        return Err(DidError::verification(format!(
            "unsupported proof type {}",
            proof.proof_type
        )));
    }

    let signature = decode_hex(&proof.proof_value)
        .ok()
        .filter(|bytes| bytes.len() == 64)
        .and_then(|bytes| Signature::from_slice(&bytes).ok())
        .ok_or_else(|| DidError::verification("malformed proof value"))?;

    let digest = credential
        .signing_digest()
        .map_err(|e| DidError::verification_caused_by("cannot hash credential", e))?;

    let (key, verifying_key) = document
        .public_keys
        .iter()
        .filter(|key| key.key_type == proof.proof_type)
        .filter_map(|key| verifying_key(key).map(|vk| (key, vk)))
        .find(|(_, vk)| vk.verify_prehash(&digest, &signature).is_ok())
        .ok_or_else(|| DidError::verification("no issuer key verifies the credential proof"))?;
    debug!("Credential {} verified with {}", credential.id, key.id);

    let mut claims = credential.credential_subject.clone();
    let subject_id = claims
        .remove("id")
        .and_then(|v| v.as_str().map(str::to_string));

    Ok(VerificationResult {
        credential_id: credential.id.clone(),
        types: credential.types.clone(),
        issuer: credential.issuer.clone(),
        subject_id,
        issuance_date: credential.issuance_date,
        claims,
        verification_method: key.id.clone(),
        signer_address: address_from_public_key(verifying_key.to_encoded_point(false).as_bytes())
            .ok(),
    })
}

/// Parses a key's material as a secp256k1 point; undecodable keys are skipped.
fn verifying_key(key: &PublicKey) -> Option<VerifyingKey> {
    match key
        .material
        .to_bytes()
        .and_then(|bytes| {
            VerifyingKey::from_sec1_bytes(&bytes)
                .map_err(|e| DidError::Encoding(e.to_string()))
        }) {
        Ok(vk) => Some(vk),
        Err(e) => {
            debug!("Skipping key {}: {}", key.id, e);
            None
        }
    }
}
