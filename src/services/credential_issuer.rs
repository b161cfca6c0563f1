// src/services/credential_issuer.rs
//! Credential Issuer Service
//!
//! Builds Verifiable Credentials and signs them with the issuer's key.
//!
//! The signature covers the Keccak-256 digest of the credential's canonical
//! JSON without its proof. Issuance is purely local: no registry or store is
//! consulted, so the issuer DID is not checked to be anchored.

use crate::error::{DidError, Result};
use crate::models::credential::{
    CredentialMeta, CredentialProof, VerifiableCredential, CREDENTIALS_CONTEXT_V1,
    VERIFIABLE_CREDENTIAL_TYPE,
};
use crate::models::did::SECP256K1_KEY_TYPE;
use crate::models::identifier::Did;
use crate::wallet::key_management::KeyManager;
use chrono::{DateTime, SubsecRound, Utc};
use ethers::utils::hex;
use log::debug;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Service for issuing signed credentials.
#[derive(Clone)]
pub struct CredentialIssuer {
    /// Signing capability of the issuer
    signer: Arc<KeyManager>,
}

impl CredentialIssuer {
    pub fn new(signer: Arc<KeyManager>) -> Self {
        Self { signer }
    }

    /// Issues a credential stamped with the current time.
    ///
    /// # Arguments
    /// * `meta` - Credential id, types, issuer DID and subject DID
    /// * `claims` - Subject claims; any `"id"` entry is replaced by the subject DID
    ///
    /// # Returns
    /// The signed credential
    pub fn issue(&self, meta: &CredentialMeta, claims: Map<String, Value>) -> Result<VerifiableCredential> {
        self.issue_at(meta, claims, Utc::now())
    }

    /// Issues a credential as of `now`, truncated to whole seconds.
    ///
    /// # Errors
    /// - [`DidError::Validation`] if the id or types are empty, or either DID
    ///   does not parse
    /// - [`DidError::Signing`] if the signature cannot be produced
    pub fn issue_at(
        &self,
        meta: &CredentialMeta,
        claims: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<VerifiableCredential> {
        validate(meta)?;

        let mut subject: BTreeMap<String, Value> = claims.into_iter().collect();
        subject.insert("id".to_string(), Value::String(meta.subject.clone()));

        let issued = now.trunc_subsecs(0);

        let mut types = vec![VERIFIABLE_CREDENTIAL_TYPE.to_string()];
        for t in &meta.types {
            if !types.contains(t) {
                types.push(t.clone());
            }
        }

        let mut credential = VerifiableCredential {
            context: vec![CREDENTIALS_CONTEXT_V1.to_string()],
            id: meta.id.clone(),
            types,
            issuer: meta.issuer.clone(),
            issuance_date: issued,
            credential_subject: subject,
            proof: None,
        };

        let digest = credential.signing_digest()?;
        let signature = self.signer.sign_recoverable(&digest)?;

        // r || s only; the verifier matches keys without the recovery id.
        credential.proof = Some(CredentialProof {
            proof_type: SECP256K1_KEY_TYPE.to_string(),
            created: issued,
            proof_value: hex::encode(&signature[..64]),
        });
        debug!("Issued credential {} by {}", credential.id, credential.issuer);
        Ok(credential)
    }
}

fn validate(meta: &CredentialMeta) -> Result<()> {
    if meta.id.trim().is_empty() {
        return Err(DidError::Validation("credential id is required".into()));
    }
    if meta.types.is_empty() || meta.types.iter().any(|t| t.trim().is_empty()) {
        return Err(DidError::Validation("credential type is required".into()));
    }
    Did::parse(&meta.issuer)
        .map_err(|e| DidError::Validation(format!("invalid credential issuer DID: {}", e)))?;
    Did::parse(&meta.subject)
        .map_err(|e| DidError::Validation(format!("invalid credential subject DID: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn issuer() -> CredentialIssuer {
        CredentialIssuer::new(Arc::new(KeyManager::from_hex(TEST_KEY).unwrap()))
    }

    fn meta() -> CredentialMeta {
        CredentialMeta {
            id: "urn:1".into(),
            types: vec!["ProofOfAge".into()],
            issuer: "did:go:issuer1".into(),
            subject: "did:go:subj1".into(),
        }
    }

    fn claims(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn issues_signed_credential() {
        let now = Utc.with_ymd_and_hms(2019, 3, 14, 15, 9, 26).unwrap()
            + chrono::Duration::milliseconds(789);
        let cred = issuer().issue_at(&meta(), claims(json!({"age": 21})), now).unwrap();

        assert_eq!(cred.context, vec![CREDENTIALS_CONTEXT_V1.to_string()]);
        assert_eq!(cred.types, vec!["VerifiableCredential", "ProofOfAge"]);
        assert_eq!(cred.issuance_date.timestamp_subsec_nanos(), 0);
        assert_eq!(
            serde_json::to_value(&cred.credential_subject).unwrap(),
            json!({"id": "did:go:subj1", "age": 21})
        );

        let proof = cred.proof.as_ref().unwrap();
        assert_eq!(proof.proof_type, SECP256K1_KEY_TYPE);
        assert_eq!(proof.created, cred.issuance_date);
        assert_eq!(proof.proof_value.len(), 128);
        assert!(!proof.proof_value.starts_with("0x"));
    }

    #[test]
    fn subject_id_overrides_claim() {
        let cred = issuer()
            .issue(&meta(), claims(json!({"id": "did:go:someone-else", "name": "x"})))
            .unwrap();
        assert_eq!(cred.subject_id(), Some("did:go:subj1"));
    }

    #[test]
    fn signing_is_deterministic_for_same_input() {
        let now = Utc::now();
        let a = issuer().issue_at(&meta(), claims(json!({"age": 21})), now).unwrap();
        let b = issuer().issue_at(&meta(), claims(json!({"age": 21})), now).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_base_type_is_not_repeated() {
        let mut m = meta();
        m.types = vec!["VerifiableCredential".into(), "ProofOfAge".into()];
        let cred = issuer().issue(&m, Map::new()).unwrap();
        assert_eq!(cred.types, vec!["VerifiableCredential", "ProofOfAge"]);
    }

    #[test]
    fn rejects_invalid_meta() {
        let cases: Vec<Box<dyn Fn(&mut CredentialMeta)>> = vec![
            Box::new(|m: &mut CredentialMeta| m.id.clear()),
            Box::new(|m: &mut CredentialMeta| m.types.clear()),
            Box::new(|m: &mut CredentialMeta| m.issuer = "issuer1".into()),
            Box::new(|m: &mut CredentialMeta| m.subject = "did:go:".into()),
        ];
        for mutate in cases {
            let mut m = meta();
            mutate(&mut m);
            let err = issuer().issue(&m, Map::new()).unwrap_err();
            assert!(matches!(err, DidError::Validation(_)), "{:?}", m);
        }
    }
}
