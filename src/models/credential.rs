// src/models/credential.rs
//! Verifiable Credential data model implementation.
//!
//! Defines the structure of W3C Verifiable Credentials (VCs) signed with
//! secp256k1 over Keccak-256, following the
//! [W3C Verifiable Credentials Data Model](https://www.w3.org/TR/vc-data-model/).
//!
//! Field declaration order is significant: it is the order of the canonical
//! signing pre-image.

use crate::error::Result;
use crate::utils::crypto::hash_data;
use crate::utils::serialization::{to_canonical_bytes, to_go_json_value};
use chrono::{DateTime, Utc};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Base context of every issued credential.
pub const CREDENTIALS_CONTEXT_V1: &str = "https://www.w3.org/2018/credentials/v1";

/// Base type of every issued credential.
pub const VERIFIABLE_CREDENTIAL_TYPE: &str = "VerifiableCredential";

/// A Verifiable Credential according to W3C standards.
///
/// Built once at issuance and never mutated afterwards; verification works
/// on a proof-less clone.
///
/// # Security Considerations
/// - The issuer DID must be resolved before the proof means anything
/// - Claims are not validated against any schema
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VerifiableCredential {
    /// JSON-LD contexts; absent on credentials from tooling that omits it
    #[serde(rename = "@context", default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,

    /// Unique URI identifier for the credential
    /// Example: "urn:uuid:123e4567-e89b-12d3-a456-426614174000"
    pub id: String,

    /// Credential types, starting with "VerifiableCredential"
    #[serde(rename = "type")]
    pub types: Vec<String>,

    /// DID of the credential issuer
    pub issuer: String,

    /// Issuance time, whole seconds in UTC
    #[serde(rename = "issuanceDate")]
    pub issuance_date: DateTime<Utc>,

    /// Claims about the subject; always contains "id" = subject DID
    #[serde(rename = "credentialSubject")]
    pub credential_subject: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<CredentialProof>,
}

/// Signature attached to a credential.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialProof {
    /// Key-suite tag, matched against the issuer's key types
    #[serde(rename = "type")]
    pub proof_type: String,
    pub created: DateTime<Utc>,
    /// Hex `r || s` without `0x`; the recovery byte is not included
    #[serde(rename = "proofValue")]
    pub proof_value: String,
}

/// Caller-supplied description of a credential to issue.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialMeta {
    pub id: String,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub issuer: String,
    pub subject: String,
}

/// Outcome of a successful verification, for display.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub credential_id: String,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub issuer: String,
    pub subject_id: Option<String>,
    pub issuance_date: DateTime<Utc>,
    /// Subject claims without "id", in key order
    pub claims: BTreeMap<String, Value>,
    /// Id of the issuer key that validated the signature
    pub verification_method: String,
    /// Account derived from that key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_address: Option<Address>,
}

impl VerifiableCredential {
    /// Canonical bytes of the credential with its proof cleared.
    ///
    /// Both issuance and verification hash exactly these bytes. Subject
    /// claims are normalized to sorted keys and float64 numbers first.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        let unsigned = VerifiableCredential {
            credential_subject: self
                .credential_subject
                .iter()
                .map(|(k, v)| (k.clone(), to_go_json_value(v.clone())))
                .collect(),
            proof: None,
            ..self.clone()
        };
        Ok(to_canonical_bytes(&unsigned)?)
    }

    /// Keccak-256 of [`signing_bytes`](Self::signing_bytes).
    pub fn signing_digest(&self) -> Result<[u8; 32]> {
        Ok(hash_data(&self.signing_bytes()?))
    }

    /// The subject DID from `credentialSubject["id"]`, if it is a string.
    pub fn subject_id(&self) -> Option<&str> {
        self.credential_subject.get("id").and_then(Value::as_str)
    }
}
