// src/models/did.rs
//! Decentralized Identifier (DID) Document data model.
//!
//! Defines the DID Document anchored in the registry, following the
//! [DID Core Specification](https://www.w3.org/TR/did-core/) as used by the
//! GoChain `did:go` method.
//!
//! Decoding is lenient towards documents written by the GoChain `web3` tool:
//! `null` arrays, the untagged `Services` key, `null` timestamps and proofs, and
//! empty-string key encodings are all accepted.

use crate::error::{DidError, Result};
use crate::models::identifier::Did;
use crate::utils::crypto::decode_hex;
use crate::utils::serialization::{null_as_empty, to_tab_indented_bytes};
use chrono::{DateTime, Utc};
use ethers::utils::hex;
use serde::{Deserialize, Serialize};

/// Required context for all DID documents.
pub const CONTEXT_V1: &str = "https://w3id.org/did/v1";

/// Key-suite tag for secp256k1 keys, the only suite used for signing.
pub const SECP256K1_KEY_TYPE: &str = "Secp256k1VerificationKey2018";

/// Fragment naming the owner key created with every document.
pub const OWNER_KEY_FRAGMENT: &str = "owner";

/// A DID Document describing the keys and services of a DID subject.
///
/// Once anchored a document is immutable: a change means uploading new
/// content and registering the new hash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DIDDocument {
    /// Always [`CONTEXT_V1`]
    #[serde(rename = "@context")]
    pub context: String,

    /// The DID this document is about
    pub id: String,

    /// Keys used for signatures and other cryptographic operations
    #[serde(rename = "publicKey", default, deserialize_with = "null_as_empty")]
    pub public_keys: Vec<PublicKey>,

    /// Keys by which the subject can prove control of the DID
    #[serde(rename = "authentication", default, deserialize_with = "null_as_empty")]
    pub authentications: Vec<Authentication>,

    /// Advertised service endpoints
    #[serde(
        rename = "service",
        alias = "Services",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub services: Vec<Service>,

    /// When the document was first created, in UTC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// When the document was last updated, in UTC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    /// Integrity proof of the document itself. This is NOT proof of the
    /// binding between the DID and the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<DocumentProof>,
}

/// A public key entry of a DID Document.
///
/// Exactly one key encoding is carried, modeled by [`PublicKeyMaterial`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "PublicKeyRepr", into = "PublicKeyRepr")]
pub struct PublicKey {
    /// Identifier of the key within the document, e.g. `did:go:abc#owner`
    pub id: String,
    /// Key-suite tag, e.g. [`SECP256K1_KEY_TYPE`]
    pub key_type: String,
    /// DID controlling the corresponding private key
    pub controller: String,
    pub material: PublicKeyMaterial,
}

/// The single populated encoding of a public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyMaterial {
    Pem(String),
    Jwk(String),
    Hex(String),
    Base64(String),
    Base58(String),
    Multibase(String),
}

impl PublicKeyMaterial {
    /// Decodes the raw key bytes.
    ///
    /// PEM and JWK keys are carried as text only and cannot be decoded here.
    ///
    /// # Errors
    /// [`DidError::Encoding`] for malformed data or an unsupported encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            PublicKeyMaterial::Hex(s) => decode_hex(s),
            PublicKeyMaterial::Base64(s) => base64::decode(s)
                .map_err(|e| DidError::Encoding(format!("invalid base64 key: {}", e))),
            PublicKeyMaterial::Base58(s) => decode_base58(s),
            PublicKeyMaterial::Multibase(s) => decode_multibase(s),
            PublicKeyMaterial::Pem(_) => Err(DidError::Encoding("PEM keys are not supported".into())),
            PublicKeyMaterial::Jwk(_) => Err(DidError::Encoding("JWK keys are not supported".into())),
        }
    }
}

fn decode_base58(s: &str) -> Result<Vec<u8>> {
    bs58::decode(s)
        .into_vec()
        .map_err(|e| DidError::Encoding(format!("invalid base58 key: {}", e)))
}

fn decode_multibase(s: &str) -> Result<Vec<u8>> {
    let mut chars = s.chars();
    let prefix = chars
        .next()
        .ok_or_else(|| DidError::Encoding("empty multibase key".into()))?;
    let body = chars.as_str();
    match prefix {
        'z' => decode_base58(body),
        'f' => decode_hex(body),
        'm' => base64::decode_config(body, base64::STANDARD_NO_PAD)
            .map_err(|e| DidError::Encoding(format!("invalid multibase key: {}", e))),
        'u' => base64::decode_config(body, base64::URL_SAFE_NO_PAD)
            .map_err(|e| DidError::Encoding(format!("invalid multibase key: {}", e))),
        other => Err(DidError::Encoding(format!(
            "unsupported multibase prefix {:?}",
            other
        ))),
    }
}

/// Wire form of [`PublicKey`]: one optional field per encoding.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyRepr {
    id: String,
    #[serde(rename = "type")]
    key_type: String,
    controller: String,
    #[serde(rename = "publicKeyPem", default, skip_serializing_if = "Option::is_none")]
    public_key_pem: Option<String>,
    #[serde(rename = "publicKeyJwk", default, skip_serializing_if = "Option::is_none")]
    public_key_jwk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    public_key_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    public_key_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    public_key_base58: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    public_key_multibase: Option<String>,
}

impl TryFrom<PublicKeyRepr> for PublicKey {
    type Error = String;

    fn try_from(repr: PublicKeyRepr) -> std::result::Result<Self, Self::Error> {
        // Go writes every encoding field, leaving the unused ones empty.
        let populated = |v: Option<String>| v.filter(|s| !s.is_empty());
        let candidates = [
            populated(repr.public_key_pem).map(PublicKeyMaterial::Pem),
            populated(repr.public_key_jwk).map(PublicKeyMaterial::Jwk),
            populated(repr.public_key_hex).map(PublicKeyMaterial::Hex),
            populated(repr.public_key_base64).map(PublicKeyMaterial::Base64),
            populated(repr.public_key_base58).map(PublicKeyMaterial::Base58),
            populated(repr.public_key_multibase).map(PublicKeyMaterial::Multibase),
        ];
        let mut present = candidates.into_iter().flatten();
        let material = present
            .next()
            .ok_or_else(|| format!("public key {} has no key material", repr.id))?;
        if present.next().is_some() {
            return Err(format!(
                "public key {} has more than one key encoding",
                repr.id
            ));
        }
        Ok(PublicKey {
            id: repr.id,
            key_type: repr.key_type,
            controller: repr.controller,
            material,
        })
    }
}

impl From<PublicKey> for PublicKeyRepr {
    fn from(key: PublicKey) -> Self {
        let mut repr = PublicKeyRepr {
            id: key.id,
            key_type: key.key_type,
            controller: key.controller,
            public_key_pem: None,
            public_key_jwk: None,
            public_key_hex: None,
            public_key_base64: None,
            public_key_base58: None,
            public_key_multibase: None,
        };
        match key.material {
            PublicKeyMaterial::Pem(v) => repr.public_key_pem = Some(v),
            PublicKeyMaterial::Jwk(v) => repr.public_key_jwk = Some(v),
            PublicKeyMaterial::Hex(v) => repr.public_key_hex = Some(v),
            PublicKeyMaterial::Base64(v) => repr.public_key_base64 = Some(v),
            PublicKeyMaterial::Base58(v) => repr.public_key_base58 = Some(v),
            PublicKeyMaterial::Multibase(v) => repr.public_key_multibase = Some(v),
        }
        repr
    }
}

/// An authentication entry: a reference to a key id, or an embedded key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Authentication {
    Reference(String),
    Embedded(PublicKey),
}

impl Authentication {
    /// The id of the key this entry designates.
    pub fn key_id(&self) -> &str {
        match self {
            Authentication::Reference(id) => id,
            Authentication::Embedded(key) => &key.id,
        }
    }
}

/// A service endpoint advertised by the DID subject.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

/// JSON-LD integrity proof of a DID Document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DocumentProof {
    #[serde(rename = "type")]
    pub proof_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(rename = "signatureValue")]
    pub signature_value: String,
}

impl DIDDocument {
    /// Returns an empty document with the required context.
    pub fn new(id: impl Into<String>) -> Self {
        DIDDocument {
            context: CONTEXT_V1.to_string(),
            id: id.into(),
            public_keys: Vec::new(),
            authentications: Vec::new(),
            services: Vec::new(),
            created: None,
            updated: None,
            proof: None,
        }
    }

    /// Builds the initial document for `did`, owned by `owner_public_key`.
    ///
    /// The document holds a single secp256k1 key at `did#owner`, controlled by
    /// `did`, which is also the sole authentication method.
    ///
    /// # Arguments
    /// * `did` - The DID being created
    /// * `owner_public_key` - Uncompressed SEC1 public key bytes of the owner
    /// * `now` - Creation time, stored as both `created` and `updated`
    ///
    /// # Errors
    /// [`DidError::Validation`] if the id does not fit the registry key.
    pub fn build(did: &Did, owner_public_key: &[u8], now: DateTime<Utc>) -> Result<Self> {
        did.ensure_id_length()?;

        let key_id = did.with_fragment(OWNER_KEY_FRAGMENT).to_string();
        let mut doc = DIDDocument::new(did.to_string());
        doc.created = Some(now);
        doc.updated = Some(now);
        doc.public_keys.push(PublicKey {
            id: key_id.clone(),
            key_type: SECP256K1_KEY_TYPE.to_string(),
            controller: did.to_string(),
            material: PublicKeyMaterial::Hex(format!("0x{}", hex::encode(owner_public_key))),
        });
        doc.authentications.push(Authentication::Reference(key_id));
        Ok(doc)
    }

    /// Looks up a public key by id.
    pub fn public_key(&self, id: &str) -> Option<&PublicKey> {
        self.public_keys.iter().find(|k| k.id == id)
    }

    /// Resolves every authentication entry to a key, skipping dangling references.
    pub fn authentication_keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.authentications.iter().filter_map(move |auth| match auth {
            Authentication::Embedded(key) => Some(key),
            Authentication::Reference(id) => self.public_key(id),
        })
    }

    /// Tab-indented JSON, the form uploaded to the content store.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(to_tab_indented_bytes(self)?)
    }

    /// Decodes a document fetched from the content store.
    ///
    /// # Errors
    /// [`DidError::Encoding`] for malformed JSON or an unexpected `@context`.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let doc: DIDDocument = serde_json::from_slice(bytes)?;
        if doc.context != CONTEXT_V1 {
            return Err(DidError::Encoding(format!(
                "unexpected DID document context {:?}",
                doc.context
            )));
        }
        Ok(doc)
    }
}
