// src/models/identifier.rs
//! Decentralized Identifier parsing and formatting.
//!
//! Handles the `did:<method>:<id>[#<fragment>]` syntax. Any method can be
//! parsed and displayed, but only `go` identifiers can be anchored in the
//! registry, and their id must fit the contract's `bytes32` key.

use crate::error::{DidError, ParseError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The only DID method the registry accepts.
pub const REGISTRABLE_METHOD: &str = "go";

/// Maximum size in bytes of a registrable method-specific id.
pub const MAX_ID_LENGTH: usize = 32;

/// A parsed DID, optionally carrying a fragment (`did:go:abc123#owner`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Did {
    method: String,
    id: String,
    fragment: Option<String>,
}

/// Registry key: the method-specific id zero-padded or truncated to 32 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryKey(pub [u8; 32]);

impl Did {
    /// Parses a DID string.
    pub fn parse(s: &str) -> std::result::Result<Self, ParseError> {
        let rest = s.strip_prefix("did:").ok_or(ParseError::InvalidScheme)?;
        let (method, rest) = rest.split_once(':').ok_or(ParseError::MissingMethod)?;
        if method.is_empty() {
            return Err(ParseError::MissingMethod);
        }
        if !method
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ParseError::InvalidMethod);
        }

        let (id, fragment) = match rest.split_once('#') {
            Some((id, fragment)) => (id, Some(fragment)),
            None => (rest, None),
        };
        if id.is_empty() {
            return Err(ParseError::MissingId);
        }
        if let Some(c) = id.chars().find(|c| !is_id_char(*c)) {
            return Err(ParseError::InvalidId(c));
        }
        if let Some(c) = fragment.and_then(|f| f.chars().find(|c| !is_fragment_char(*c))) {
            return Err(ParseError::InvalidFragment(c));
        }

        Ok(Did {
            method: method.to_string(),
            id: id.to_string(),
            fragment: fragment.map(str::to_string),
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The method-specific id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Returns a copy of this DID pointing at `fragment` (e.g. `#owner`).
    pub fn with_fragment(&self, fragment: impl Into<String>) -> Self {
        Did {
            fragment: Some(fragment.into()),
            ..self.clone()
        }
    }

    /// Returns this DID with any fragment removed.
    pub fn without_fragment(&self) -> Self {
        Did {
            fragment: None,
            ..self.clone()
        }
    }

    /// Checks that the id fits in the registry's `bytes32` key.
    pub fn ensure_id_length(&self) -> Result<()> {
        if self.id.len() > MAX_ID_LENGTH {
            return Err(DidError::Validation(format!(
                "DID id must be at most {} bytes, got {}",
                MAX_ID_LENGTH,
                self.id.len()
            )));
        }
        Ok(())
    }

    /// Checks that this DID may be written to the registry.
    ///
    /// # Errors
    /// [`DidError::Validation`] if the method is not `go` or the id exceeds 32 bytes.
    pub fn ensure_registrable(&self) -> Result<()> {
        if self.method != REGISTRABLE_METHOD {
            return Err(DidError::Validation(format!(
                "only '{}' DID methods can be registered, got '{}'",
                REGISTRABLE_METHOD, self.method
            )));
        }
        self.ensure_id_length()
    }

    /// Derives the registry key. Ids longer than 32 bytes are truncated;
    /// call [`Did::ensure_registrable`] first on write paths.
    pub fn registry_key(&self) -> RegistryKey {
        let mut key = [0u8; 32];
        let bytes = self.id.as_bytes();
        let len = bytes.len().min(key.len());
        key[..len].copy_from_slice(&bytes[..len]);
        RegistryKey(key)
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '%')
}

fn is_fragment_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '-' | '.' | '_' | '~' | '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+' | ','
                | ';' | '=' | ':' | '@' | '/' | '?' | '%'
        )
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "did:{}:{}", self.method, self.id)?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

impl FromStr for Did {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Did::parse(s)
    }
}

impl Serialize for Did {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Did::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_components() {
        let did = Did::parse("did:go:abc123#owner").unwrap();
        assert_eq!(did.method(), "go");
        assert_eq!(did.id(), "abc123");
        assert_eq!(did.fragment(), Some("owner"));
        assert_eq!(did.without_fragment().to_string(), "did:go:abc123");
    }

    #[test]
    fn test_format_is_inverse_of_parse() {
        let cases = [
            "did:go:abc123",
            "did:go:abc123#owner",
            "did:web:example.com",
            "did:example:123456789abcdefghi",
            "did:go:a-b_c.d",
            "did:key:z6Mk:with:colons",
            "did:go:percent%20id",
            "did:go:x#",
            "did:go:x#key-1/path?q=1",
        ];
        for s in cases {
            let did = Did::parse(s).unwrap_or_else(|e| panic!("{s} should parse: {e}"));
            assert_eq!(did.to_string(), s);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Did::parse("go:abc"), Err(ParseError::InvalidScheme));
        assert_eq!(Did::parse("did:abc"), Err(ParseError::MissingMethod));
        assert_eq!(Did::parse("did::abc"), Err(ParseError::MissingMethod));
        assert_eq!(Did::parse("did:Go:abc"), Err(ParseError::InvalidMethod));
        assert_eq!(Did::parse("did:go:"), Err(ParseError::MissingId));
        assert_eq!(Did::parse("did:go:#owner"), Err(ParseError::MissingId));
        assert_eq!(Did::parse("did:go:ab c"), Err(ParseError::InvalidId(' ')));
        assert_eq!(Did::parse("did:go:abc#a b"), Err(ParseError::InvalidFragment(' ')));
    }

    #[test]
    fn test_registrable() {
        assert!(Did::parse("did:go:abc123").unwrap().ensure_registrable().is_ok());

        let web = Did::parse("did:web:example.com").unwrap();
        assert!(matches!(web.ensure_registrable(), Err(DidError::Validation(_))));

        let long = Did::parse(&format!("did:go:{}", "a".repeat(33))).unwrap();
        assert!(matches!(long.ensure_registrable(), Err(DidError::Validation(_))));

        let exact = Did::parse(&format!("did:go:{}", "a".repeat(32))).unwrap();
        assert!(exact.ensure_registrable().is_ok());
    }

    #[test]
    fn test_registry_key_padding() {
        let key = Did::parse("did:go:abc123").unwrap().registry_key();
        assert_eq!(&key.0[..6], b"abc123");
        assert!(key.0[6..].iter().all(|b| *b == 0));

        let long = Did::parse(&format!("did:go:{}", "b".repeat(40))).unwrap();
        assert_eq!(long.registry_key().0, [b'b'; 32]);
    }

    #[test]
    fn test_serde_as_string() {
        let did = Did::parse("did:go:subj1").unwrap();
        let json = serde_json::to_string(&did).unwrap();
        assert_eq!(json, "\"did:go:subj1\"");
        let back: Did = serde_json::from_str(&json).unwrap();
        assert_eq!(back, did);
        assert!(serde_json::from_str::<Did>("\"not-a-did\"").is_err());
    }
}
