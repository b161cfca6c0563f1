// src/error.rs
//! Error taxonomy for the DID anchoring system.
//!
//! Every operation returns [`Result`]; nothing in the library terminates the
//! process. Secret key material is never included in error messages.

/// Errors produced while parsing a DID string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("expected the did: scheme")]
    InvalidScheme,
    #[error("expected did:method, but method was not present")]
    MissingMethod,
    #[error("did method must be lowercase letters and digits")]
    InvalidMethod,
    #[error("expected did:method:id, but id was empty")]
    MissingId,
    #[error("did id contains an invalid character: {0:?}")]
    InvalidId(char),
    #[error("did fragment contains an invalid character: {0:?}")]
    InvalidFragment(char),
}

/// Errors covering identifier handling, anchoring, resolution and credentials.
#[derive(Debug, thiserror::Error)]
pub enum DidError {
    #[error("invalid DID: {0}")]
    Parse(#[from] ParseError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out: {0}")]
    Timeout(String),

    /// The registry has no hash anchored for this identifier.
    #[error("DID document not found: {0}")]
    DocumentNotFound(String),

    /// The content store does not know this hash.
    #[error("content not found: {0}")]
    NotFound(String),

    #[error("verification failed: {reason}")]
    Verification {
        reason: String,
        #[source]
        source: Option<Box<DidError>>,
    },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("signing failed: {0}")]
    Signing(String),
}

impl DidError {
    /// Builds a verification failure with no underlying cause.
    pub fn verification(reason: impl Into<String>) -> Self {
        DidError::Verification {
            reason: reason.into(),
            source: None,
        }
    }

    /// Wraps `cause` as the reason a verification could not complete.
    pub fn verification_caused_by(reason: impl Into<String>, cause: DidError) -> Self {
        DidError::Verification {
            reason: reason.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Maps any displayable transport error into [`DidError::Network`].
    pub fn network(err: impl std::fmt::Display) -> Self {
        DidError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for DidError {
    fn from(err: serde_json::Error) -> Self {
        DidError::Encoding(err.to_string())
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, DidError>;
