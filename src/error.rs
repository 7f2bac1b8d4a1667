//! Error types for connect-decrypt
//!
//! Configuration problems and provider-reported decryption failures are the
//! only errors this crate raises. Path resolution over a document never
//! fails: an absent or shape-mismatched field is "not applicable", not an
//! error, so heterogeneous record streams pass through untouched.

use thiserror::Error;

/// Result type alias for decryption operations
pub type Result<T, E = DecryptError> = std::result::Result<T, E>;

/// Errors raised while configuring a decrypter
///
/// These surface at task-start time and are fatal for task startup; the
/// host does not retry them.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A property-map value was not a string
    #[error("invalid property map value for '{key}': All values must be strings")]
    NonStringValue { key: String },

    /// A property-map key (the encrypted field path) was empty
    #[error("property map contains an empty field path")]
    EmptySourcePath,

    /// Configuration struct validation failed
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The decryption provider could not be constructed
    #[error("failed to create decryption provider: {0}")]
    Provider(#[source] anyhow::Error),

    /// `configure` was called on an already-configured stage
    #[error("decrypter is already configured")]
    AlreadyConfigured,
}

impl ConfigError {
    /// Create a non-string-value error for a property-map key
    pub fn non_string_value(key: impl Into<String>) -> Self {
        Self::NonStringValue { key: key.into() }
    }

    /// Create a validation error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Errors raised while decrypting a document
///
/// Surfaced per record; a failure aborts that record's processing and the
/// host decides whether to retry, skip, or dead-letter it.
#[derive(Debug, Error)]
pub enum DecryptError {
    /// `decrypt` was called before `configure`
    #[error("decrypter is not configured")]
    NotConfigured,

    /// The provider failed to decrypt the value at a field path
    #[error("failed to decrypt field '{path}': {source}")]
    Provider {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DecryptError {
    /// Wrap a provider failure with the offending source field path
    pub fn provider(path: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Provider {
            path: path.into(),
            source,
        }
    }
}
