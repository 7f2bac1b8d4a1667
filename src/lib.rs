//! connect-decrypt - Client-side field-level decryption for source connectors
//!
//! This crate decrypts configured fields of semi-structured documents as
//! they flow through a source connector: a declarative property map names
//! which encrypted binary fields to resolve, an injected provider performs
//! the actual decryption, and the plaintext is written back into the
//! document without disturbing its shape.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     connect-decrypt                             │
//! │  DecryptStage ── DecrypterBuilder ──> FieldDecrypter            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  PropertyMap (config)   │   path::{lookup, write} (addressing)  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  DecryptionProvider (external capability, e.g. key vault)       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use connect_decrypt::prelude::*;
//!
//! let config = DecryptConfig::with_property_map(r#"{"card.number": "card.number_plain"}"#);
//! let decrypter = DecrypterBuilder::new()
//!     .with_config(config)
//!     .configure(&my_vault_factory)
//!     .await?;
//!
//! // per polled record, in place:
//! decrypter.decrypt(&mut document).await?;
//!
//! // once, at task teardown:
//! decrypter.close().await;
//! ```

// Configuration (property map + typed task config)
pub mod config;

// Error types
pub mod error;

// Dotted field-path resolution over documents
pub mod path;

// Decryption provider capability and factory
pub mod provider;

// Lifecycle and per-document orchestration
pub mod decrypter;

// Common types (SensitiveString, etc.)
pub mod types;

// Re-export SensitiveString at crate root for convenience
pub use types::SensitiveString;

// Re-export the core API at crate root for ergonomic use
pub use config::{DecryptConfig, KeyVaultSettings, PathPair, PropertyMap, DEFAULT_MAX_PATH_DEPTH};
pub use decrypter::{DecryptStage, DecrypterBuilder, FieldDecrypter};
pub use error::{ConfigError, DecryptError, Result};
pub use provider::{DecryptionProvider, FixedProviderFactory, ProviderFactory};

// Re-export commonly used dependencies for provider implementations
pub use async_trait::async_trait;
pub use bson::{Binary, Bson, Document};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        async_trait, Binary, Bson, ConfigError, DecryptConfig, DecryptError, DecryptStage,
        DecrypterBuilder, DecryptionProvider, Document, FieldDecrypter, FixedProviderFactory,
        KeyVaultSettings, PathPair, PropertyMap, ProviderFactory, Result, SensitiveString,
    };

    // Re-export validation and schema traits
    pub use schemars::JsonSchema;
    pub use validator::Validate;

    // Re-export the provider stub for tests
    pub use crate::provider::testing::MockProvider;
}
