//! Field decrypter lifecycle and per-document decryption
//!
//! A connector task builds one `FieldDecrypter` at startup and calls it for
//! every polled record. The lifecycle has exactly two states: an
//! unconfigured `DecrypterBuilder` is consumed by `configure`, producing an
//! immutable configured value. `DecryptStage` is the handle a task holds
//! when it needs the runtime-checked variant of that lifecycle.

use bson::{Bson, Document};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use validator::Validate;

use crate::config::{DecryptConfig, PropertyMap};
use crate::error::{ConfigError, DecryptError, Result};
use crate::path;
use crate::provider::{DecryptionProvider, ProviderFactory};

/// Builder for a `FieldDecrypter` (the unconfigured state)
#[derive(Debug, Default)]
pub struct DecrypterBuilder {
    config: DecryptConfig,
}

impl DecrypterBuilder {
    /// Start from default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: DecryptConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the raw property-map string
    pub fn property_map(mut self, raw: impl Into<String>) -> Self {
        self.config.property_map = raw.into();
        self
    }

    /// Set the dotted-path segment bound
    pub fn max_path_depth(mut self, depth: usize) -> Self {
        self.config.max_path_depth = depth;
        self
    }

    /// Validate the configuration, parse the property map, and build the
    /// provider, consuming the builder.
    ///
    /// The provider is created last, after everything else has been
    /// validated, so a configuration failure never leaks a live provider
    /// session.
    pub async fn configure(
        self,
        factory: &dyn ProviderFactory,
    ) -> Result<FieldDecrypter, ConfigError> {
        self.config
            .validate()
            .map_err(|e| ConfigError::invalid(e.to_string()))?;
        let property_map = PropertyMap::parse(&self.config.property_map)?;
        let provider = factory.create().await.map_err(ConfigError::Provider)?;

        debug!(
            pairs = property_map.len(),
            max_path_depth = self.config.max_path_depth,
            "configured field decrypter"
        );
        Ok(FieldDecrypter {
            property_map,
            provider,
            max_path_depth: self.config.max_path_depth,
            closed: AtomicBool::new(false),
        })
    }
}

/// A configured field decrypter (immutable for the task's lifetime)
///
/// `decrypt` takes `&self` only: the property map and provider are fixed at
/// configure time, so distinct documents may be processed concurrently from
/// multiple workers.
pub struct FieldDecrypter {
    property_map: PropertyMap,
    provider: Arc<dyn DecryptionProvider>,
    max_path_depth: usize,
    closed: AtomicBool,
}

impl std::fmt::Debug for FieldDecrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDecrypter")
            .field("property_map", &self.property_map)
            .field("max_path_depth", &self.max_path_depth)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl FieldDecrypter {
    /// The configured field-path pairs
    pub fn property_map(&self) -> &PropertyMap {
        &self.property_map
    }

    /// Decrypt the configured fields of one document, in place.
    ///
    /// For every configured pair in order: an absent source field or a
    /// non-binary source value is skipped (re-running on a partially
    /// decrypted document is therefore a no-op for already-decrypted
    /// fields); a binary value is handed to the provider and the plaintext
    /// written to the target path. A provider failure aborts the call with
    /// the offending source path; targets written by earlier pairs keep
    /// their plaintext, but the call never reports success.
    pub async fn decrypt(&self, doc: &mut Document) -> Result<()> {
        for pair in &self.property_map {
            let Some(value) = path::lookup(&pair.source, doc, self.max_path_depth) else {
                trace!(path = %pair.source, "encrypted field absent, skipping");
                continue;
            };
            let Bson::Binary(ciphertext) = value else {
                trace!(path = %pair.source, "field is not binary, skipping");
                continue;
            };
            let plaintext = self
                .provider
                .decrypt(ciphertext)
                .await
                .map_err(|e| DecryptError::provider(&pair.source, e))?;
            trace!(source = %pair.source, target = %pair.target, "decrypted field");
            path::write(&pair.target, doc, plaintext, self.max_path_depth);
        }
        Ok(())
    }

    /// Release the provider's resources.
    ///
    /// Idempotent: the provider's `close` runs on the first call only, a
    /// second call is a no-op.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("closing field decrypter");
            self.provider.close().await;
        }
    }
}

impl Drop for FieldDecrypter {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            warn!("field decrypter dropped without close; provider resources may leak");
        }
    }
}

/// The decryption stage a connector task holds.
///
/// Wraps the two-state lifecycle behind runtime checks: `configure` may be
/// called once, `decrypt` before `configure` is a programming error, and
/// `close` is callable in any state, any number of times.
#[derive(Default)]
pub struct DecryptStage {
    inner: Option<FieldDecrypter>,
}

impl DecryptStage {
    /// Create an unconfigured stage
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `configure` has completed
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    /// Configure the stage; errors if already configured
    pub async fn configure(
        &mut self,
        config: DecryptConfig,
        factory: &dyn ProviderFactory,
    ) -> Result<(), ConfigError> {
        if self.inner.is_some() {
            return Err(ConfigError::AlreadyConfigured);
        }
        let decrypter = DecrypterBuilder::new()
            .with_config(config)
            .configure(factory)
            .await?;
        self.inner = Some(decrypter);
        Ok(())
    }

    /// Decrypt one document in place; errors if not configured
    pub async fn decrypt(&self, doc: &mut Document) -> Result<()> {
        match &self.inner {
            Some(decrypter) => decrypter.decrypt(doc).await,
            None => Err(DecryptError::NotConfigured),
        }
    }

    /// Release provider resources; a no-op when unconfigured or already closed
    pub async fn close(&self) {
        if let Some(decrypter) = &self.inner {
            decrypter.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::MockProvider;
    use crate::provider::FixedProviderFactory;
    use bson::spec::BinarySubtype;
    use bson::{doc, Binary};

    fn encrypted(bytes: &[u8]) -> Bson {
        Bson::Binary(Binary {
            subtype: BinarySubtype::Encrypted,
            bytes: bytes.to_vec(),
        })
    }

    fn factory_for(provider: Arc<MockProvider>) -> FixedProviderFactory {
        FixedProviderFactory::new(provider)
    }

    #[tokio::test]
    async fn test_builder_produces_configured_decrypter() {
        let provider = Arc::new(MockProvider::new());
        let decrypter = DecrypterBuilder::new()
            .property_map(r#"{"a": "b"}"#)
            .configure(&factory_for(provider))
            .await
            .unwrap();

        assert_eq!(decrypter.property_map().len(), 1);
        decrypter.close().await;
    }

    #[tokio::test]
    async fn test_builder_rejects_invalid_depth() {
        let provider = Arc::new(MockProvider::new());
        let err = DecrypterBuilder::new()
            .max_path_depth(0)
            .configure(&factory_for(provider.clone()))
            .await
            .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(_)));
        // Validation failed before the factory ran, so no session to release.
        assert_eq!(provider.close_calls(), 0);
    }

    #[tokio::test]
    async fn test_builder_rejects_bad_property_map() {
        let provider = Arc::new(MockProvider::new());
        let err = DecrypterBuilder::new()
            .property_map(r#"{"a.secret": 1}"#)
            .configure(&factory_for(provider))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("All values must be strings"));
    }

    #[tokio::test]
    async fn test_decrypt_skips_absent_field_without_provider_call() {
        let provider = Arc::new(MockProvider::new());
        let decrypter = DecrypterBuilder::new()
            .property_map(r#"{"x": "x"}"#)
            .configure(&factory_for(provider.clone()))
            .await
            .unwrap();

        let mut d = doc! { "y": 1 };
        decrypter.decrypt(&mut d).await.unwrap();

        assert_eq!(d, doc! { "y": 1 });
        assert_eq!(provider.decrypt_calls(), 0);
        decrypter.close().await;
    }

    #[tokio::test]
    async fn test_decrypt_skips_non_binary_field() {
        let provider = Arc::new(MockProvider::new());
        let decrypter = DecrypterBuilder::new()
            .property_map(r#"{"x": "x"}"#)
            .configure(&factory_for(provider.clone()))
            .await
            .unwrap();

        let mut d = doc! { "x": "already plaintext" };
        decrypter.decrypt(&mut d).await.unwrap();

        assert_eq!(d, doc! { "x": "already plaintext" });
        assert_eq!(provider.decrypt_calls(), 0);
        decrypter.close().await;
    }

    #[tokio::test]
    async fn test_decrypt_provider_failure_carries_path() {
        let provider = Arc::new(MockProvider::new().fail_with("key not found"));
        let decrypter = DecrypterBuilder::new()
            .property_map(r#"{"a.secret": "a.plain"}"#)
            .configure(&factory_for(provider))
            .await
            .unwrap();

        let mut d = doc! { "a": { "secret": encrypted(b"blob"), "plain": Bson::Null } };
        let err = decrypter.decrypt(&mut d).await.unwrap_err();

        match err {
            DecryptError::Provider { path, .. } => assert_eq!(path, "a.secret"),
            other => panic!("unexpected error: {other}"),
        }
        decrypter.close().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let provider = Arc::new(MockProvider::new());
        let decrypter = DecrypterBuilder::new()
            .configure(&factory_for(provider.clone()))
            .await
            .unwrap();

        decrypter.close().await;
        decrypter.close().await;
        assert_eq!(provider.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_stage_decrypt_before_configure() {
        let stage = DecryptStage::new();
        let mut d = doc! {};
        let err = stage.decrypt(&mut d).await.unwrap_err();
        assert!(matches!(err, DecryptError::NotConfigured));
    }

    #[tokio::test]
    async fn test_stage_configure_twice() {
        let provider = Arc::new(MockProvider::new());
        let factory = factory_for(provider);

        let mut stage = DecryptStage::new();
        stage
            .configure(DecryptConfig::default(), &factory)
            .await
            .unwrap();
        assert!(stage.is_configured());

        let err = stage
            .configure(DecryptConfig::default(), &factory)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyConfigured));
        stage.close().await;
    }

    #[tokio::test]
    async fn test_stage_close_unconfigured_is_noop() {
        let stage = DecryptStage::new();
        stage.close().await;
    }
}
