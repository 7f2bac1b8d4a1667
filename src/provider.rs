//! Decryption provider capability
//!
//! The provider is an external collaborator that owns key resolution and
//! the cryptographic operation itself. This crate never inspects the
//! ciphertext's internal structure; it only hands tagged binary values to
//! the provider and places the returned plaintext back into the document.

use async_trait::async_trait;
use bson::{Binary, Bson};
use std::sync::Arc;

/// A capability that turns a ciphertext blob into a plaintext value.
///
/// Typically backed by a live session against a key-management backend and
/// may perform network I/O on every call. Implementations are assumed safe
/// for concurrent use by multiple callers; a provider that is not must
/// serialize access internally.
#[async_trait]
pub trait DecryptionProvider: Send + Sync {
    /// Decrypt one tagged binary value.
    ///
    /// Fails with a provider-specific error when the blob is malformed or
    /// the key cannot be resolved.
    async fn decrypt(&self, ciphertext: &Binary) -> anyhow::Result<Bson>;

    /// Release any held resources (vault sessions, connections).
    ///
    /// Called exactly once during task teardown.
    async fn close(&self) {}
}

/// Factory for constructing the decryption provider at configure time.
///
/// Invoked exactly once per task; the resulting provider is cached for the
/// task's lifetime. A construction failure (bad credentials, unreachable
/// vault) is a configuration error and fatal for task startup.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    /// Build the provider from whatever settings the host captured.
    async fn create(&self) -> anyhow::Result<Arc<dyn DecryptionProvider>>;
}

/// A factory that hands out an already-built provider.
///
/// Convenient for hosts that construct the provider themselves and for
/// tests that need to keep a handle on the instance.
pub struct FixedProviderFactory(Arc<dyn DecryptionProvider>);

impl FixedProviderFactory {
    /// Wrap an existing provider
    pub fn new(provider: Arc<dyn DecryptionProvider>) -> Self {
        Self(provider)
    }
}

#[async_trait]
impl ProviderFactory for FixedProviderFactory {
    async fn create(&self) -> anyhow::Result<Arc<dyn DecryptionProvider>> {
        Ok(Arc::clone(&self.0))
    }
}

/// Testing utilities for the provider boundary
pub mod testing {
    use super::*;
    use parking_lot::Mutex;

    type TransformFn = dyn Fn(&Binary) -> anyhow::Result<Bson> + Send + Sync;

    /// A programmable provider stub for tests
    ///
    /// Records how often it was called and closed, so tests can assert that
    /// absent or non-binary fields never reach the provider.
    #[derive(Default)]
    pub struct MockProvider {
        mappings: Mutex<Vec<(Vec<u8>, Bson)>>,
        transform: Mutex<Option<Box<TransformFn>>>,
        fail_message: Mutex<Option<String>>,
        decrypt_calls: Mutex<usize>,
        close_calls: Mutex<usize>,
    }

    impl MockProvider {
        /// Create a stub with no behavior configured; decrypting anything fails
        pub fn new() -> Self {
            Self::default()
        }

        /// Map a specific ciphertext byte string to a plaintext value
        pub fn with_mapping(self, ciphertext: impl Into<Vec<u8>>, plaintext: Bson) -> Self {
            self.mappings.lock().push((ciphertext.into(), plaintext));
            self
        }

        /// Derive every plaintext from the ciphertext bytes with a function
        pub fn with_transform<F>(self, f: F) -> Self
        where
            F: Fn(&Binary) -> anyhow::Result<Bson> + Send + Sync + 'static,
        {
            *self.transform.lock() = Some(Box::new(f));
            self
        }

        /// Make every decrypt call fail with an error message
        pub fn fail_with(self, message: impl Into<String>) -> Self {
            *self.fail_message.lock() = Some(message.into());
            self
        }

        /// Number of decrypt calls received
        pub fn decrypt_calls(&self) -> usize {
            *self.decrypt_calls.lock()
        }

        /// Number of close calls received
        pub fn close_calls(&self) -> usize {
            *self.close_calls.lock()
        }
    }

    #[async_trait]
    impl DecryptionProvider for MockProvider {
        async fn decrypt(&self, ciphertext: &Binary) -> anyhow::Result<Bson> {
            *self.decrypt_calls.lock() += 1;

            if let Some(message) = self.fail_message.lock().clone() {
                anyhow::bail!(message);
            }
            if let Some(transform) = self.transform.lock().as_ref() {
                return transform(ciphertext);
            }
            self.mappings
                .lock()
                .iter()
                .find(|(bytes, _)| *bytes == ciphertext.bytes)
                .map(|(_, plaintext)| plaintext.clone())
                .ok_or_else(|| anyhow::anyhow!("no mapping for ciphertext"))
        }

        async fn close(&self) {
            *self.close_calls.lock() += 1;
        }
    }
}
