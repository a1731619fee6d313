/*!
 * KMS Envelope Key Management
 *
 * Envelope encryption for persisted records. Every record owns one or more
 * 256-bit data keys; each data key is wrapped by an external Key Management
 * Service and only the wrapped form is ever stored.
 *
 * The pieces, leaf first:
 *
 * - [`envelope`]: the persisted, provider-tagged wrapped-key formats
 * - [`provider`]: generate/decrypt through Cloud-A, Cloud-B, a secrets
 *   engine, or the insecure test provider, chosen by key identifier
 * - [`registry`]: the per-record-type mapping from slot name to key id and
 *   context resolver
 * - [`cache`]: lazy per-instance resolution of plaintext keys
 * - [`rotation`]: replacing a slot's key while preserving attribute values
 *
 * # Example
 *
 * ```
 * use std::sync::Arc;
 * use kms_envelope::prelude::*;
 *
 * struct User {
 *     registry: Arc<KeySlotRegistry<User>>,
 *     encrypted_kms_key: Option<WrappedKeyEnvelope>,
 *     cache: KeyCache,
 * }
 *
 * impl KmsRecord for User {
 *     fn key_registry(&self) -> Arc<KeySlotRegistry<Self>> {
 *         self.registry.clone()
 *     }
 *     fn key_cache(&self) -> &KeyCache {
 *         &self.cache
 *     }
 *     fn key_cache_mut(&mut self) -> &mut KeyCache {
 *         &mut self.cache
 *     }
 *     fn envelope(&self, _column: &str) -> Option<WrappedKeyEnvelope> {
 *         self.encrypted_kms_key.clone()
 *     }
 *     fn set_envelope(&mut self, _column: &str, envelope: Option<WrappedKeyEnvelope>) {
 *         self.encrypted_kms_key = envelope;
 *     }
 * }
 *
 * fn main() -> KmsResult<()> {
 *     let mut registry = KeySlotRegistry::new(Arc::new(KmsClient::builder().build()));
 *     registry.register(DEFAULT_SLOT, Some("insecure-test-key"), None)?;
 *     let registry = Arc::new(registry);
 *
 *     let mut user = User { registry, encrypted_kms_key: None, cache: KeyCache::new() };
 *     let key = user.kms_key_for(DEFAULT_SLOT)?;
 *     assert_eq!(key.as_bytes(), &[0u8; 32]);
 *     assert!(user.encrypted_kms_key.is_some());
 *     Ok(())
 * }
 * ```
 */

/// Key lifecycle error types
pub mod error;

/// Fallback key identifier configuration
pub mod config;

/// Plaintext data keys and encryption contexts
pub mod data_key;

/// Wrapped key envelope codec
pub mod envelope;

/// Provider call instrumentation
pub mod observer;

/// KMS provider adapter and backends
pub mod provider;

/// Per-record-type key slot registry
pub mod registry;

/// Record framework contracts
pub mod record;

/// Per-instance key cache and resolver
pub mod cache;

/// Data key rotation
pub mod rotation;

pub use cache::{invalidate_keys, resolve, KeyCache, KmsKeys, SlotState};
pub use config::{KmsConfig, KMS_KEY_ID_ENV};
pub use data_key::{DataKey, EncryptionContext, DATA_KEY_LEN};
pub use envelope::{decode_envelope, encode_envelope, EnvelopePayload, WrappedKeyEnvelope};
pub use error::{BoxedError, KmsError, KmsResult};
pub use observer::{KeyEvent, KeyEventObserver, KeyEventOutcome, LogObserver};
pub use provider::{
    CloudAEncryptResponse, CloudAKms, CloudBKms, InMemoryKms, KmsClient, KmsClientBuilder,
    ProviderKind, TransitKms,
};
pub use record::{EncryptedAttributeBinding, EncryptedAttributes, KmsRecord};
pub use registry::{
    envelope_column, named_slot, prefixed_slot, ContextResolver, KeySlot, KeySlotRegistry,
    DEFAULT_SLOT,
};
pub use rotation::{rotate, KmsRotate};

/// The types most record integrations need.
pub mod prelude {
    pub use crate::cache::{KeyCache, KmsKeys};
    pub use crate::data_key::{DataKey, EncryptionContext};
    pub use crate::envelope::WrappedKeyEnvelope;
    pub use crate::error::{KmsError, KmsResult};
    pub use crate::provider::KmsClient;
    pub use crate::record::{EncryptedAttributeBinding, EncryptedAttributes, KmsRecord};
    pub use crate::registry::{ContextResolver, KeySlotRegistry, DEFAULT_SLOT};
    pub use crate::rotation::KmsRotate;
}
