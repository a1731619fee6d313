//! Contracts the record framework implements for its record types.
//!
//! [`KmsRecord`] exposes a record's wrapped-key columns and its per-instance
//! key cache. [`EncryptedAttributes`] adds the attribute-encryption and
//! persistence hooks that rotation needs.
//!
//! # Reload contract
//!
//! Whenever a record is re-fetched from its backing store the framework must
//! call [`crate::cache::invalidate_keys`] (or `KmsKeys::invalidate_keys`) on
//! it. No framework method is wrapped or aliased to do this implicitly.
//!
//! # Concurrency
//!
//! A record instance and its key cache must not be used from several threads
//! at once. Nothing here locks; the caller keeps each instance on one thread.
//!
//! Two separately loaded copies of the same stored record can both see an
//! empty envelope column on first access and each generate a different key.
//! Whichever copy saves last wins, and attributes the other copy encrypted
//! become unreadable. Storage layers with optimistic concurrency should make
//! the envelope column part of their version check.

use std::sync::Arc;

use crate::cache::KeyCache;
use crate::data_key::DataKey;
use crate::envelope::WrappedKeyEnvelope;
use crate::error::{BoxedError, KmsResult};
use crate::registry::KeySlotRegistry;

/// A record type whose instances own KMS-protected data keys
pub trait KmsRecord: Sized {
    /// The type's shared, read-only slot registry
    fn key_registry(&self) -> Arc<KeySlotRegistry<Self>>;

    fn key_cache(&self) -> &KeyCache;

    fn key_cache_mut(&mut self) -> &mut KeyCache;

    /// Current (possibly unsaved) value of a wrapped-key column
    fn envelope(&self, column: &str) -> Option<WrappedKeyEnvelope>;

    /// Set a wrapped-key column in memory; durability comes from the
    /// framework's own save
    fn set_envelope(&mut self, column: &str, envelope: Option<WrappedKeyEnvelope>);
}

/// Which slot's key encrypts an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedAttributeBinding {
    pub attribute: String,
    pub slot: String,
}

impl EncryptedAttributeBinding {
    pub fn new(attribute: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            slot: slot.into(),
        }
    }
}

/// Attribute encryption and atomic persistence, as needed by rotation
pub trait EncryptedAttributes: KmsRecord {
    fn attribute_bindings(&self) -> Vec<EncryptedAttributeBinding>;

    /// Plaintext of `attribute` under `key`; `None` when the attribute is unset
    fn decrypt_attribute(&self, attribute: &str, key: &DataKey) -> KmsResult<Option<Vec<u8>>>;

    /// Encrypt and assign `attribute` under `key`
    fn encrypt_attribute(
        &mut self,
        attribute: &str,
        plaintext: Option<&[u8]>,
        key: &DataKey,
    ) -> KmsResult<()>;

    /// Write every pending change (wrapped-key and attribute columns) in one
    /// atomic operation
    fn save_atomically(&mut self) -> Result<(), BoxedError>;
}
