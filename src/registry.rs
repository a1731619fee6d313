/*!
 * Key Slot Registry
 *
 * Maps each slot name of a record type to the KMS key identifier that
 * protects it and an optional resolver for the slot's encryption context.
 * A registry is filled once while the record type is set up and then shared
 * read-only (typically behind an `Arc`) by every instance of the type.
 */

use std::fmt;
use std::sync::Arc;

use crate::config::KmsConfig;
use crate::data_key::EncryptionContext;
use crate::error::{error_codes, KmsError, KmsResult};
use crate::provider::KmsClient;

/// Name of the unqualified slot
pub const DEFAULT_SLOT: &str = "kms_key";

/// Slot name for a named key: `kms_key_<name>`
pub fn named_slot(name: &str) -> String {
    format!("{}_{}", DEFAULT_SLOT, name)
}

/// Slot name for a prefixed key: `<prefix>_kms_key`
pub fn prefixed_slot(prefix: &str) -> String {
    format!("{}_{}", prefix, DEFAULT_SLOT)
}

/// Column holding a slot's wrapped key: `encrypted_<slot>`
pub fn envelope_column(slot_name: &str) -> String {
    format!("encrypted_{}", slot_name)
}

/// Computes a record's encryption context for one slot
pub type ContextResolver<R> = Arc<dyn Fn(&R) -> EncryptionContext + Send + Sync>;

/// One logical key on a record type
pub struct KeySlot<R> {
    name: String,
    key_id: Option<String>,
    column: String,
    context_resolver: Option<ContextResolver<R>>,
}

impl<R> KeySlot<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` means the slot cannot be resolved
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    pub fn envelope_column(&self) -> &str {
        &self.column
    }

    pub fn has_context_resolver(&self) -> bool {
        self.context_resolver.is_some()
    }

    /// The record's context for this slot; empty when no resolver is set
    pub fn context_for(&self, record: &R) -> EncryptionContext {
        match &self.context_resolver {
            Some(resolver) => resolver(record),
            None => EncryptionContext::new(),
        }
    }
}

impl<R> fmt::Debug for KeySlot<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySlot")
            .field("name", &self.name)
            .field("key_id", &self.key_id)
            .field("column", &self.column)
            .field("context_resolver", &self.context_resolver.is_some())
            .finish()
    }
}

/// Per-record-type slot registry, immutable once shared
pub struct KeySlotRegistry<R> {
    client: Arc<KmsClient>,
    config: KmsConfig,
    slots: Vec<KeySlot<R>>,
}

impl<R> KeySlotRegistry<R> {
    /// Registry without a fallback key identifier
    pub fn new(client: Arc<KmsClient>) -> Self {
        Self::with_config(client, KmsConfig::default())
    }

    /// Registry whose slots fall back to `config.default_key_id`
    pub fn with_config(client: Arc<KmsClient>, config: KmsConfig) -> Self {
        Self {
            client,
            config,
            slots: Vec::new(),
        }
    }

    /// Register a slot
    ///
    /// A slot without a key identifier (and no configured fallback) is
    /// accepted here; resolving it fails with `MissingKeyIdentifierError`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the name is empty, contains characters
    /// other than ASCII alphanumerics and `_`, or is already registered
    pub fn register(
        &mut self,
        slot_name: &str,
        key_id: Option<&str>,
        context_resolver: Option<ContextResolver<R>>,
    ) -> KmsResult<&KeySlot<R>> {
        if slot_name.is_empty()
            || !slot_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(KmsError::configuration_error(
                "register",
                &format!("invalid slot name '{}'", slot_name),
                error_codes::INVALID_SLOT_NAME,
            ));
        }
        if self.slots.iter().any(|slot| slot.name == slot_name) {
            return Err(KmsError::configuration_error(
                "register",
                &format!("slot '{}' is already registered", slot_name),
                error_codes::DUPLICATE_SLOT,
            ));
        }

        let key_id = self.config.resolve_key_id(key_id);
        if key_id.is_none() {
            log::warn!("Key slot {} registered without a key id", slot_name);
        }

        self.slots.push(KeySlot {
            name: slot_name.to_string(),
            key_id,
            column: envelope_column(slot_name),
            context_resolver,
        });
        Ok(&self.slots[self.slots.len() - 1])
    }

    /// Find a registered slot
    ///
    /// # Errors
    ///
    /// Returns `NotFoundError` if no slot has this name
    pub fn lookup(&self, slot_name: &str) -> KmsResult<&KeySlot<R>> {
        self.slots
            .iter()
            .find(|slot| slot.name == slot_name)
            .ok_or_else(|| KmsError::slot_not_found(slot_name))
    }

    /// Slots in registration order
    pub fn slots(&self) -> &[KeySlot<R>] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn client(&self) -> &KmsClient {
        &self.client
    }
}

impl<R> fmt::Debug for KeySlotRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySlotRegistry")
            .field("client", &self.client)
            .field("config", &self.config)
            .field("slots", &self.slots)
            .finish()
    }
}
