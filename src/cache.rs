/*!
 * Key Cache and Resolver
 *
 * Each record instance keeps at most one plaintext data key per slot.
 * Resolution is lazy:
 *
 * ```text
 * Empty --(envelope column empty)--> generate --> Cached
 * Empty --(envelope present)-------> decrypt ---> Cached
 * Cached --(reload / rotation)-----> Empty
 * ```
 *
 * A cached key remembers the envelope it belongs to. If the record's column
 * no longer holds that envelope, the cached key is discarded rather than
 * served.
 */

use std::collections::HashMap;

use crate::data_key::DataKey;
use crate::envelope::WrappedKeyEnvelope;
use crate::error::{KmsError, KmsResult};
use crate::record::KmsRecord;

/// Observable state of one slot's cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Cached,
}

#[derive(Debug, Clone)]
struct CachedKey {
    key: DataKey,
    envelope: WrappedKeyEnvelope,
}

/// Per-instance plaintext key cache. Never serialized.
#[derive(Debug, Clone, Default)]
pub struct KeyCache {
    entries: HashMap<String, CachedKey>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, slot_name: &str) -> SlotState {
        if self.entries.contains_key(slot_name) {
            SlotState::Cached
        } else {
            SlotState::Empty
        }
    }

    /// The cached key, provided it still belongs to `current_envelope`
    pub fn get(&self, slot_name: &str, current_envelope: Option<&WrappedKeyEnvelope>) -> Option<&DataKey> {
        self.entries
            .get(slot_name)
            .filter(|entry| Some(&entry.envelope) == current_envelope)
            .map(|entry| &entry.key)
    }

    pub fn insert(&mut self, slot_name: &str, key: DataKey, envelope: WrappedKeyEnvelope) {
        self.entries
            .insert(slot_name.to_string(), CachedKey { key, envelope });
    }

    /// Drop one slot's key; returns whether anything was cached
    pub fn invalidate(&mut self, slot_name: &str) -> bool {
        self.entries.remove(slot_name).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve the plaintext key for `slot_name` on `record`
///
/// Returns the cached key when it matches the envelope column. Otherwise,
/// with an empty column, generates a key and stores its envelope in the
/// column (in memory only; the caller saves). With an envelope present,
/// decrypts it. At most one provider call is made.
///
/// # Errors
///
/// * `NotFoundError` if the slot is not registered
/// * `MissingKeyIdentifierError` if the slot has no key id, before any I/O
/// * `ProviderError` / `MalformedEnvelopeError` from the provider adapter;
///   the cache stays empty
pub fn resolve<R: KmsRecord>(record: &mut R, slot_name: &str) -> KmsResult<DataKey> {
    let registry = record.key_registry();
    let slot = registry.lookup(slot_name)?;
    let key_id = slot
        .key_id()
        .ok_or_else(|| KmsError::missing_key_identifier(slot_name))?;

    let column = slot.envelope_column();
    let current = record
        .envelope(column)
        .filter(|envelope| !envelope.as_str().is_empty());

    if let Some(key) = record.key_cache().get(slot_name, current.as_ref()) {
        return Ok(key.clone());
    }
    if record.key_cache_mut().invalidate(slot_name) {
        log::trace!("Discarding stale cached key for slot {}", slot_name);
    }

    let context = slot.context_for(record);
    let client = registry.client();

    match current {
        None => {
            log::trace!("Slot {}: empty -> generating", slot_name);
            let (key, envelope) = client.generate_data_key(key_id, &context)?;
            record.set_envelope(column, Some(envelope.clone()));
            record.key_cache_mut().insert(slot_name, key.clone(), envelope);
            Ok(key)
        }
        Some(envelope) => {
            log::trace!("Slot {}: empty -> decrypting", slot_name);
            let key = client.decrypt(key_id, &envelope, &context)?;
            record.key_cache_mut().insert(slot_name, key.clone(), envelope);
            Ok(key)
        }
    }
}

/// Clear the cached key of every registered slot.
///
/// The record framework must call this whenever it reloads the record.
pub fn invalidate_keys<R: KmsRecord>(record: &mut R) {
    let registry = record.key_registry();
    let cache = record.key_cache_mut();
    for slot in registry.slots() {
        cache.invalidate(slot.name());
    }
}

/// Key access methods available on every [`KmsRecord`]
pub trait KmsKeys: KmsRecord {
    fn kms_key_for(&mut self, slot_name: &str) -> KmsResult<DataKey> {
        resolve(self, slot_name)
    }

    fn invalidate_keys(&mut self) {
        invalidate_keys(self)
    }
}

impl<R: KmsRecord> KmsKeys for R {}
