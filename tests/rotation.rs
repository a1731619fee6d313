//! Rotation of a document's data keys against the in-memory store.

mod common;

use std::sync::Arc;

use common::*;
use kms_envelope::prelude::*;
use kms_envelope::{named_slot, InMemoryKms, KmsConfig, SlotState};

fn saved_document(key_id: &str) -> (Arc<InMemoryKms>, Arc<KeySlotRegistry<Document>>, Arc<Store>) {
    let kms = Arc::new(InMemoryKms::new());
    let registry = registry(&kms, Some(key_id), Some(CLOUD_B_KEY), KmsConfig::default());
    let store = Store::new();

    let mut doc = Document::new(1, &registry, &store);
    doc.set("title", "minutes").unwrap();
    doc.set("body", "attendees: all").unwrap();
    doc.set("phone", "555-0100").unwrap();
    doc.save().unwrap();
    (kms, registry, store)
}

#[test]
fn test_rotation_preserves_values_for_every_provider() {
    for key_id in [CLOUD_A_KEY, CLOUD_B_KEY, TRANSIT_KEY] {
        let (_, registry, store) = saved_document(key_id);
        let mut doc = Document::load(1, &registry, &store);
        let old_envelope = doc.column("encrypted_kms_key").unwrap().to_string();
        let old_key = doc.kms_key().unwrap();

        doc.rotate_kms_key().unwrap();

        let new_envelope = doc.column("encrypted_kms_key").unwrap().to_string();
        assert_ne!(old_envelope, new_envelope, "{}", key_id);
        assert_ne!(old_key, doc.kms_key().unwrap(), "{}", key_id);
        assert_eq!(store.row(1)["encrypted_kms_key"], new_envelope);

        let mut reloaded = Document::load(1, &registry, &store);
        assert_eq!(reloaded.get("title").unwrap().as_deref(), Some("minutes"));
        assert_eq!(reloaded.get("body").unwrap().as_deref(), Some("attendees: all"));
    }
}

#[test]
fn test_rotation_only_touches_target_slot() {
    let (_, registry, store) = saved_document(CLOUD_B_KEY);
    let before = store.row(1);
    let mut doc = Document::load(1, &registry, &store);

    doc.rotate_kms_key_for(&named_slot("phone")).unwrap();

    let after = store.row(1);
    assert_eq!(before["encrypted_kms_key"], after["encrypted_kms_key"]);
    assert_eq!(before["encrypted_title"], after["encrypted_title"]);
    assert_ne!(before["encrypted_kms_key_phone"], after["encrypted_kms_key_phone"]);
    assert_ne!(before["encrypted_phone"], after["encrypted_phone"]);
    assert_eq!(doc.get("phone").unwrap().as_deref(), Some("555-0100"));
}

#[test]
fn test_insecure_rotation_changes_envelope() {
    let (_, registry, store) = saved_document(INSECURE_KEY);
    let mut doc = Document::load(1, &registry, &store);
    let old_envelope = doc.column("encrypted_kms_key").unwrap().to_string();

    // Suffixes are random below 10^12; a collision is not a realistic outcome
    doc.rotate_kms_key().unwrap();
    assert_ne!(doc.column("encrypted_kms_key").unwrap(), old_envelope);
    assert_eq!(doc.get("title").unwrap().as_deref(), Some("minutes"));
}

#[test]
fn test_unset_attribute_stays_unset() {
    let kms = Arc::new(InMemoryKms::new());
    let registry = registry(&kms, Some(CLOUD_B_KEY), Some(CLOUD_B_KEY), KmsConfig::default());
    let store = Store::new();
    let mut doc = Document::new(1, &registry, &store);
    doc.set("title", "only title").unwrap();
    doc.save().unwrap();

    doc.rotate_kms_key().unwrap();
    assert_eq!(doc.get("title").unwrap().as_deref(), Some("only title"));
    assert_eq!(doc.get("body").unwrap(), None);
    assert!(store.row(1).get("encrypted_body").is_none());
}

#[test]
fn test_rotation_without_attributes_still_replaces_key() {
    let kms = Arc::new(InMemoryKms::new());
    let registry = registry(&kms, Some(TRANSIT_KEY), Some(CLOUD_B_KEY), KmsConfig::default());
    let store = Store::new();
    let mut doc = Document::new(1, &registry, &store);
    let old_key = doc.kms_key().unwrap();
    doc.save().unwrap();

    doc.rotate_kms_key().unwrap();
    assert_ne!(old_key, doc.kms_key().unwrap());
    assert_eq!(store.writes(), 2);
}

#[test]
fn test_rejected_write_keeps_old_durable_state() {
    let (_, registry, store) = saved_document(CLOUD_B_KEY);
    let before = store.row(1);
    let mut doc = Document::load(1, &registry, &store);

    store.reject_writes(true);
    let err = doc.rotate_kms_key().unwrap_err();
    assert!(matches!(err, KmsError::PersistenceError { .. }));
    assert_eq!(store.row(1), before);

    // In-memory state is rotated but not durable; reload and rotate again
    assert_ne!(doc.column("encrypted_kms_key"), before.get("encrypted_kms_key").map(String::as_str));
    store.reject_writes(false);
    doc.reload();
    assert_eq!(doc.get("title").unwrap().as_deref(), Some("minutes"));

    doc.rotate_kms_key().unwrap();
    assert_ne!(store.row(1)["encrypted_kms_key"], before["encrypted_kms_key"]);
    assert_eq!(doc.get("body").unwrap().as_deref(), Some("attendees: all"));
}

#[test]
fn test_provider_failure_before_save_leaves_storage_intact() {
    let (kms, registry, store) = saved_document(CLOUD_A_KEY);
    let before = store.row(1);
    let writes = store.writes();

    // Old key already cached, so only the new generate fails
    let mut doc = Document::load(1, &registry, &store);
    doc.kms_key().unwrap();
    kms.set_unavailable(true);

    let err = doc.rotate_kms_key().unwrap_err();
    assert!(matches!(err, KmsError::ProviderError { .. }));
    assert_eq!(doc.key_cache().state(DEFAULT_SLOT), SlotState::Empty);
    assert_eq!(store.row(1), before);
    assert_eq!(store.writes(), writes);

    kms.set_unavailable(false);
    doc.reload();
    assert_eq!(doc.get("title").unwrap().as_deref(), Some("minutes"));
}

#[test]
fn test_rotation_of_unknown_slot() {
    let (_, registry, store) = saved_document(CLOUD_B_KEY);
    let mut doc = Document::load(1, &registry, &store);
    let err = doc.rotate_kms_key_for("kms_key_missing").unwrap_err();
    assert!(matches!(err, KmsError::NotFoundError { .. }));
}
