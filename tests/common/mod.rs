//! Record fixture shared by the integration tests.
//!
//! `Document` stands in for a record framework: columns live in a
//! `HashMap`, saves go to an in-memory `Store` in one write, and attributes
//! are sealed with AES-256-GCM under the slot's data key.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Key, Nonce,
};
use kms_envelope::prelude::*;
use kms_envelope::{
    invalidate_keys, kms_key_accessors, named_slot, resolve, BoxedError, InMemoryKms, KmsConfig,
};

pub const CLOUD_A_KEY: &str = "projects/acme/locations/global/keyRings/app/cryptoKeys/documents";
pub const CLOUD_B_KEY: &str = "arn:aws:kms:us-east-1:111122223333:key/documents";
pub const TRANSIT_KEY: &str = "vault/documents";
pub const INSECURE_KEY: &str = "insecure-test-key";

const NONCE_LEN: usize = 12;

/// Durable rows keyed by id
#[derive(Default)]
pub struct Store {
    rows: Mutex<HashMap<u64, HashMap<String, String>>>,
    reject_writes: AtomicBool,
    writes: AtomicUsize,
}

impl Store {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn row(&self, id: u64) -> HashMap<String, String> {
        self.rows.lock().unwrap().get(&id).cloned().unwrap_or_default()
    }

    fn write(&self, id: u64, columns: HashMap<String, String>) -> Result<(), BoxedError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err("write rejected: version conflict".into());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().insert(id, columns);
        Ok(())
    }
}

pub struct Document {
    pub id: u64,
    registry: Arc<KeySlotRegistry<Document>>,
    store: Arc<Store>,
    columns: HashMap<String, String>,
    cache: KeyCache,
}

kms_key_accessors!(Document {
    "kms_key" => kms_key, rotate_kms_key;
    "kms_key_phone" => kms_key_phone, rotate_kms_key_phone;
});

/// Registry with `kms_key` (title, body) and `kms_key_phone` (phone)
pub fn registry(
    kms: &Arc<InMemoryKms>,
    key_id: Option<&str>,
    phone_key_id: Option<&str>,
    config: KmsConfig,
) -> Arc<KeySlotRegistry<Document>> {
    let client = KmsClient::builder()
        .cloud_a(kms.clone())
        .cloud_b(kms.clone())
        .transit(kms.clone())
        .build();
    let mut registry = KeySlotRegistry::with_config(Arc::new(client), config);
    let resolver: ContextResolver<Document> =
        Arc::new(|doc: &Document| EncryptionContext::new().with("document_id", doc.id.to_string()));
    registry
        .register(DEFAULT_SLOT, key_id, Some(resolver))
        .unwrap();
    registry
        .register(&named_slot("phone"), phone_key_id, None)
        .unwrap();
    Arc::new(registry)
}

impl Document {
    pub fn new(id: u64, registry: &Arc<KeySlotRegistry<Document>>, store: &Arc<Store>) -> Self {
        Self {
            id,
            registry: registry.clone(),
            store: store.clone(),
            columns: HashMap::new(),
            cache: KeyCache::new(),
        }
    }

    pub fn load(id: u64, registry: &Arc<KeySlotRegistry<Document>>, store: &Arc<Store>) -> Self {
        let mut doc = Self::new(id, registry, store);
        doc.columns = store.row(id);
        doc
    }

    /// Re-fetch from the store, honouring the reload contract
    pub fn reload(&mut self) {
        self.columns = self.store.row(self.id);
        invalidate_keys(self);
    }

    pub fn save(&mut self) -> Result<(), BoxedError> {
        self.store.write(self.id, self.columns.clone())
    }

    pub fn column(&self, name: &str) -> Option<&str> {
        self.columns.get(name).map(String::as_str)
    }

    pub fn set(&mut self, attribute: &str, value: &str) -> KmsResult<()> {
        let key = resolve(self, &slot_for(attribute))?;
        self.encrypt_attribute(attribute, Some(value.as_bytes()), &key)
    }

    pub fn get(&mut self, attribute: &str) -> KmsResult<Option<String>> {
        let key = resolve(self, &slot_for(attribute))?;
        Ok(self
            .decrypt_attribute(attribute, &key)?
            .map(|bytes| String::from_utf8(bytes).unwrap()))
    }
}

fn slot_for(attribute: &str) -> String {
    match attribute {
        "phone" => named_slot("phone"),
        _ => DEFAULT_SLOT.to_string(),
    }
}

fn attribute_column(attribute: &str) -> String {
    format!("encrypted_{}", attribute)
}

impl KmsRecord for Document {
    fn key_registry(&self) -> Arc<KeySlotRegistry<Self>> {
        self.registry.clone()
    }

    fn key_cache(&self) -> &KeyCache {
        &self.cache
    }

    fn key_cache_mut(&mut self) -> &mut KeyCache {
        &mut self.cache
    }

    fn envelope(&self, column: &str) -> Option<WrappedKeyEnvelope> {
        self.columns.get(column).map(|v| WrappedKeyEnvelope::new(v.clone()))
    }

    fn set_envelope(&mut self, column: &str, envelope: Option<WrappedKeyEnvelope>) {
        match envelope {
            Some(envelope) => self.columns.insert(column.to_string(), envelope.into_string()),
            None => self.columns.remove(column),
        };
    }
}

impl EncryptedAttributes for Document {
    fn attribute_bindings(&self) -> Vec<EncryptedAttributeBinding> {
        vec![
            EncryptedAttributeBinding::new("title", DEFAULT_SLOT),
            EncryptedAttributeBinding::new("body", DEFAULT_SLOT),
            EncryptedAttributeBinding::new("phone", named_slot("phone")),
        ]
    }

    fn decrypt_attribute(&self, attribute: &str, key: &DataKey) -> KmsResult<Option<Vec<u8>>> {
        let encoded = match self.columns.get(&attribute_column(attribute)) {
            Some(encoded) => encoded,
            None => return Ok(None),
        };
        let data = base64::decode(encoded).map_err(|e| KmsError::SerializationError(e.to_string()))?;
        let (nonce, sealed) = data.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: attribute.as_bytes(),
                },
            )
            .map(Some)
            .map_err(|_| KmsError::SerializationError(format!("cannot decrypt {}", attribute)))
    }

    fn encrypt_attribute(
        &mut self,
        attribute: &str,
        plaintext: Option<&[u8]>,
        key: &DataKey,
    ) -> KmsResult<()> {
        let column = attribute_column(attribute);
        let plaintext = match plaintext {
            Some(plaintext) => plaintext,
            None => {
                self.columns.remove(&column);
                return Ok(());
            }
        };
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: attribute.as_bytes(),
                },
            )
            .map_err(|_| KmsError::SerializationError(format!("cannot encrypt {}", attribute)))?;
        let mut data = nonce.to_vec();
        data.extend_from_slice(&sealed);
        self.columns.insert(column, base64::encode(data));
        Ok(())
    }

    fn save_atomically(&mut self) -> Result<(), BoxedError> {
        self.save()
    }
}
