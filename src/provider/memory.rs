//! In-memory KMS backend for tests and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Key, Nonce,
};

use super::backends::{CloudAEncryptResponse, CloudAKms, CloudBKms, TransitKms};
use crate::data_key::{DataKey, EncryptionContext};
use crate::error::BoxedError;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const TRANSIT_CIPHERTEXT_PREFIX: &str = "vault:v1:";
const CLOUD_A_VERSION_SEGMENT: &str = "/cryptoKeyVersions/";

/// In-memory KMS implementing every remote client trait with AES-256-GCM.
///
/// A master key is created the first time a key name is used for
/// encryption. Ciphertexts are `nonce || sealed` and bind the supplied
/// context as AAD, so a mismatched context fails to decrypt.
///
/// # Security Warning
///
/// Master keys live in process memory without access control. This backend
/// must NOT be used in production.
#[derive(Default)]
pub struct InMemoryKms {
    master_keys: Mutex<HashMap<String, DataKey>>,
    unavailable: AtomicBool,
    encrypt_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
}

impl InMemoryKms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the service were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.encrypt_calls() + self.decrypt_calls()
    }

    fn check_available(&self) -> Result<(), BoxedError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err("service unavailable".into());
        }
        Ok(())
    }

    fn cipher_for(&self, key_name: &str, create: bool) -> Result<Aes256Gcm, BoxedError> {
        let mut keys = self
            .master_keys
            .lock()
            .map_err(|_| "master key store poisoned")?;
        if !keys.contains_key(key_name) {
            if !create {
                return Err(format!("master key not found: {}", key_name).into());
            }
            keys.insert(key_name.to_string(), DataKey::generate()?);
        }
        let master = keys
            .get(key_name)
            .ok_or_else(|| format!("master key not found: {}", key_name))?;
        Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(master.as_bytes())))
    }

    fn seal(&self, key_name: &str, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, BoxedError> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let cipher = self.cipher_for(key_name, true)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher
            .encrypt(&nonce, Payload { msg: plaintext, aad })
            .map_err(|_| "encryption failed")?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn open(&self, key_name: &str, data: &[u8], aad: &[u8]) -> Result<Vec<u8>, BoxedError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        if data.len() < NONCE_LEN + TAG_LEN {
            return Err("ciphertext too short".into());
        }
        let cipher = self.cipher_for(key_name, false)?;
        let (nonce, sealed) = data.split_at(NONCE_LEN);
        cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: sealed, aad })
            .map_err(|_| "invalid ciphertext or context".into())
    }
}

fn base_key_name(key_name: &str) -> &str {
    match key_name.find(CLOUD_A_VERSION_SEGMENT) {
        Some(idx) => &key_name[..idx],
        None => key_name,
    }
}

impl CloudAKms for InMemoryKms {
    fn encrypt(
        &self,
        key_name: &str,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<CloudAEncryptResponse, BoxedError> {
        let base = base_key_name(key_name);
        let ciphertext = self.seal(base, plaintext, aad)?;
        Ok(CloudAEncryptResponse {
            key_version_name: format!("{}{}1", base, CLOUD_A_VERSION_SEGMENT),
            ciphertext,
        })
    }

    fn decrypt(&self, key_name: &str, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, BoxedError> {
        self.open(base_key_name(key_name), ciphertext, aad)
    }
}

impl CloudBKms for InMemoryKms {
    // Blob layout: [key id length: 2 BE][key id][nonce][sealed]
    fn encrypt(
        &self,
        key_id: &str,
        plaintext: &[u8],
        context: &EncryptionContext,
    ) -> Result<Vec<u8>, BoxedError> {
        let id_len = u16::try_from(key_id.len()).map_err(|_| "key id too long")?;
        let sealed = self.seal(key_id, plaintext, &context.to_aad()?)?;

        let mut blob = Vec::with_capacity(2 + key_id.len() + sealed.len());
        blob.extend_from_slice(&id_len.to_be_bytes());
        blob.extend_from_slice(key_id.as_bytes());
        blob.extend_from_slice(&sealed);
        Ok(blob)
    }

    fn decrypt(&self, ciphertext: &[u8], context: &EncryptionContext) -> Result<Vec<u8>, BoxedError> {
        if ciphertext.len() < 2 {
            self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
            return Err("ciphertext blob too short".into());
        }
        let id_len = u16::from_be_bytes([ciphertext[0], ciphertext[1]]) as usize;
        let rest = &ciphertext[2..];
        if rest.len() < id_len {
            self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
            return Err("ciphertext blob too short".into());
        }
        let (key_id, sealed) = rest.split_at(id_len);
        let key_id = std::str::from_utf8(key_id).map_err(|_| "key id is not UTF-8")?;
        self.open(key_id, sealed, &context.to_aad()?)
    }
}

impl TransitKms for InMemoryKms {
    fn encrypt(&self, key_path: &str, plaintext: &[u8], context: &[u8]) -> Result<String, BoxedError> {
        let sealed = self.seal(key_path, plaintext, context)?;
        Ok(format!("{}{}", TRANSIT_CIPHERTEXT_PREFIX, base64::encode(sealed)))
    }

    fn decrypt(&self, key_path: &str, ciphertext: &str, context: &[u8]) -> Result<Vec<u8>, BoxedError> {
        let encoded = ciphertext
            .strip_prefix(TRANSIT_CIPHERTEXT_PREFIX)
            .ok_or("unsupported ciphertext version")?;
        let sealed = base64::decode(encoded)?;
        self.open(key_path, &sealed, context)
    }
}
