//! Client traits for the remote KMS variants.
//!
//! The wire protocols of the individual services are not implemented here.
//! An application plugs in its own SDK-backed client for each variant it
//! uses; the adapter only relies on these narrow, synchronous operations.

use crate::data_key::EncryptionContext;
use crate::error::BoxedError;

/// Result of a Cloud-A encrypt call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudAEncryptResponse {
    /// Full key version resource name that performed the encryption
    pub key_version_name: String,
    pub ciphertext: Vec<u8>,
}

/// Cloud-A KMS, addressed by `projects/.../cryptoKeys/<key>` resource names
pub trait CloudAKms: Send + Sync {
    /// Encrypt `plaintext` under `key_name`, binding `aad`
    fn encrypt(
        &self,
        key_name: &str,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<CloudAEncryptResponse, BoxedError>;

    /// Decrypt `ciphertext` with the base key `key_name`, checking `aad`
    fn decrypt(&self, key_name: &str, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, BoxedError>;
}

/// Cloud-B KMS, addressed by key ARN or alias.
///
/// The ciphertext blob identifies its key, so decryption takes no key id.
pub trait CloudBKms: Send + Sync {
    fn encrypt(
        &self,
        key_id: &str,
        plaintext: &[u8],
        context: &EncryptionContext,
    ) -> Result<Vec<u8>, BoxedError>;

    fn decrypt(&self, ciphertext: &[u8], context: &EncryptionContext) -> Result<Vec<u8>, BoxedError>;
}

/// Secrets-engine transit backend.
///
/// `key_path` is the part of the key identifier after `vault/`; `context` is
/// the canonical JSON of the encryption context. Ciphertexts are the engine's
/// own `vault:`-prefixed strings.
pub trait TransitKms: Send + Sync {
    fn encrypt(&self, key_path: &str, plaintext: &[u8], context: &[u8]) -> Result<String, BoxedError>;

    fn decrypt(&self, key_path: &str, ciphertext: &str, context: &[u8]) -> Result<Vec<u8>, BoxedError>;
}
