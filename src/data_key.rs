//! Plaintext Data Keys and Encryption Contexts
//!
//! A [`DataKey`] is the 256-bit symmetric key handed to attribute encryption.
//! It only ever lives in process memory: it is wiped when dropped, compares in
//! constant time, and prints as `[REDACTED]`.
//!
//! An [`EncryptionContext`] is the additional authenticated data bound to every
//! wrap and unwrap call. Its canonical form is compact JSON with sorted keys,
//! so the same mapping always produces the same bytes.

use std::collections::BTreeMap;
use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{KmsError, KmsResult};

/// Length of a plaintext data key in bytes
pub const DATA_KEY_LEN: usize = 32;

/// A plaintext 256-bit data key.
///
/// The key material is zeroed when the value is dropped. Clones are
/// independent copies and are wiped independently.
///
/// # Example
///
/// ```
/// use kms_envelope::DataKey;
///
/// let key = DataKey::insecure_test_key();
/// assert_eq!(key.as_bytes(), &[0u8; 32]);
/// assert_eq!(format!("{:?}", key), "DataKey([REDACTED])");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKey {
    bytes: [u8; DATA_KEY_LEN],
}

impl DataKey {
    /// Wrap existing key material
    pub fn new(bytes: [u8; DATA_KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Copy key material out of a slice, returning `None` unless it is exactly 32 bytes
    pub fn try_from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; DATA_KEY_LEN] = bytes.try_into().ok()?;
        Some(Self { bytes })
    }

    /// Generate a fresh key from the operating system's CSPRNG
    ///
    /// # Errors
    ///
    /// Returns `RandomGenerationError` if the OS random source fails
    pub fn generate() -> KmsResult<Self> {
        let mut bytes = [0u8; DATA_KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| KmsError::random_generation_error(&e.to_string()))?;
        Ok(Self { bytes })
    }

    /// The fixed all-zero key produced by the insecure test provider
    pub fn insecure_test_key() -> Self {
        Self {
            bytes: [0u8; DATA_KEY_LEN],
        }
    }

    /// Borrow the raw key material
    pub fn as_bytes(&self) -> &[u8; DATA_KEY_LEN] {
        &self.bytes
    }
}

impl PartialEq for DataKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for DataKey {}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataKey([REDACTED])")
    }
}

/// Additional authenticated data bound to wrap/unwrap operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptionContext(BTreeMap<String, String>);

impl EncryptionContext {
    /// An empty context, serialized as `{}`
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Canonical JSON: sorted keys, no insignificant whitespace
    pub fn canonical_json(&self) -> KmsResult<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Canonical JSON as bytes, ready to pass as AAD
    pub fn to_aad(&self) -> KmsResult<Vec<u8>> {
        self.canonical_json().map(String::into_bytes)
    }
}

impl From<BTreeMap<String, String>> for EncryptionContext {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EncryptionContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
