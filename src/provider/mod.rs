/*!
 * KMS Provider Adapter
 *
 * Generates and unwraps data keys through the provider selected by the
 * key identifier. Remote variants generate the 256-bit key locally and ask
 * the provider to wrap it, binding the canonical encryption context as
 * authenticated data. Each call is issued exactly once; failures surface to
 * the caller without retry or fallback.
 */

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use zeroize::Zeroizing;

use crate::data_key::{DataKey, EncryptionContext};
use crate::envelope::{decode_envelope, encode_envelope, EnvelopePayload, WrappedKeyEnvelope};
use crate::error::{error_codes, BoxedError, KmsError, KmsResult};
use crate::observer::{
    KeyEvent, KeyEventObserver, KeyEventOutcome, LogObserver, DECRYPT_DATA_KEY_EVENT,
    GENERATE_DATA_KEY_EVENT,
};

mod backends;
mod kind;
mod memory;


pub use backends::{CloudAEncryptResponse, CloudAKms, CloudBKms, TransitKms};
pub use kind::{ProviderKind, CLOUD_A_KEY_PREFIX, INSECURE_TEST_KEY_ID, TRANSIT_KEY_PREFIX};
pub use memory::InMemoryKms;

/// Exclusive upper bound of the insecure envelope's random suffix
const INSECURE_SUFFIX_BOUND: u64 = 1_000_000_000_000;

const GENERATE_OPERATION: &str = "generate_data_key";
const DECRYPT_OPERATION: &str = "decrypt";

/// Dispatches data key operations to the configured provider backends.
///
/// Built once per record type and shared read-only. The insecure test
/// variant is always available; remote variants need a backend registered
/// on the [`KmsClientBuilder`].
///
/// # Example
///
/// ```
/// use kms_envelope::{EncryptionContext, KmsClient};
///
/// let client = KmsClient::builder().build();
/// let context = EncryptionContext::new();
/// let (key, envelope) = client.generate_data_key("insecure-test-key", &context).unwrap();
/// assert!(envelope.as_str().starts_with("insecure-data-key-"));
/// assert_eq!(client.decrypt("insecure-test-key", &envelope, &context).unwrap(), key);
/// ```
pub struct KmsClient {
    cloud_a: Option<Arc<dyn CloudAKms>>,
    cloud_b: Option<Arc<dyn CloudBKms>>,
    transit: Option<Arc<dyn TransitKms>>,
    observer: Arc<dyn KeyEventObserver>,
}

impl fmt::Debug for KmsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsClient")
            .field("cloud_a", &self.cloud_a.is_some())
            .field("cloud_b", &self.cloud_b.is_some())
            .field("transit", &self.transit.is_some())
            .finish()
    }
}

/// Builder for [`KmsClient`]
#[derive(Default)]
pub struct KmsClientBuilder {
    cloud_a: Option<Arc<dyn CloudAKms>>,
    cloud_b: Option<Arc<dyn CloudBKms>>,
    transit: Option<Arc<dyn TransitKms>>,
    observer: Option<Arc<dyn KeyEventObserver>>,
}

impl KmsClientBuilder {
    pub fn cloud_a(mut self, client: Arc<dyn CloudAKms>) -> Self {
        self.cloud_a = Some(client);
        self
    }

    pub fn cloud_b(mut self, client: Arc<dyn CloudBKms>) -> Self {
        self.cloud_b = Some(client);
        self
    }

    pub fn transit(mut self, client: Arc<dyn TransitKms>) -> Self {
        self.transit = Some(client);
        self
    }

    /// Replace the default [`LogObserver`]
    pub fn observer(mut self, observer: Arc<dyn KeyEventObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> KmsClient {
        KmsClient {
            cloud_a: self.cloud_a,
            cloud_b: self.cloud_b,
            transit: self.transit,
            observer: self.observer.unwrap_or_else(|| Arc::new(LogObserver)),
        }
    }
}

impl KmsClient {
    pub fn builder() -> KmsClientBuilder {
        KmsClientBuilder::default()
    }

    /// Create a fresh data key and wrap it under `key_id`
    ///
    /// # Returns
    ///
    /// The plaintext key and the envelope to persist
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` if the backend is missing or the remote call
    /// fails, `RandomGenerationError` if no key can be generated locally
    pub fn generate_data_key(
        &self,
        key_id: &str,
        context: &EncryptionContext,
    ) -> KmsResult<(DataKey, WrappedKeyEnvelope)> {
        let event = KeyEvent::new(GENERATE_DATA_KEY_EVENT, key_id, context);
        self.observed(&event, || self.generate_unobserved(key_id, context))
    }

    /// Unwrap `envelope` with the provider selected by `key_id`
    ///
    /// For Cloud-A the key used for decryption is taken from the envelope,
    /// not from `key_id`, so envelopes written before a provider-side key
    /// change still decrypt.
    ///
    /// # Errors
    ///
    /// Returns `MalformedEnvelopeError` if the envelope does not match the
    /// provider's format, `ProviderError` on remote or authentication failure
    pub fn decrypt(
        &self,
        key_id: &str,
        envelope: &WrappedKeyEnvelope,
        context: &EncryptionContext,
    ) -> KmsResult<DataKey> {
        let event = KeyEvent::new(DECRYPT_DATA_KEY_EVENT, key_id, context);
        self.observed(&event, || self.decrypt_unobserved(key_id, envelope, context))
    }

    fn observed<T>(&self, event: &KeyEvent, call: impl FnOnce() -> KmsResult<T>) -> KmsResult<T> {
        self.observer.on_start(event);
        let started = Utc::now();
        let result = call();
        let outcome = KeyEventOutcome {
            success: result.is_ok(),
            elapsed: Utc::now() - started,
        };
        self.observer.on_finish(event, &outcome);
        result
    }

    fn generate_unobserved(
        &self,
        key_id: &str,
        context: &EncryptionContext,
    ) -> KmsResult<(DataKey, WrappedKeyEnvelope)> {
        let kind = ProviderKind::for_key_id(key_id);
        log::debug!("Generating data key with {} for {}", kind, key_id);

        let aad = context.to_aad()?;
        let remote_err = |e: BoxedError| {
            log::warn!("{} failed to wrap data key for {}: {}", kind, key_id, e);
            KmsError::provider_error(
                kind.name(),
                GENERATE_OPERATION,
                &e.to_string(),
                key_id,
                error_codes::PROVIDER_GENERATE_FAILED,
            )
        };

        let plaintext = match kind {
            ProviderKind::InsecureTest => DataKey::insecure_test_key(),
            _ => DataKey::generate()?,
        };

        let payload = match kind {
            ProviderKind::InsecureTest => {
                let suffix = rand::thread_rng().gen_range(0..INSECURE_SUFFIX_BOUND);
                EnvelopePayload::InsecureTest {
                    suffix: suffix.to_string(),
                }
            }
            ProviderKind::CloudA => {
                let client = require_backend(kind, key_id, GENERATE_OPERATION, &self.cloud_a)?;
                let response = client
                    .encrypt(key_id, plaintext.as_bytes(), &aad)
                    .map_err(remote_err)?;
                EnvelopePayload::CloudA {
                    key_name: response.key_version_name,
                    ciphertext: response.ciphertext,
                }
            }
            ProviderKind::Transit => {
                let client = require_backend(kind, key_id, GENERATE_OPERATION, &self.transit)?;
                let ciphertext = client
                    .encrypt(transit_path(key_id), plaintext.as_bytes(), &aad)
                    .map_err(remote_err)?;
                EnvelopePayload::Transit { ciphertext }
            }
            ProviderKind::CloudB => {
                let client = require_backend(kind, key_id, GENERATE_OPERATION, &self.cloud_b)?;
                let ciphertext = client
                    .encrypt(key_id, plaintext.as_bytes(), context)
                    .map_err(remote_err)?;
                EnvelopePayload::CloudB { ciphertext }
            }
        };

        let envelope = encode_envelope(&payload)?;
        Ok((plaintext, envelope))
    }

    fn decrypt_unobserved(
        &self,
        key_id: &str,
        envelope: &WrappedKeyEnvelope,
        context: &EncryptionContext,
    ) -> KmsResult<DataKey> {
        let kind = ProviderKind::for_key_id(key_id);
        log::debug!("Decrypting data key with {} for {}", kind, key_id);

        let payload = decode_envelope(kind, envelope)?;
        let aad = context.to_aad()?;
        let remote_err = |e: BoxedError| {
            log::warn!("{} failed to unwrap data key for {}: {}", kind, key_id, e);
            KmsError::provider_error(
                kind.name(),
                DECRYPT_OPERATION,
                &e.to_string(),
                key_id,
                error_codes::PROVIDER_DECRYPT_FAILED,
            )
        };

        let plaintext = Zeroizing::new(match payload {
            EnvelopePayload::InsecureTest { .. } => return Ok(DataKey::insecure_test_key()),
            EnvelopePayload::CloudA {
                key_name,
                ciphertext,
            } => {
                let client = require_backend(kind, key_id, DECRYPT_OPERATION, &self.cloud_a)?;
                client
                    .decrypt(&key_name, &ciphertext, &aad)
                    .map_err(remote_err)?
            }
            EnvelopePayload::Transit { ciphertext } => {
                let client = require_backend(kind, key_id, DECRYPT_OPERATION, &self.transit)?;
                client
                    .decrypt(transit_path(key_id), &ciphertext, &aad)
                    .map_err(remote_err)?
            }
            EnvelopePayload::CloudB { ciphertext } => {
                let client = require_backend(kind, key_id, DECRYPT_OPERATION, &self.cloud_b)?;
                client.decrypt(&ciphertext, context).map_err(remote_err)?
            }
        });

        DataKey::try_from_slice(&plaintext).ok_or_else(|| {
            KmsError::provider_error(
                kind.name(),
                DECRYPT_OPERATION,
                &format!("unwrapped key has {} bytes", plaintext.len()),
                key_id,
                error_codes::INVALID_DATA_KEY,
            )
        })
    }
}

/// Transit key path: the key identifier after `vault/`
fn transit_path(key_id: &str) -> &str {
    key_id.strip_prefix(TRANSIT_KEY_PREFIX).unwrap_or(key_id)
}

fn require_backend<'a, C: ?Sized>(
    kind: ProviderKind,
    key_id: &str,
    operation: &str,
    backend: &'a Option<Arc<C>>,
) -> KmsResult<&'a Arc<C>> {
    backend.as_ref().ok_or_else(|| {
        KmsError::provider_error(
            kind.name(),
            operation,
            "no backend configured",
            key_id,
            error_codes::PROVIDER_NOT_CONFIGURED,
        )
    })
}
