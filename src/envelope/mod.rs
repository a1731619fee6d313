/*!
 * Wrapped Key Envelope Codec
 *
 * Serializes and parses the persisted form of a wrapped data key. The
 * envelope is the only artifact ever written to storage, so these formats
 * are fixed and must stay readable across versions:
 *
 * - Insecure test: `insecure-data-key-<digits>`
 * - Cloud-A: `$gc$<base64 shortened key path>$<base64 ciphertext>`
 * - Transit: the secrets engine's own `vault:...` string, verbatim
 * - Cloud-B: bare base64 of the ciphertext blob
 */

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{error_codes, KmsError, KmsResult};
use crate::provider::ProviderKind;

#[cfg(test)]
mod tests;

/// Prefix of insecure test envelopes
pub const INSECURE_ENVELOPE_PREFIX: &str = "insecure-data-key-";

/// Tag opening a Cloud-A envelope
pub const CLOUD_A_ENVELOPE_TAG: &str = "$gc$";

/// Prefix of secrets-engine ciphertexts
pub const TRANSIT_ENVELOPE_PREFIX: &str = "vault:";

const CLOUD_A_SEPARATOR: char = '$';

/// Labels interleaved with the identifying segments of a Cloud-A key path
const CLOUD_A_PATH_LABELS: [&str; 5] = [
    "projects",
    "locations",
    "keyRings",
    "cryptoKeys",
    "cryptoKeyVersions",
];

/// Persisted, provider-tagged form of a data key. Never holds plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WrappedKeyEnvelope(String);

impl WrappedKeyEnvelope {
    pub fn new(envelope: impl Into<String>) -> Self {
        Self(envelope.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Which provider's tag pattern this envelope carries
    pub fn detect_kind(&self) -> ProviderKind {
        if self.0.starts_with(INSECURE_ENVELOPE_PREFIX) {
            ProviderKind::InsecureTest
        } else if self.0.starts_with(CLOUD_A_ENVELOPE_TAG) {
            ProviderKind::CloudA
        } else if self.0.starts_with(TRANSIT_ENVELOPE_PREFIX) {
            ProviderKind::Transit
        } else {
            ProviderKind::CloudB
        }
    }
}

impl fmt::Display for WrappedKeyEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WrappedKeyEnvelope {
    fn from(envelope: String) -> Self {
        Self(envelope)
    }
}

impl From<&str> for WrappedKeyEnvelope {
    fn from(envelope: &str) -> Self {
        Self(envelope.to_string())
    }
}

/// The provider-specific parts carried inside an envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopePayload {
    /// Decimal suffix after `insecure-data-key-`
    InsecureTest { suffix: String },

    /// On encode `key_name` is the key (version) path the provider reported;
    /// on decode it is the reconstructed base key path, version dropped.
    CloudA { key_name: String, ciphertext: Vec<u8> },

    /// Opaque secrets-engine ciphertext, persisted verbatim
    Transit { ciphertext: String },

    /// Raw ciphertext blob
    CloudB { ciphertext: Vec<u8> },
}

impl EnvelopePayload {
    pub fn kind(&self) -> ProviderKind {
        match self {
            EnvelopePayload::InsecureTest { .. } => ProviderKind::InsecureTest,
            EnvelopePayload::CloudA { .. } => ProviderKind::CloudA,
            EnvelopePayload::Transit { .. } => ProviderKind::Transit,
            EnvelopePayload::CloudB { .. } => ProviderKind::CloudB,
        }
    }
}

/// Serialize a payload into its persisted envelope string
///
/// # Errors
///
/// Returns `MalformedEnvelopeError` if the payload cannot be represented in
/// its provider's format (non-decimal insecure suffix, Cloud-A path with too
/// few segments, transit ciphertext without the `vault:` prefix).
pub fn encode_envelope(payload: &EnvelopePayload) -> KmsResult<WrappedKeyEnvelope> {
    let provider = payload.kind().name();
    let encoded = match payload {
        EnvelopePayload::InsecureTest { suffix } => {
            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                return Err(KmsError::malformed_envelope(
                    provider,
                    "insecure suffix must be decimal digits",
                    error_codes::MALFORMED_ENVELOPE,
                ));
            }
            format!("{}{}", INSECURE_ENVELOPE_PREFIX, suffix)
        }
        EnvelopePayload::CloudA {
            key_name,
            ciphertext,
        } => {
            let short = shorten_key_path(key_name);
            if short.split('/').count() < 4 {
                return Err(KmsError::malformed_envelope(
                    provider,
                    &format!("key path '{}' is not a crypto key resource name", key_name),
                    error_codes::MALFORMED_ENVELOPE,
                ));
            }
            format!(
                "{}{}{}{}",
                CLOUD_A_ENVELOPE_TAG,
                base64::encode(short.as_bytes()),
                CLOUD_A_SEPARATOR,
                base64::encode(ciphertext)
            )
        }
        EnvelopePayload::Transit { ciphertext } => {
            if !ciphertext.starts_with(TRANSIT_ENVELOPE_PREFIX) {
                return Err(KmsError::malformed_envelope(
                    provider,
                    "secrets engine ciphertext must start with 'vault:'",
                    error_codes::MALFORMED_ENVELOPE,
                ));
            }
            ciphertext.clone()
        }
        EnvelopePayload::CloudB { ciphertext } => base64::encode(ciphertext),
    };

    Ok(WrappedKeyEnvelope(encoded))
}

/// Parse an envelope for the provider resolved from the slot's key identifier
///
/// # Errors
///
/// Returns `MalformedEnvelopeError` if the envelope does not carry the tag
/// pattern `kind` requires, or its encoded parts do not parse.
pub fn decode_envelope(
    kind: ProviderKind,
    envelope: &WrappedKeyEnvelope,
) -> KmsResult<EnvelopePayload> {
    let provider = kind.name();
    let detected = envelope.detect_kind();
    if detected != kind {
        return Err(KmsError::malformed_envelope(
            provider,
            &format!("envelope is tagged for {}", detected),
            error_codes::ENVELOPE_PROVIDER_MISMATCH,
        ));
    }

    let raw = envelope.as_str();
    match kind {
        ProviderKind::InsecureTest => Ok(EnvelopePayload::InsecureTest {
            suffix: raw[INSECURE_ENVELOPE_PREFIX.len()..].to_string(),
        }),
        ProviderKind::CloudA => {
            let body = &raw[CLOUD_A_ENVELOPE_TAG.len()..];
            let (encoded_path, encoded_ciphertext) =
                body.split_once(CLOUD_A_SEPARATOR).ok_or_else(|| {
                    KmsError::malformed_envelope(
                        provider,
                        "missing ciphertext separator",
                        error_codes::MALFORMED_ENVELOPE,
                    )
                })?;
            let path_bytes = decode_base64(provider, "key path", encoded_path)?;
            let short = String::from_utf8(path_bytes).map_err(|_| {
                KmsError::malformed_envelope(
                    provider,
                    "key path is not UTF-8",
                    error_codes::MALFORMED_ENVELOPE,
                )
            })?;
            Ok(EnvelopePayload::CloudA {
                key_name: expand_key_path(&short)?,
                ciphertext: decode_base64(provider, "ciphertext", encoded_ciphertext)?,
            })
        }
        ProviderKind::Transit => Ok(EnvelopePayload::Transit {
            ciphertext: raw.to_string(),
        }),
        ProviderKind::CloudB => Ok(EnvelopePayload::CloudB {
            ciphertext: decode_base64(provider, "ciphertext", raw)?,
        }),
    }
}

/// Keep every odd-indexed segment of a Cloud-A resource name.
///
/// `projects/P/locations/L/keyRings/R/cryptoKeys/K/cryptoKeyVersions/V`
/// becomes `P/L/R/K/V`.
pub fn shorten_key_path(path: &str) -> String {
    path.split('/')
        .skip(1)
        .step_by(2)
        .collect::<Vec<_>>()
        .join("/")
}

/// Reinsert the resource labels into a shortened Cloud-A path.
///
/// The key version segment, when present, is dropped so decryption always
/// targets the base key and follows provider-side rotation.
pub fn expand_key_path(short: &str) -> KmsResult<String> {
    let segments: Vec<&str> = short.split('/').collect();
    if segments.len() < 4 || segments.len() > 5 || segments.iter().any(|s| s.is_empty()) {
        return Err(KmsError::malformed_envelope(
            ProviderKind::CloudA.name(),
            &format!("'{}' is not a shortened crypto key path", short),
            error_codes::MALFORMED_ENVELOPE,
        ));
    }

    Ok(CLOUD_A_PATH_LABELS[..4]
        .iter()
        .zip(&segments[..4])
        .map(|(label, value)| format!("{}/{}", label, value))
        .collect::<Vec<_>>()
        .join("/"))
}

fn decode_base64(provider: &str, part: &str, encoded: &str) -> KmsResult<Vec<u8>> {
    if encoded.is_empty() {
        return Err(KmsError::malformed_envelope(
            provider,
            &format!("empty {}", part),
            error_codes::MALFORMED_ENVELOPE,
        ));
    }
    base64::decode(encoded).map_err(|e| {
        KmsError::malformed_envelope(
            provider,
            &format!("{} is not valid base64: {}", part, e),
            error_codes::INVALID_BASE64,
        )
    })
}
