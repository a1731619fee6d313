/*!
 * Error Handling for the KMS Envelope Module
 *
 * Provides the error taxonomy for key slot configuration, provider calls,
 * envelope parsing and rotation writes, together with error codes,
 * user-friendly messages and suggested remediation.
 */

use std::collections::HashMap;
use thiserror::Error;

/// Boxed error returned by collaborators (KMS SDK clients, persistence layers)
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for all key lifecycle operations
#[derive(Debug, Error)]
pub enum KmsError {
    #[error("Configuration error: {operation} - {cause}")]
    ConfigurationError {
        operation: String,
        cause: String,
        error_code: u32,
    },

    #[error("Key slot not found: {slot}")]
    NotFoundError { slot: String, error_code: u32 },

    #[error("Missing key id for slot {slot}")]
    MissingKeyIdentifierError { slot: String, error_code: u32 },

    #[error("KMS provider error: {provider} {operation} - {cause}")]
    ProviderError {
        provider: String,
        operation: String,
        cause: String,
        error_code: u32,
        context: HashMap<String, String>,
    },

    #[error("Malformed envelope for {provider}: {cause}")]
    MalformedEnvelopeError {
        provider: String,
        cause: String,
        error_code: u32,
    },

    #[error("Persistence error: rotation of {slot} was not saved - {source}")]
    PersistenceError {
        slot: String,
        #[source]
        source: BoxedError,
        error_code: u32,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Random number generation failed: {cause}")]
    RandomGenerationError { cause: String, error_code: u32 },

    #[error("IO error: {0}")]
    IoError(String),
}

/// Error code constants for different error categories
pub mod error_codes {
    // Configuration errors: 1000-1999
    pub const DUPLICATE_SLOT: u32 = 1001;
    pub const INVALID_SLOT_NAME: u32 = 1002;
    pub const INVALID_CONFIGURATION: u32 = 1003;
    pub const SLOT_NOT_FOUND: u32 = 1004;
    pub const MISSING_KEY_ID: u32 = 1005;

    // Provider errors: 2000-2999
    pub const PROVIDER_GENERATE_FAILED: u32 = 2001;
    pub const PROVIDER_DECRYPT_FAILED: u32 = 2002;
    pub const PROVIDER_NOT_CONFIGURED: u32 = 2003;
    pub const INVALID_DATA_KEY: u32 = 2004;

    // Envelope errors: 3000-3999
    pub const MALFORMED_ENVELOPE: u32 = 3001;
    pub const ENVELOPE_PROVIDER_MISMATCH: u32 = 3002;
    pub const INVALID_BASE64: u32 = 3003;

    // Persistence errors: 4000-4999
    pub const ROTATION_WRITE_REJECTED: u32 = 4001;

    // Ambient errors: 9000-9999
    pub const SERIALIZATION_FAILED: u32 = 9001;
    pub const IO_FAILED: u32 = 9002;
    pub const RANDOM_GENERATION_FAILED: u32 = 9003;
}

impl KmsError {
    /// Get the numeric error code for this error
    pub fn error_code(&self) -> u32 {
        match self {
            KmsError::ConfigurationError { error_code, .. } => *error_code,
            KmsError::NotFoundError { error_code, .. } => *error_code,
            KmsError::MissingKeyIdentifierError { error_code, .. } => *error_code,
            KmsError::ProviderError { error_code, .. } => *error_code,
            KmsError::MalformedEnvelopeError { error_code, .. } => *error_code,
            KmsError::PersistenceError { error_code, .. } => *error_code,
            KmsError::RandomGenerationError { error_code, .. } => *error_code,
            KmsError::SerializationError(_) => error_codes::SERIALIZATION_FAILED,
            KmsError::IoError(_) => error_codes::IO_FAILED,
        }
    }

    /// Get a user-friendly error message
    pub fn user_friendly_message(&self) -> String {
        match self {
            KmsError::ConfigurationError { operation, .. } => {
                format!("Key slot configuration '{}' is invalid. Check the record type setup.", operation)
            }
            KmsError::NotFoundError { slot, .. } => {
                format!("No key slot named '{}' is registered for this record type.", slot)
            }
            KmsError::MissingKeyIdentifierError { slot, .. } => {
                format!("Key slot '{}' has no KMS key configured. Encrypted fields cannot be read or written.", slot)
            }
            KmsError::ProviderError { provider, operation, .. } => {
                format!("The {} key service failed during '{}'. Encrypted fields are unavailable.", provider, operation)
            }
            KmsError::MalformedEnvelopeError { provider, .. } => {
                format!("The stored data key is not a valid {} envelope. The record may be corrupted.", provider)
            }
            KmsError::PersistenceError { slot, .. } => {
                format!("Rotation of key '{}' could not be saved. Reload the record before retrying.", slot)
            }
            KmsError::SerializationError(_) => {
                "Data serialization failed. Data format may be corrupted.".to_string()
            }
            KmsError::RandomGenerationError { .. } => {
                "Random number generation failed. Data keys cannot be created safely.".to_string()
            }
            KmsError::IoError(_) => {
                "Input/output operation failed. Check file permissions and paths.".to_string()
            }
        }
    }

    /// Get technical details for debugging
    pub fn technical_details(&self) -> HashMap<String, String> {
        let mut details = HashMap::new();

        details.insert("error_code".to_string(), self.error_code().to_string());
        details.insert("error_type".to_string(), self.error_type().to_string());
        details.insert("timestamp".to_string(), chrono::Utc::now().to_rfc3339());

        match self {
            KmsError::ConfigurationError {
                operation, cause, ..
            } => {
                details.insert("operation".to_string(), operation.clone());
                details.insert("cause".to_string(), cause.clone());
            }
            KmsError::NotFoundError { slot, .. }
            | KmsError::MissingKeyIdentifierError { slot, .. } => {
                details.insert("slot".to_string(), slot.clone());
            }
            KmsError::ProviderError {
                provider,
                operation,
                cause,
                context,
                ..
            } => {
                details.insert("provider".to_string(), provider.clone());
                details.insert("operation".to_string(), operation.clone());
                details.insert("cause".to_string(), cause.clone());
                details.extend(context.clone());
            }
            KmsError::MalformedEnvelopeError {
                provider, cause, ..
            } => {
                details.insert("provider".to_string(), provider.clone());
                details.insert("cause".to_string(), cause.clone());
            }
            KmsError::PersistenceError { slot, source, .. } => {
                details.insert("slot".to_string(), slot.clone());
                details.insert("cause".to_string(), source.to_string());
            }
            _ => {
                details.insert("details".to_string(), format!("{:?}", self));
            }
        }

        details
    }

    /// Get suggested remediation steps
    pub fn suggested_remediation(&self) -> Option<String> {
        match self {
            KmsError::ConfigurationError { error_code, .. } => match *error_code {
                error_codes::DUPLICATE_SLOT => Some(
                    "Register each key slot once per record type; use a name or prefix to add more."
                        .to_string(),
                ),
                _ => Some("Check the key slot registration and configuration file.".to_string()),
            },
            KmsError::MissingKeyIdentifierError { .. } => Some(
                "Pass a key id when registering the slot or set the KMS_KEY_ID environment variable."
                    .to_string(),
            ),
            KmsError::ProviderError { error_code, .. } => match *error_code {
                error_codes::PROVIDER_NOT_CONFIGURED => Some(
                    "Register a backend client for this key id on the KmsClient builder."
                        .to_string(),
                ),
                _ => Some(
                    "Verify the key id, the encryption context and the provider's availability."
                        .to_string(),
                ),
            },
            KmsError::PersistenceError { .. } => Some(
                "Discard the in-memory record (reload it) and run the whole rotation again."
                    .to_string(),
            ),
            KmsError::RandomGenerationError { .. } => Some(
                "Check system entropy sources.".to_string(),
            ),
            _ => None,
        }
    }

    /// Get the error category/type as a string
    pub fn error_type(&self) -> &'static str {
        match self {
            KmsError::ConfigurationError { .. } => "ConfigurationError",
            KmsError::NotFoundError { .. } => "NotFoundError",
            KmsError::MissingKeyIdentifierError { .. } => "MissingKeyIdentifierError",
            KmsError::ProviderError { .. } => "ProviderError",
            KmsError::MalformedEnvelopeError { .. } => "MalformedEnvelopeError",
            KmsError::PersistenceError { .. } => "PersistenceError",
            KmsError::SerializationError(_) => "SerializationError",
            KmsError::RandomGenerationError { .. } => "RandomGenerationError",
            KmsError::IoError(_) => "IoError",
        }
    }
}

/// Convenience constructors for common error types
impl KmsError {
    pub fn configuration_error(operation: &str, cause: &str, error_code: u32) -> Self {
        KmsError::ConfigurationError {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn slot_not_found(slot: &str) -> Self {
        KmsError::NotFoundError {
            slot: slot.to_string(),
            error_code: error_codes::SLOT_NOT_FOUND,
        }
    }

    pub fn missing_key_identifier(slot: &str) -> Self {
        KmsError::MissingKeyIdentifierError {
            slot: slot.to_string(),
            error_code: error_codes::MISSING_KEY_ID,
        }
    }

    pub fn provider_error(
        provider: &str,
        operation: &str,
        cause: &str,
        key_id: &str,
        error_code: u32,
    ) -> Self {
        let mut context = HashMap::new();
        context.insert("key_id".to_string(), key_id.to_string());

        KmsError::ProviderError {
            provider: provider.to_string(),
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
            context,
        }
    }

    pub fn malformed_envelope(provider: &str, cause: &str, error_code: u32) -> Self {
        KmsError::MalformedEnvelopeError {
            provider: provider.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn persistence_error(slot: &str, source: BoxedError) -> Self {
        KmsError::PersistenceError {
            slot: slot.to_string(),
            source,
            error_code: error_codes::ROTATION_WRITE_REJECTED,
        }
    }

    pub fn random_generation_error(cause: &str) -> Self {
        KmsError::RandomGenerationError {
            cause: cause.to_string(),
            error_code: error_codes::RANDOM_GENERATION_FAILED,
        }
    }
}

// From implementations for automatic error conversion
impl From<std::io::Error> for KmsError {
    fn from(err: std::io::Error) -> Self {
        KmsError::IoError(format!("IO operation failed: {}", err))
    }
}

impl From<serde_json::Error> for KmsError {
    fn from(err: serde_json::Error) -> Self {
        KmsError::SerializationError(err.to_string())
    }
}

/// Result type alias for key lifecycle operations
pub type KmsResult<T> = Result<T, KmsError>;
