//! Configuration for key slot registration.
//!
//! The only setting today is the fallback key identifier applied to slots
//! registered without one. It can come from the `KMS_KEY_ID` environment
//! variable or a JSON file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{error_codes, KmsError, KmsResult};

/// Environment variable holding the fallback key identifier
pub const KMS_KEY_ID_ENV: &str = "KMS_KEY_ID";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KmsConfig {
    /// Key identifier used when a slot is registered without one
    #[serde(default)]
    pub default_key_id: Option<String>,
}

impl KmsConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            default_key_id: lookup(KMS_KEY_ID_ENV).filter(|v| !v.trim().is_empty()),
        }
    }

    /// Parse configuration from a JSON document
    pub fn from_json_str(json: &str) -> KmsResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            KmsError::configuration_error(
                "parse_config",
                &e.to_string(),
                error_codes::INVALID_CONFIGURATION,
            )
        })?;
        Ok(config.normalized())
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> KmsResult<Self> {
        let path = path.as_ref();
        log::debug!("Loading KMS configuration from {}", path.display());
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// The key identifier a slot ends up with: its own, else the fallback
    pub fn resolve_key_id(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| self.default_key_id.clone())
    }

    fn normalized(mut self) -> Self {
        self.default_key_id = self.default_key_id.filter(|v| !v.trim().is_empty());
        self
    }
}
