//! Instrumentation hook for provider calls.
//!
//! Every `generate_data_key` and `decrypt` call is bracketed by
//! [`KeyEventObserver::on_start`] and [`KeyEventObserver::on_finish`].
//! Observers see the key identifier and context only, never key material,
//! and cannot influence the call's result.

use chrono::Duration;

use crate::data_key::EncryptionContext;

/// Event name for data key generation
pub const GENERATE_DATA_KEY_EVENT: &str = "generate_data_key.kms_encrypted";

/// Event name for data key decryption
pub const DECRYPT_DATA_KEY_EVENT: &str = "decrypt_data_key.kms_encrypted";

/// A provider call being observed
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    pub name: &'static str,
    pub key_id: String,
    pub context: EncryptionContext,
}

impl KeyEvent {
    pub fn new(name: &'static str, key_id: &str, context: &EncryptionContext) -> Self {
        Self {
            name,
            key_id: key_id.to_string(),
            context: context.clone(),
        }
    }
}

/// How an observed call ended
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEventOutcome {
    pub success: bool,
    pub elapsed: Duration,
}

/// Receives provider call events for external instrumentation
pub trait KeyEventObserver: Send + Sync {
    fn on_start(&self, _event: &KeyEvent) {}

    fn on_finish(&self, _event: &KeyEvent, _outcome: &KeyEventOutcome) {}
}

/// Default observer: forwards events to the `log` facade at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl KeyEventObserver for LogObserver {
    fn on_start(&self, event: &KeyEvent) {
        log::debug!("{} started for key {}", event.name, event.key_id);
    }

    fn on_finish(&self, event: &KeyEvent, outcome: &KeyEventOutcome) {
        log::debug!(
            "{} for key {} finished in {}ms (success: {})",
            event.name,
            event.key_id,
            outcome.elapsed.num_milliseconds(),
            outcome.success
        );
    }
}
