/*!
 * Data Key Rotation
 *
 * Replaces a slot's data key while keeping the plaintext of every attribute
 * it protects:
 *
 * 1. resolve the current key and decrypt each bound attribute
 * 2. drop the cached key and clear the wrapped-key column
 * 3. generate a new key and re-encrypt each attribute under it
 * 4. save everything in one atomic write
 *
 * Until step 4 succeeds nothing has reached storage, so the old envelope
 * stays durable. If step 4 fails the instance already holds the new key and
 * re-encrypted attributes; discard it (reload) and rotate again rather than
 * retrying the save alone.
 */

use zeroize::Zeroizing;

use crate::cache::resolve;
use crate::error::{KmsError, KmsResult};
use crate::record::EncryptedAttributes;

/// Rotate the data key of `slot_name`
///
/// # Errors
///
/// * any error from resolving the old or new key
/// * errors from the attribute-encryption collaborator
/// * `PersistenceError` if the atomic save is rejected
pub fn rotate<R: EncryptedAttributes>(record: &mut R, slot_name: &str) -> KmsResult<()> {
    let registry = record.key_registry();
    let column = registry.lookup(slot_name)?.envelope_column().to_string();

    log::info!("Rotating data key for slot {}", slot_name);

    let bound: Vec<String> = record
        .attribute_bindings()
        .into_iter()
        .filter(|binding| binding.slot == slot_name)
        .map(|binding| binding.attribute)
        .collect();

    let old_key = resolve(record, slot_name)?;
    let mut plaintexts = Vec::with_capacity(bound.len());
    for attribute in bound {
        let value = record.decrypt_attribute(&attribute, &old_key)?;
        plaintexts.push((attribute, value.map(Zeroizing::new)));
    }
    drop(old_key);

    record.key_cache_mut().invalidate(slot_name);
    record.set_envelope(&column, None);

    let new_key = resolve(record, slot_name)?;
    for (attribute, value) in &plaintexts {
        record.encrypt_attribute(attribute, value.as_ref().map(|v| v.as_slice()), &new_key)?;
    }

    record.save_atomically().map_err(|e| {
        log::warn!("Rotation of slot {} was not saved: {}", slot_name, e);
        KmsError::persistence_error(slot_name, e)
    })?;

    log::info!(
        "Rotated data key for slot {} ({} attributes re-encrypted)",
        slot_name,
        plaintexts.len()
    );
    Ok(())
}

/// Rotation available on every record with encrypted attributes
pub trait KmsRotate: EncryptedAttributes {
    fn rotate_kms_key_for(&mut self, slot_name: &str) -> KmsResult<()> {
        rotate(self, slot_name)
    }
}

impl<R: EncryptedAttributes> KmsRotate for R {}

/// Generate named accessors for a record type's slots.
///
/// Each entry expands to a key accessor and a rotation method:
///
/// ```ignore
/// kms_key_accessors!(User {
///     "kms_key" => kms_key, rotate_kms_key;
///     "kms_key_phone" => kms_key_phone, rotate_kms_key_phone;
/// });
/// ```
#[macro_export]
macro_rules! kms_key_accessors {
    ($record:ty { $( $slot:expr => $accessor:ident, $rotate:ident );+ $(;)? }) => {
        impl $record {
            $(
                pub fn $accessor(&mut self) -> $crate::KmsResult<$crate::DataKey> {
                    $crate::cache::resolve(self, $slot)
                }

                pub fn $rotate(&mut self) -> $crate::KmsResult<()> {
                    $crate::rotation::rotate(self, $slot)
                }
            )+
        }
    };
}
