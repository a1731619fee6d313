#![no_main]

use arbitrary::Arbitrary;
use kms_envelope::envelope::{expand_key_path, shorten_key_path};
use kms_envelope::{decode_envelope, encode_envelope, ProviderKind, WrappedKeyEnvelope};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct EnvelopeFuzzInput {
    envelope: String,
    key_path: String,
}

fuzz_target!(|input: EnvelopeFuzzInput| {
    let envelope = WrappedKeyEnvelope::new(input.envelope);

    // Decoding arbitrary stored strings must never panic
    for kind in [
        ProviderKind::InsecureTest,
        ProviderKind::CloudA,
        ProviderKind::Transit,
        ProviderKind::CloudB,
    ] {
        if let Ok(payload) = decode_envelope(kind, &envelope) {
            assert_eq!(payload.kind(), kind);
            // Whatever decodes must encode back to a string of the same kind
            if let Ok(encoded) = encode_envelope(&payload) {
                assert_eq!(encoded.detect_kind(), kind);
            }
        }
    }

    let short = shorten_key_path(&input.key_path);
    let _ = expand_key_path(&short);
});
