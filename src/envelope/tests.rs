use super::*;
use proptest::prelude::*;

const VERSION_PATH: &str =
    "projects/acme/locations/global/keyRings/billing/cryptoKeys/records/cryptoKeyVersions/3";
const BASE_PATH: &str = "projects/acme/locations/global/keyRings/billing/cryptoKeys/records";

#[test]
fn test_shorten_drops_labels() {
    assert_eq!(shorten_key_path(VERSION_PATH), "acme/global/billing/records/3");
    assert_eq!(shorten_key_path(BASE_PATH), "acme/global/billing/records");
}

#[test]
fn test_cloud_a_round_trip_targets_base_key() {
    let payload = EnvelopePayload::CloudA {
        key_name: VERSION_PATH.to_string(),
        ciphertext: vec![1, 2, 3, 4],
    };
    let envelope = encode_envelope(&payload).unwrap();
    assert!(envelope.as_str().starts_with("$gc$"));
    assert_eq!(envelope.detect_kind(), ProviderKind::CloudA);

    match decode_envelope(ProviderKind::CloudA, &envelope).unwrap() {
        EnvelopePayload::CloudA {
            key_name,
            ciphertext,
        } => {
            assert_eq!(key_name, BASE_PATH);
            assert_eq!(ciphertext, vec![1, 2, 3, 4]);
        }
        other => panic!("unexpected payload: {:?}", other),
    }
}

#[test]
fn test_cloud_a_wire_format() {
    let payload = EnvelopePayload::CloudA {
        key_name: BASE_PATH.to_string(),
        ciphertext: b"ct".to_vec(),
    };
    let envelope = encode_envelope(&payload).unwrap();
    let expected = format!(
        "$gc${}${}",
        base64::encode("acme/global/billing/records"),
        base64::encode("ct")
    );
    assert_eq!(envelope.as_str(), expected);
}

#[test]
fn test_cloud_a_rejects_short_paths() {
    let payload = EnvelopePayload::CloudA {
        key_name: "projects/acme".to_string(),
        ciphertext: vec![1],
    };
    assert!(matches!(
        encode_envelope(&payload),
        Err(KmsError::MalformedEnvelopeError { .. })
    ));

    let envelope = WrappedKeyEnvelope::new(format!(
        "$gc${}${}",
        base64::encode("acme/global"),
        base64::encode("ct")
    ));
    assert!(decode_envelope(ProviderKind::CloudA, &envelope).is_err());
}

#[test]
fn test_cloud_a_missing_separator() {
    let envelope = WrappedKeyEnvelope::new(format!("$gc${}", base64::encode("a/b/c/d")));
    let err = decode_envelope(ProviderKind::CloudA, &envelope).unwrap_err();
    assert_eq!(err.error_type(), "MalformedEnvelopeError");
}

#[test]
fn test_insecure_envelope() {
    let envelope = encode_envelope(&EnvelopePayload::InsecureTest {
        suffix: "123456".to_string(),
    })
    .unwrap();
    assert_eq!(envelope.as_str(), "insecure-data-key-123456");
    assert_eq!(envelope.detect_kind(), ProviderKind::InsecureTest);

    assert!(encode_envelope(&EnvelopePayload::InsecureTest {
        suffix: "12a".to_string()
    })
    .is_err());

    // Any suffix decodes
    let odd = WrappedKeyEnvelope::new("insecure-data-key-whatever");
    assert!(decode_envelope(ProviderKind::InsecureTest, &odd).is_ok());
}

#[test]
fn test_transit_envelope_is_verbatim() {
    let ciphertext = "vault:v1:c2VjcmV0".to_string();
    let envelope = encode_envelope(&EnvelopePayload::Transit {
        ciphertext: ciphertext.clone(),
    })
    .unwrap();
    assert_eq!(envelope.as_str(), ciphertext);
    assert_eq!(
        decode_envelope(ProviderKind::Transit, &envelope).unwrap(),
        EnvelopePayload::Transit { ciphertext }
    );

    assert!(encode_envelope(&EnvelopePayload::Transit {
        ciphertext: "v1:abc".to_string()
    })
    .is_err());
}

#[test]
fn test_cloud_b_is_bare_base64() {
    let envelope = encode_envelope(&EnvelopePayload::CloudB {
        ciphertext: vec![0xde, 0xad, 0xbe, 0xef],
    })
    .unwrap();
    assert_eq!(envelope.as_str(), "3q2+7w==");
    assert_eq!(envelope.detect_kind(), ProviderKind::CloudB);
}

#[test]
fn test_decode_rejects_foreign_tags() {
    let transit = WrappedKeyEnvelope::new("vault:v1:abc");
    let err = decode_envelope(ProviderKind::CloudB, &transit).unwrap_err();
    assert_eq!(err.error_code(), error_codes::ENVELOPE_PROVIDER_MISMATCH);

    let cloud_b = WrappedKeyEnvelope::new("3q2+7w==");
    assert!(decode_envelope(ProviderKind::CloudA, &cloud_b).is_err());
    assert!(decode_envelope(ProviderKind::Transit, &cloud_b).is_err());
    assert!(decode_envelope(ProviderKind::InsecureTest, &cloud_b).is_err());
}

#[test]
fn test_cloud_b_rejects_invalid_base64() {
    let envelope = WrappedKeyEnvelope::new("not base64!");
    let err = decode_envelope(ProviderKind::CloudB, &envelope).unwrap_err();
    assert_eq!(err.error_code(), error_codes::INVALID_BASE64);

    let empty = WrappedKeyEnvelope::new("");
    assert!(decode_envelope(ProviderKind::CloudB, &empty).is_err());
}

proptest! {
    #[test]
    fn cloud_a_decode_drops_version(
        project in "[a-z][a-z0-9-]{0,15}",
        location in "[a-z0-9-]{1,12}",
        ring in "[A-Za-z0-9_-]{1,12}",
        key in "[A-Za-z0-9_-]{1,12}",
        version in 1u32..1000,
        ciphertext in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        let base = format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            project, location, ring, key
        );
        let versioned = format!("{}/cryptoKeyVersions/{}", base, version);
        let envelope = encode_envelope(&EnvelopePayload::CloudA {
            key_name: versioned,
            ciphertext: ciphertext.clone(),
        }).unwrap();

        let decoded = decode_envelope(ProviderKind::CloudA, &envelope).unwrap();
        prop_assert_eq!(decoded, EnvelopePayload::CloudA { key_name: base, ciphertext });
    }

    #[test]
    fn cloud_b_envelope_never_looks_tagged(ciphertext in proptest::collection::vec(any::<u8>(), 1..64)) {
        let envelope = encode_envelope(&EnvelopePayload::CloudB { ciphertext: ciphertext.clone() }).unwrap();
        prop_assert_eq!(envelope.detect_kind(), ProviderKind::CloudB);
        prop_assert_eq!(
            decode_envelope(ProviderKind::CloudB, &envelope).unwrap(),
            EnvelopePayload::CloudB { ciphertext }
        );
    }
}
