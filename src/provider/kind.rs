use std::fmt;

/// Key identifier of the insecure test provider
pub const INSECURE_TEST_KEY_ID: &str = "insecure-test-key";

/// Key identifier prefix selecting Cloud-A
pub const CLOUD_A_KEY_PREFIX: &str = "projects/";

/// Key identifier prefix selecting the secrets engine
pub const TRANSIT_KEY_PREFIX: &str = "vault/";

/// The fixed set of KMS provider variants.
///
/// Selection by key identifier is a stable public contract:
///
/// | Key identifier            | Variant        |
/// |---------------------------|----------------|
/// | `insecure-test-key`       | `InsecureTest` |
/// | starts with `projects/`   | `CloudA`       |
/// | starts with `vault/`      | `Transit`      |
/// | anything else             | `CloudB`       |
///
/// Matching is case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Never contacts a network; all-zero plaintext. Non-production only.
    InsecureTest,

    /// Resource-path addressed cloud KMS (`projects/...`)
    CloudA,

    /// Secrets-engine transit backend (`vault/<path>`)
    Transit,

    /// ARN/alias addressed cloud KMS; the default
    CloudB,
}

impl ProviderKind {
    /// Select the provider variant for a key identifier
    pub fn for_key_id(key_id: &str) -> Self {
        if key_id == INSECURE_TEST_KEY_ID {
            ProviderKind::InsecureTest
        } else if key_id.starts_with(CLOUD_A_KEY_PREFIX) {
            ProviderKind::CloudA
        } else if key_id.starts_with(TRANSIT_KEY_PREFIX) {
            ProviderKind::Transit
        } else {
            ProviderKind::CloudB
        }
    }

    /// Short stable name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::InsecureTest => "insecure-test",
            ProviderKind::CloudA => "cloud-a",
            ProviderKind::Transit => "transit",
            ProviderKind::CloudB => "cloud-b",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
