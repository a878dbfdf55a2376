//! Checksums for stored chart specs

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::spec::ChartSpec;

/// SHA-256 hex digest of a spec's canonical serialization
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn of_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from a JSON value
    ///
    /// Object keys serialize in sorted order, so equal trees hash equally regardless of
    /// how they were built.
    pub fn of_value(value: &serde_json::Value) -> Self {
        let canonical = serde_json::to_string(value).unwrap_or_default();
        Self::of_bytes(canonical.as_bytes())
    }

    /// Checksum of a spec
    pub fn of_spec(spec: &ChartSpec) -> Self {
        Self::of_value(&spec.to_value())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that `spec` matches this checksum
    pub fn verify_spec(&self, spec: &ChartSpec) -> bool {
        *self == Self::of_spec(spec)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Self(s)
    }
}
