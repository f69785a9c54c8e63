//! Deterministic cache key derivation

use deepwave_core::normalize_query;
use serde::{Deserialize, Serialize};
use twox_hash::XxHash3_128;

/// Key under which a query's resolved sources are stored.
///
/// Derived from the normalized query text and the version salt, so queries
/// differing only in case or spacing collide, and bumping the salt makes every
/// previously written entry unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(query: &str, version_salt: &str) -> Self {
        let material = format!("{version_salt}\u{1f}{}", normalize_query(query));
        Self(format!(
            "q-{:032x}",
            XxHash3_128::oneshot(material.as_bytes())
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CacheKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}
