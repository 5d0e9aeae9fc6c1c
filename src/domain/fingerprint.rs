//! Page fingerprints for block-level caching.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

/// SHA-256 over `{templateVersion, merged, productId}`, hex encoded.
///
/// A pure function of its inputs: object keys serialize in sorted order and no clock
/// or random component is involved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageFingerprint(String);

impl PageFingerprint {
    pub fn compute(template_version: Option<&str>, merged: &Value, product_id: Option<&str>) -> Self {
        let canonical = json!({
            "templateVersion": template_version,
            "merged": merged,
            "productId": product_id,
        })
        .to_string();

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Self(hex::encode(hasher.finalize().to_vec()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
