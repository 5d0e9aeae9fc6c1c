//! Normalized template snapshots.
//!
//! A raw corpus record is normalized once into `{templateId, version, tokens, tree,
//! meta}` and cached verbatim at every tier afterwards.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::block::BlockNode;
use super::error::DomainError;

const UNKNOWN_TEMPLATE: &str = "unknown";
const UNVERSIONED: &str = "0.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSnapshot {
    pub template_id: String,
    pub version: String,
    pub tokens: Value,
    pub tree: Vec<BlockNode>,
    pub meta: Map<String, Value>,
}

impl TemplateSnapshot {
    /// Normalize a raw template record. Normalizing a normalized snapshot is a no-op.
    pub fn normalize(raw: &Value) -> Result<Self, DomainError> {
        let record = raw.as_object().ok_or_else(|| {
            DomainError::malformed("template record", "expected a JSON object")
        })?;

        let template_id = ["templateId", "slug", "name"]
            .iter()
            .find_map(|key| scalar_text(record.get(*key)))
            .unwrap_or_else(|| UNKNOWN_TEMPLATE.to_string());

        let version = ["version", "updatedAt"]
            .iter()
            .find_map(|key| scalar_text(record.get(*key)))
            .unwrap_or_else(|| UNVERSIONED.to_string());

        let tokens = ["tokens", "themeTokens"]
            .iter()
            .find_map(|key| record.get(*key).filter(|value| value.is_object()))
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let tree = match (record.get("components"), record.get("tree")) {
            (Some(Value::Array(nodes)), _) | (_, Some(Value::Array(nodes))) => {
                nodes.iter().filter_map(BlockNode::from_value).collect()
            }
            (_, Some(node @ Value::Object(_))) => BlockNode::from_value(node).into_iter().collect(),
            _ => Vec::new(),
        };

        let meta = record
            .get("meta")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            template_id,
            version,
            tokens,
            tree,
            meta,
        })
    }

    /// Decode a cached snapshot, normalizing it when the stored shape is raw.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DomainError> {
        if let Ok(snapshot) = serde_json::from_slice::<Self>(bytes) {
            return Ok(snapshot);
        }
        let raw: Value = serde_json::from_slice(bytes)
            .map_err(|err| DomainError::malformed("cached template", err.to_string()))?;
        Self::normalize(&raw)
    }

    /// Marker folded into page fingerprints.
    pub fn version_marker(&self) -> &str {
        &self.version
    }

    /// Raw corpus records match by `templateId`, `slug` or `name`.
    pub fn record_matches(record: &Value, template_id: &str) -> bool {
        ["templateId", "slug", "name"]
            .iter()
            .find_map(|key| scalar_text(record.get(*key)))
            .is_some_and(|candidate| candidate == template_id)
    }
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
