//! CMS records consumed by the resolver.
//!
//! All records are owned by the CMS and read-only here. Unknown fields are kept in
//! `extra` so cached bundles and product listings round-trip without loss.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub slug: String,
    /// Default template identifier.
    #[serde(default, deserialize_with = "opt_id_string")]
    pub template: Option<String>,
    /// Explicit template identifier that wins over `template`.
    #[serde(default, deserialize_with = "opt_id_string")]
    pub template_version: Option<String>,
    #[serde(default)]
    pub template_overrides: Option<Value>,
    #[serde(default)]
    pub theme_tokens: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TenantRecord {
    pub fn new(id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            template: None,
            template_version: None,
            template_overrides: None,
            theme_tokens: None,
            extra: Map::new(),
        }
    }

    /// Template used when neither the product nor the page pins one.
    pub fn effective_template_id(&self) -> Option<&str> {
        non_empty(self.template_version.as_deref()).or(non_empty(self.template.as_deref()))
    }

    /// Tenant-level override layer for the merge: explicit template overrides first,
    /// theme tokens otherwise.
    pub fn overrides(&self) -> Option<&Value> {
        self.template_overrides
            .as_ref()
            .filter(|value| !value.is_null())
            .or_else(|| self.theme_tokens.as_ref().filter(|value| !value.is_null()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    #[serde(default, deserialize_with = "opt_id_string")]
    pub id: Option<String>,
    pub slug: String,
    /// Raw editor document. Untrusted until sanitized.
    #[serde(default)]
    pub puck_data: Option<Value>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub template_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    #[serde(default, deserialize_with = "opt_id_string")]
    pub id: Option<String>,
    pub slug: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub template_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Resolve the template identifier by precedence: product, page, then tenant.
pub fn effective_template_id<'a>(
    product: Option<&'a ProductRecord>,
    page: Option<&'a PageRecord>,
    tenant: &'a TenantRecord,
) -> Option<&'a str> {
    non_empty(product.and_then(|product| product.template_version.as_deref()))
        .or_else(|| non_empty(page.and_then(|page| page.template_version.as_deref())))
        .or_else(|| tenant.effective_template_id())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

/// CMS identifiers arrive as strings or numbers depending on the database adapter.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number identifier, got {other}"
        ))),
    }
}

fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(Value::Number(value)) => Ok(Some(value.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number identifier, got {other}"
        ))),
    }
}
