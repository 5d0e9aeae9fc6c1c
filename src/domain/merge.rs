//! Layered document merge: template, then tenant overrides, then page overrides.
//!
//! Later layers win for scalars and objects (recursive merge). Arrays follow the
//! overriding array's shape:
//!
//! - first element carries an `id`: merge by identity, existing ids keep their base
//!   position, new ids are appended in override order;
//! - otherwise the overriding array replaces the base array;
//! - an empty overriding array leaves the base array untouched.

use std::collections::HashMap;

use serde_json::{Map, Value, json};

/// Top-level template sections guaranteed to exist after normalization.
const TEMPLATE_SECTIONS: [(&str, SectionDefault); 6] = [
    ("name", SectionDefault::Text("unnamed")),
    ("version", SectionDefault::Text("0.0.0")),
    ("tokens", SectionDefault::Object),
    ("layout", SectionDefault::Object),
    ("defaults", SectionDefault::Object),
    ("metadata", SectionDefault::Object),
];

#[derive(Clone, Copy)]
enum SectionDefault {
    Text(&'static str),
    Object,
}

impl SectionDefault {
    fn value(self) -> Value {
        match self {
            SectionDefault::Text(text) => Value::String(text.to_string()),
            SectionDefault::Object => json!({}),
        }
    }
}

/// How an overriding value participates in the merge.
enum Shape<'a> {
    Scalar(&'a Value),
    Object(&'a Map<String, Value>),
    IdentityArray(&'a [Value]),
    PlainArray(&'a [Value]),
}

fn shape(value: &Value) -> Shape<'_> {
    match value {
        Value::Object(map) => Shape::Object(map),
        Value::Array(items) => match items.first() {
            Some(first) if identity(first).is_some() => Shape::IdentityArray(items),
            _ => Shape::PlainArray(items),
        },
        scalar => Shape::Scalar(scalar),
    }
}

/// Identity of an array element, stringified so `1` and `"1"` collide.
fn identity(value: &Value) -> Option<String> {
    match value.as_object()?.get("id")? {
        Value::Null => None,
        Value::String(id) => Some(id.clone()),
        other => Some(other.to_string()),
    }
}

/// Fill in missing or null top-level template sections. Idempotent.
pub fn normalize_template(template: &Value) -> Value {
    let mut sections = match template {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for (key, default) in TEMPLATE_SECTIONS {
        match sections.get(key) {
            Some(value) if !value.is_null() => {}
            _ => {
                sections.insert(key.to_string(), default.value());
            }
        }
    }
    Value::Object(sections)
}

/// Merge the three layers into a fresh document. Inputs are never mutated.
///
/// Layers that are not JSON objects (absent content is passed as `null`) contribute
/// nothing.
pub fn merge(template: &Value, tenant_overrides: &Value, page_overrides: &Value) -> Value {
    let mut merged = normalize_template(template);
    for layer in [tenant_overrides, page_overrides] {
        if layer.is_object() {
            deep_merge(&mut merged, layer);
        }
    }
    merged
}

fn deep_merge(base: &mut Value, overlay: &Value) {
    match shape(overlay) {
        Shape::Scalar(value) => *base = value.clone(),
        Shape::Object(fields) => match base {
            Value::Object(existing) => {
                for (key, value) in fields {
                    match existing.get_mut(key) {
                        Some(slot) => deep_merge(slot, value),
                        None => {
                            existing.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
            _ => *base = overlay.clone(),
        },
        Shape::PlainArray(items) => match base {
            Value::Array(_) if items.is_empty() => {}
            _ => *base = overlay.clone(),
        },
        Shape::IdentityArray(items) => match base {
            Value::Array(existing) => merge_by_identity(existing, items),
            _ => *base = overlay.clone(),
        },
    }
}

/// Rebuild an identity array from the id index: base entries in first-seen order
/// (a repeated base id keeps the later entry), then override entries merged into
/// their match or appended. Elements without an id cannot be reconciled and are
/// dropped from both sides.
fn merge_by_identity(base: &mut Vec<Value>, overlay: &[Value]) {
    let mut merged: Vec<Value> = Vec::with_capacity(base.len() + overlay.len());
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(base.len());

    for item in base.drain(..) {
        let Some(id) = identity(&item) else { continue };
        match positions.get(&id) {
            Some(&position) => merged[position] = item,
            None => {
                positions.insert(id, merged.len());
                merged.push(item);
            }
        }
    }

    for item in overlay {
        let Some(id) = identity(item) else { continue };
        match positions.get(&id) {
            Some(&position) => deep_merge(&mut merged[position], item),
            None => {
                positions.insert(id, merged.len());
                merged.push(item.clone());
            }
        }
    }

    *base = merged;
}
