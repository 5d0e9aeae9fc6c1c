//! Renderable block tree.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document fields that hold top-level block lists, in lookup order.
pub const BLOCK_LIST_FIELDS: [&str; 3] = ["tree", "components", "blocks"];

/// Editor-only prop stripped during normalization.
const EDITOR_META_PROP: &str = "__editorMeta";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Renderer key. Untyped nodes are structural wrappers around their children.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default)]
    pub children: Vec<BlockNode>,
}

impl BlockNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: Some(kind.into()),
            props: Map::new(),
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// A node without a type that only groups its children.
    pub fn wrapper() -> Self {
        Self {
            id: None,
            kind: None,
            props: Map::new(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: BlockNode) -> Self {
        self.children.push(child);
        self
    }

    /// Lenient conversion from an arbitrary JSON node.
    ///
    /// Keeps only `id`, `type` (or `component`), `props` and `children`; drops
    /// editor-only props. Untyped nodes are kept with their subtree; only values
    /// that are not JSON objects yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let node = value.as_object()?;
        let kind = node
            .get("type")
            .or_else(|| node.get("component"))
            .and_then(Value::as_str)
            .filter(|kind| !kind.is_empty())
            .map(str::to_string);

        let id = match node.get("id") {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };

        let props = node
            .get("props")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .filter(|(key, _)| key.as_str() != EDITOR_META_PROP)
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let children = match node.get("children") {
            Some(Value::Array(children)) => children.iter().filter_map(Self::from_value).collect(),
            Some(child @ Value::Object(_)) => Self::from_value(child).into_iter().collect(),
            _ => Vec::new(),
        };

        Some(Self {
            id,
            kind,
            props,
            children,
        })
    }

    /// Depth-first, pre-order visit of this node and its descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a BlockNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// Key used for block-level caching: the node id, or its type when unnamed.
    /// Anonymous wrappers have none and are never cached on their own.
    pub fn cache_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.kind.as_deref())
    }
}

/// Top-level blocks of a document, taken from the first block list field present.
pub fn blocks_of(document: &Value) -> Vec<BlockNode> {
    BLOCK_LIST_FIELDS
        .iter()
        .find_map(|field| document.get(*field).and_then(Value::as_array))
        .map(|items| items.iter().filter_map(BlockNode::from_value).collect())
        .unwrap_or_default()
}

/// Distinct block types referenced anywhere in the document.
pub fn collect_types(document: &Value) -> BTreeSet<String> {
    let mut kinds = BTreeSet::new();
    for field in BLOCK_LIST_FIELDS {
        let Some(items) = document.get(field).and_then(Value::as_array) else {
            continue;
        };
        for node in items.iter().filter_map(BlockNode::from_value) {
            node.walk(&mut |node| {
                if let Some(kind) = node.kind() {
                    kinds.insert(kind.to_string());
                }
            });
        }
    }
    kinds
}
