//! Strict rendering of a block tree to HTML.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, try_join_all};
use serde_json::Value;

use crate::{
    application::registry::{RegistryError, RendererRegistry},
    cache::BlockCache,
    domain::{
        block::{BlockNode, blocks_of},
        fingerprint::PageFingerprint,
    },
};

/// Render nodes in order, resolving each renderer at the moment its node renders.
///
/// Fails on the first block type without a usable renderer. Untyped wrappers render
/// their children only.
pub async fn render_tree(
    registry: &RendererRegistry,
    nodes: &[BlockNode],
) -> Result<String, RegistryError> {
    let rendered = try_join_all(nodes.iter().map(|node| render_node(registry, node))).await?;
    Ok(rendered.concat())
}

fn render_node<'a>(
    registry: &'a RendererRegistry,
    node: &'a BlockNode,
) -> BoxFuture<'a, Result<String, RegistryError>> {
    async move {
        let Some(kind) = node.kind() else {
            return render_tree(registry, &node.children).await;
        };
        let renderer = registry.require(kind).await?;
        let children = render_tree(registry, &node.children).await?;
        Ok(renderer.render(node, &children))
    }
    .boxed()
}

/// Renders merged documents, reusing cached top-level block fragments for the same
/// page fingerprint.
pub struct PageRenderer {
    registry: Arc<RendererRegistry>,
    blocks: Option<BlockCache>,
}

impl PageRenderer {
    pub fn new(registry: Arc<RendererRegistry>) -> Self {
        Self {
            registry,
            blocks: None,
        }
    }

    pub fn with_block_cache(mut self, cache: BlockCache) -> Self {
        self.blocks = Some(cache);
        self
    }

    pub async fn render(
        &self,
        tenant_slug: &str,
        fingerprint: &PageFingerprint,
        merged: &Value,
    ) -> Result<String, RegistryError> {
        let mut html = String::new();
        for node in blocks_of(merged) {
            let fragment = match (&self.blocks, node.cache_id()) {
                (Some(cache), Some(block_id)) => {
                    match cache.get(tenant_slug, fingerprint, block_id).await {
                        Some(cached) => cached,
                        None => {
                            let fresh = render_node(&self.registry, &node).await?;
                            cache.set(tenant_slug, fingerprint, block_id, &fresh).await;
                            fresh
                        }
                    }
                }
                _ => render_node(&self.registry, &node).await?,
            };
            html.push_str(&fragment);
        }
        Ok(html)
    }
}
