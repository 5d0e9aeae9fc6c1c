//! Block-type to renderer registry.
//!
//! Renderers are loaded lazily through a [`RendererLoader`] and memoized once
//! loaded. [`RendererRegistry::preload`] is tolerant and warms whatever it can;
//! [`RendererRegistry::require`] is strict and is only called when a node is about
//! to be rendered.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use thiserror::Error;
use tracing::debug;

use crate::domain::block::BlockNode;

const SOURCE: &str = "application::registry";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no renderer registered for block type `{0}`")]
    UnknownBlockType(String),
    #[error("renderer for block type `{kind}` failed to load: {reason}")]
    LoadFailed { kind: String, reason: String },
}

impl RegistryError {
    pub fn load_failed(kind: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::LoadFailed {
            kind: kind.into(),
            reason: reason.to_string(),
        }
    }
}

/// Turns one block and its already-rendered children into HTML.
pub trait BlockRenderer: Send + Sync {
    fn render(&self, node: &BlockNode, children_html: &str) -> String;
}

impl<F> BlockRenderer for F
where
    F: Fn(&BlockNode, &str) -> String + Send + Sync,
{
    fn render(&self, node: &BlockNode, children_html: &str) -> String {
        self(node, children_html)
    }
}

pub type RendererHandle = Arc<dyn BlockRenderer>;

#[async_trait]
pub trait RendererLoader: Send + Sync {
    async fn load(&self, kind: &str) -> Result<RendererHandle, RegistryError>;
}

/// Loader for a renderer that is available up front.
pub struct ReadyLoader(RendererHandle);

impl ReadyLoader {
    pub fn new(renderer: impl BlockRenderer + 'static) -> Self {
        Self(Arc::new(renderer))
    }
}

#[async_trait]
impl RendererLoader for ReadyLoader {
    async fn load(&self, _kind: &str) -> Result<RendererHandle, RegistryError> {
        Ok(Arc::clone(&self.0))
    }
}

#[derive(Default)]
pub struct RendererRegistry {
    loaders: HashMap<String, Arc<dyn RendererLoader>>,
    loaded: DashMap<String, RendererHandle>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        kind: impl Into<String>,
        loader: impl RendererLoader + 'static,
    ) -> &mut Self {
        let kind = kind.into();
        self.loaded.remove(&kind);
        self.loaders.insert(kind, Arc::new(loader));
        self
    }

    pub fn register_renderer(
        &mut self,
        kind: impl Into<String>,
        renderer: impl BlockRenderer + 'static,
    ) -> &mut Self {
        self.register(kind, ReadyLoader::new(renderer))
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.loaders.contains_key(kind)
    }

    pub fn is_loaded(&self, kind: &str) -> bool {
        self.loaded.contains_key(kind)
    }

    /// Load every given type in parallel and wait for all of them to settle.
    ///
    /// Unknown types and loader failures are discarded: a page may never render the
    /// block that failed. Returns how many types are loaded afterwards.
    pub async fn preload(&self, kinds: &BTreeSet<String>) -> usize {
        let outcomes = join_all(kinds.iter().map(|kind| self.require(kind))).await;

        let mut loaded = 0;
        for (kind, outcome) in kinds.iter().zip(outcomes) {
            match outcome {
                Ok(_) => loaded += 1,
                Err(err) => debug!(target = SOURCE, kind = %kind, error = %err, "preload skipped"),
            }
        }
        loaded
    }

    /// Strict lookup used at render time.
    pub async fn require(&self, kind: &str) -> Result<RendererHandle, RegistryError> {
        if let Some(handle) = self.loaded.get(kind) {
            return Ok(Arc::clone(handle.value()));
        }

        let loader = self
            .loaders
            .get(kind)
            .ok_or_else(|| RegistryError::UnknownBlockType(kind.to_string()))?;
        let handle = loader.load(kind).await?;
        self.loaded.insert(kind.to_string(), Arc::clone(&handle));
        Ok(handle)
    }
}
