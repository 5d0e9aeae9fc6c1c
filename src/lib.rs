//! Multi-tenant storefront page resolution.
//!
//! Resolves `(tenant, path)` to a renderable document by merging a shared template
//! snapshot with tenant and page overrides, caching templates across four tiers and
//! whole results in a shared key-value store. A background daemon keeps the shared
//! tier warm.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
