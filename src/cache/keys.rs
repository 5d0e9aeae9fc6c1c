//! Cache key formats.
//!
//! These strings are read by out-of-process tooling and must not change shape.

/// Whole-result cache entry for a resolved page.
pub fn merged_key(tenant_slug: &str, path: &str) -> String {
    format!("merged:{tenant_slug}:{path}")
}

/// Normalized template in the in-process and shared tiers.
pub fn template_key(template_id: &str) -> String {
    format!("template:compiled:{template_id}")
}

/// Pre-rendered block HTML, scoped by page fingerprint.
pub fn block_key(tenant_slug: &str, page_hash: &str, block_id: &str) -> String {
    format!("block:{tenant_slug}:{page_hash}:{block_id}")
}

/// Product listing refreshed by the background daemon.
pub fn products_key(tenant_slug: &str) -> String {
    format!("TENANT:{tenant_slug}:PRODUCTS")
}
