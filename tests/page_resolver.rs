mod support;

use std::sync::Arc;

use serde_json::{Value, json};
use storefront::application::origin::Origin;
use storefront::application::registry::{BlockRenderer, RendererRegistry};
use storefront::application::resolver::{PageResolver, ResolveError, ResolveOptions};
use storefront::cache::{CacheTier, LocalKvTier, get_json, keys::merged_key};
use storefront::domain::block::BlockNode;
use storefront::domain::entities::ProductRecord;

use support::{Calls, FakeOrigin, MapCorpus, modern_template, page, snapshot_store, tenant};

struct Harness {
    origin: Arc<FakeOrigin>,
    corpus: Arc<MapCorpus>,
    results: Arc<LocalKvTier>,
    registry: Arc<RendererRegistry>,
    resolver: PageResolver,
}

fn harness(origin: FakeOrigin, corpus: MapCorpus, registry: RendererRegistry) -> Harness {
    let origin = Arc::new(origin);
    let corpus = Arc::new(corpus);
    let registry = Arc::new(registry);
    let (snapshots, results) = snapshot_store(Arc::clone(&corpus));
    let resolver = PageResolver::new(
        Arc::clone(&origin) as Arc<dyn Origin>,
        snapshots,
        Arc::clone(&registry),
        Arc::clone(&results) as Arc<dyn CacheTier>,
    );
    Harness {
        origin,
        corpus,
        results,
        registry,
        resolver,
    }
}

fn acme_origin() -> FakeOrigin {
    FakeOrigin::default()
        .with_tenant(tenant("t1", "acme", Some("modern")))
        .with_page(
            "t1",
            page(
                "/",
                json!({
                    "tokens": { "color": { "accent": "#f00" } },
                    "tree": [
                        { "id": "hero", "props": { "title": "Spring sale" } },
                        { "id": "banner", "type": "Banner", "props": {} }
                    ]
                }),
            ),
        )
}

fn noop_renderer() -> impl BlockRenderer {
    |_: &BlockNode, _: &str| String::new()
}

#[tokio::test]
async fn resolves_and_merges_all_layers() {
    let mut origin = acme_origin();
    origin.tenants[0].theme_tokens = Some(json!({ "tokens": { "radius": 8 } }));
    let h = harness(
        origin,
        MapCorpus::default().with("modern", modern_template()),
        RendererRegistry::new(),
    );

    let resolved = h
        .resolver
        .resolve("t1", "/", ResolveOptions::default())
        .await
        .expect("resolve");

    assert!(!resolved.cache_hit);
    assert_eq!(resolved.tenant.slug, "acme");
    assert!(resolved.page.is_some());
    assert!(resolved.product.is_none());
    let snapshot = resolved.template_snapshot.as_ref().expect("template");
    assert_eq!(snapshot.version, "1.4.0");

    let merged = &resolved.merged;
    assert_eq!(merged["tokens"]["radius"], json!(8));
    assert_eq!(merged["tokens"]["color"], json!({ "primary": "#111", "accent": "#f00" }));

    let tree = merged["tree"].as_array().expect("tree");
    let ids: Vec<&str> = tree.iter().filter_map(|node| node["id"].as_str()).collect();
    assert_eq!(ids, ["hero", "grid", "banner"]);
    assert_eq!(tree[0]["props"], json!({ "title": "Spring sale", "align": "center" }));

    for section in ["name", "layout", "defaults", "metadata"] {
        assert!(merged.get(section).is_some(), "{section} defaulted");
    }
}

#[tokio::test]
async fn cached_result_short_circuits_every_fetch() {
    let h = harness(acme_origin(), MapCorpus::default(), RendererRegistry::new());

    let first = h
        .resolver
        .resolve("t1", "/", ResolveOptions::default())
        .await
        .expect("resolve");
    let page_calls = Calls::get(&h.origin.calls.page);
    let product_calls = Calls::get(&h.origin.calls.product);
    let template_calls = Calls::get(&h.origin.calls.template);
    let corpus_lookups = h.corpus.lookups();

    let second = h
        .resolver
        .resolve("t1", "/", ResolveOptions::default())
        .await
        .expect("resolve");

    assert!(second.cache_hit);
    assert_eq!(second.merged, first.merged);
    assert_eq!(second.fingerprint, first.fingerprint);
    assert_eq!(Calls::get(&h.origin.calls.page), page_calls);
    assert_eq!(Calls::get(&h.origin.calls.product), product_calls);
    assert_eq!(Calls::get(&h.origin.calls.template), template_calls);
    assert_eq!(h.corpus.lookups(), corpus_lookups);
    assert_eq!(Calls::get(&h.origin.calls.tenant), 2);
}

#[tokio::test]
async fn prepopulated_entry_is_served_without_page_or_product_lookups() {
    let h = harness(acme_origin(), MapCorpus::default(), RendererRegistry::new());
    let seeded = h
        .resolver
        .resolve("t1", "/promo", ResolveOptions {
            use_cache: false,
            preview: false,
        })
        .await
        .expect("resolve");
    assert!(
        !h.results.contains_key("merged:acme:/promo"),
        "uncached resolve must not write"
    );

    storefront::cache::set_json(&*h.results, &merged_key("acme", "/promo"), &seeded, None)
        .await
        .expect("seed");
    let before = (
        Calls::get(&h.origin.calls.page),
        Calls::get(&h.origin.calls.product),
    );

    let hit = h
        .resolver
        .resolve("t1", "/promo", ResolveOptions::default())
        .await
        .expect("resolve");

    assert!(hit.cache_hit);
    assert_eq!(
        (
            Calls::get(&h.origin.calls.page),
            Calls::get(&h.origin.calls.product)
        ),
        before
    );
}

#[tokio::test]
async fn preview_bypasses_the_result_cache() {
    let h = harness(acme_origin(), MapCorpus::default(), RendererRegistry::new());
    let options = ResolveOptions {
        use_cache: true,
        preview: true,
    };

    h.resolver.resolve("t1", "/", options).await.expect("resolve");
    let again = h.resolver.resolve("t1", "/", options).await.expect("resolve");

    assert!(!again.cache_hit);
    assert_eq!(Calls::get(&h.origin.calls.page), 2);
    assert!(!h.results.contains_key("merged:acme:/"));
}

#[tokio::test]
async fn unknown_tenant_is_fatal_but_missing_page_is_not() {
    let h = harness(acme_origin(), MapCorpus::default(), RendererRegistry::new());

    let err = h
        .resolver
        .resolve("unknown-tenant", "/", ResolveOptions::default())
        .await
        .expect_err("missing tenant");
    assert!(matches!(err, ResolveError::TenantNotFound(id) if id == "unknown-tenant"));

    let resolved = h
        .resolver
        .resolve("t1", "/does-not-exist", ResolveOptions::default())
        .await
        .expect("degraded result");
    assert!(resolved.page.is_none());
    assert!(resolved.product.is_none());
}

#[tokio::test]
async fn tenant_lookup_failure_is_distinct_from_not_found() {
    let mut origin = acme_origin();
    origin.fail_tenant_lookup = true;
    let h = harness(origin, MapCorpus::default(), RendererRegistry::new());

    let err = h
        .resolver
        .resolve("t1", "/", ResolveOptions::default())
        .await
        .expect_err("origin down");
    assert!(matches!(err, ResolveError::Origin { .. }));
}

#[tokio::test]
async fn poisoned_page_content_is_treated_as_absent() {
    let origin = FakeOrigin::default()
        .with_tenant(tenant("t1", "acme", Some("modern")))
        .with_page(
            "t1",
            page(
                "/",
                json!({ "tokens": { "color": "black" }, "__proto__": { "polluted": true } }),
            ),
        );
    let h = harness(
        origin,
        MapCorpus::default().with("modern", modern_template()),
        RendererRegistry::new(),
    );

    let resolved = h
        .resolver
        .resolve("t1", "/", ResolveOptions::default())
        .await
        .expect("resolve");

    assert!(resolved.page.is_some());
    assert_eq!(resolved.merged["tokens"]["color"], json!({ "primary": "#111" }));
    assert!(resolved.merged.get("__proto__").is_none());
}

#[tokio::test]
async fn string_encoded_page_content_is_decoded() {
    let encoded = Value::String(r#"{"tokens":{"radius":12}}"#.to_string());
    let origin = FakeOrigin::default()
        .with_tenant(tenant("t1", "acme", Some("modern")))
        .with_page("t1", page("/", encoded));
    let h = harness(
        origin,
        MapCorpus::default().with("modern", modern_template()),
        RendererRegistry::new(),
    );

    let resolved = h
        .resolver
        .resolve("t1", "/", ResolveOptions::default())
        .await
        .expect("resolve");
    assert_eq!(resolved.merged["tokens"]["radius"], json!(12));
}

#[tokio::test]
async fn product_template_takes_precedence_and_falls_back_to_origin() {
    let product: ProductRecord = serde_json::from_value(json!({
        "id": 77,
        "slug": "/lamp",
        "templateVersion": "product-detail"
    }))
    .expect("product");
    let origin = FakeOrigin::default()
        .with_tenant(tenant("t1", "acme", Some("modern")))
        .with_product("t1", product)
        .with_template(
            "product-detail",
            json!({ "slug": "product-detail", "version": "9", "components": [{ "type": "Gallery" }] }),
        );
    let h = harness(
        origin,
        MapCorpus::default().with("modern", modern_template()),
        RendererRegistry::new(),
    );

    let resolved = h
        .resolver
        .resolve("t1", "/lamp", ResolveOptions::default())
        .await
        .expect("resolve");

    let snapshot = resolved.template_snapshot.expect("template");
    assert_eq!(snapshot.template_id, "product-detail");
    assert_eq!(snapshot.version, "9");
    assert_eq!(Calls::get(&h.origin.calls.template), 1);
    assert_eq!(resolved.product.and_then(|product| product.id).as_deref(), Some("77"));
}

#[tokio::test]
async fn missing_template_degrades_to_empty_document() {
    let h = harness(
        FakeOrigin::default().with_tenant(tenant("t1", "acme", Some("retired"))),
        MapCorpus::default(),
        RendererRegistry::new(),
    );

    let resolved = h
        .resolver
        .resolve("t1", "/", ResolveOptions::default())
        .await
        .expect("resolve");

    assert!(resolved.template_snapshot.is_none());
    assert_eq!(
        resolved.merged,
        json!({
            "name": "unnamed",
            "version": "0.0.0",
            "tokens": {},
            "layout": {},
            "defaults": {},
            "metadata": {}
        })
    );
}

#[tokio::test]
async fn fingerprint_is_stable_and_input_sensitive() {
    let h = harness(
        acme_origin(),
        MapCorpus::default().with("modern", modern_template()),
        RendererRegistry::new(),
    );
    let uncached = ResolveOptions {
        use_cache: false,
        preview: false,
    };

    let first = h.resolver.resolve("t1", "/", uncached).await.expect("resolve");
    let second = h.resolver.resolve("t1", "/", uncached).await.expect("resolve");
    let other_path = h
        .resolver
        .resolve("t1", "/other", uncached)
        .await
        .expect("resolve");

    assert_eq!(first.fingerprint, second.fingerprint);
    assert_ne!(first.fingerprint, other_path.fingerprint);
}

#[tokio::test]
async fn renderers_for_used_blocks_are_preloaded() {
    let mut registry = RendererRegistry::new();
    registry
        .register_renderer("Hero", noop_renderer())
        .register_renderer("ProductCard", noop_renderer())
        .register_renderer("Footer", noop_renderer());
    let h = harness(
        acme_origin(),
        MapCorpus::default().with("modern", modern_template()),
        registry,
    );

    h.resolver
        .resolve("t1", "/", ResolveOptions::default())
        .await
        .expect("unregistered ProductGrid and Banner do not fail resolution");

    assert!(h.registry.is_loaded("Hero"));
    assert!(h.registry.is_loaded("ProductCard"));
    assert!(!h.registry.is_loaded("Footer"));
    assert!(!h.registry.is_loaded("Banner"));

    let cached: Option<serde_json::Value> = get_json(&*h.results, "merged:acme:/")
        .await
        .expect("read");
    let cached = cached.expect("result cached");
    assert!(cached.get("pageHash").is_some());
    assert!(cached.get("templateSnapshot").is_some());
}

#[tokio::test]
async fn renderers_under_untyped_wrappers_are_preloaded() {
    let origin = FakeOrigin::default()
        .with_tenant(tenant("t1", "acme", None))
        .with_page(
            "t1",
            page(
                "/",
                json!({
                    "tree": [{ "id": "wrap", "children": [{ "id": "cta", "type": "Banner" }] }]
                }),
            ),
        );
    let mut registry = RendererRegistry::new();
    registry.register_renderer("Banner", noop_renderer());
    let h = harness(origin, MapCorpus::default(), registry);

    let resolved = h
        .resolver
        .resolve("t1", "/", ResolveOptions::default())
        .await
        .expect("resolve");

    assert!(h.registry.is_loaded("Banner"));
    assert_eq!(resolved.merged["tree"][0]["children"][0]["type"], json!("Banner"));
}
