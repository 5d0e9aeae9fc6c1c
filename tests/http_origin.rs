mod support;

use std::sync::Arc;
use std::time::Duration;

use storefront::application::error::AppError;
use storefront::application::origin::{Origin, OriginError};
use storefront::application::registry::RendererRegistry;
use storefront::application::resolver::{PageResolver, ResolveError, ResolveOptions};
use storefront::cache::CacheTier;
use storefront::config::OriginSettings;
use storefront::infra::http_origin::HttpOrigin;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use support::{MapCorpus, snapshot_store};

/// Serve every request on a loopback port with the same canned response.
async fn serve(status_line: &'static str, body: &'static str) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0_u8; 1024];
                while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(read) => request.extend_from_slice(&chunk[..read]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Url::parse(&format!("http://{addr}/")).expect("url")
}

fn origin(url: Url) -> HttpOrigin {
    HttpOrigin::new(&OriginSettings {
        url,
        token: Some("secret".into()),
        timeout: Duration::from_secs(5),
    })
    .expect("client")
}

fn resolver(origin: HttpOrigin) -> PageResolver {
    let (snapshots, results) = snapshot_store(Arc::new(MapCorpus::default()));
    PageResolver::new(
        Arc::new(origin) as Arc<dyn Origin>,
        snapshots,
        Arc::new(RendererRegistry::new()),
        results as Arc<dyn CacheTier>,
    )
}

#[tokio::test]
async fn origin_outage_is_not_reported_as_missing_tenant() {
    let base = serve("503 Service Unavailable", "").await;
    let origin = origin(base);

    let err = origin
        .fetch_tenant_by_id("t1")
        .await
        .expect_err("503 is an error");
    assert!(matches!(err, OriginError::Status { status: 503, .. }));

    let err = resolver(origin)
        .resolve("t1", "/", ResolveOptions::default())
        .await
        .expect_err("outage");
    assert!(matches!(err, ResolveError::Origin { ref tenant_id, .. } if tenant_id == "t1"));
    assert_eq!(AppError::from(err).exit_code(), 1);
}

#[tokio::test]
async fn unauthorized_lookups_are_errors() {
    let origin = origin(serve("401 Unauthorized", r#"{"errors":[]}"#).await);

    let err = origin
        .fetch_page_by_slug("t1", "/")
        .await
        .expect_err("401 is an error");
    assert!(matches!(err, OriginError::Status { status: 401, .. }));
}

#[tokio::test]
async fn not_found_is_an_absent_record() {
    let origin = origin(serve("404 Not Found", "").await);

    assert!(origin.fetch_tenant_by_id("t1").await.expect("lookup").is_none());
    assert!(
        origin
            .fetch_template_snapshot("t1", "modern")
            .await
            .expect("lookup")
            .is_none()
    );

    let err = resolver(origin)
        .resolve("t1", "/", ResolveOptions::default())
        .await
        .expect_err("missing tenant");
    assert!(matches!(err, ResolveError::TenantNotFound(id) if id == "t1"));
}

#[tokio::test]
async fn tenant_records_are_decoded() {
    let origin = origin(serve("200 OK", r#"{"id":7,"slug":"acme","template":"modern"}"#).await);

    let tenant = origin
        .fetch_tenant_by_id("7")
        .await
        .expect("lookup")
        .expect("tenant");
    assert_eq!(tenant.id, "7");
    assert_eq!(tenant.slug, "acme");
    assert_eq!(tenant.effective_template_id(), Some("modern"));
}

#[tokio::test]
async fn listings_fail_on_any_error_status() {
    let origin = origin(serve("404 Not Found", "").await);

    let err = origin.list_tenants().await.expect_err("listing");
    assert!(matches!(err, OriginError::Status { status: 404, .. }));
}
