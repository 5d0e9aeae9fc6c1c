//! CMS REST client implementing [`Origin`].

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{
    application::origin::{Origin, OriginError},
    config::OriginSettings,
    domain::entities::{PageRecord, ProductRecord, TenantRecord},
};

const SOURCE: &str = "infra::http_origin";
const LISTING_LIMIT: &str = "500";

/// Paginated collection envelope returned by the CMS.
#[derive(Debug, Deserialize)]
struct Docs<T> {
    #[serde(default = "Vec::new")]
    docs: Vec<T>,
}

#[derive(Clone, Debug)]
pub struct HttpOrigin {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpOrigin {
    pub fn new(settings: &OriginSettings) -> Result<Self, OriginError> {
        let client = Client::builder()
            .user_agent(concat!("storefront/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .map_err(|err| OriginError::Configuration(err.to_string()))?;
        Ok(Self {
            client,
            base: settings.url.clone(),
            token: settings.token.clone(),
        })
    }

    /// `<base>/api/<segments...>` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, OriginError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| OriginError::Configuration(format!("`{}` cannot be a base URL", self.base)))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn tenant_lookup(&self, collection: &str, tenant_id: &str, slug: &str) -> Result<Url, OriginError> {
        let mut url = self.endpoint(&[collection])?;
        url.query_pairs_mut()
            .append_pair("where[tenant][equals]", tenant_id)
            .append_pair("where[slug][equals]", slug)
            .append_pair("limit", "1");
        Ok(url)
    }

    async fn send(&self, url: Url) -> Result<(String, Response), OriginError> {
        let resource = url.path().to_string();
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(OriginError::transport)?;
        Ok((resource, response))
    }

    /// `Ok(None)` only for 404; any other non-success status is an error so an
    /// outage is never mistaken for a missing record.
    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, OriginError> {
        let (resource, response) = self.send(url).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(target = SOURCE, resource, "origin lookup returned no record");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(OriginError::Status {
                resource,
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(OriginError::transport)?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|err| OriginError::decode(resource, err))
    }

    /// Non-success statuses are errors: an empty listing must not overwrite a cache.
    async fn get_listing<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, OriginError> {
        let (resource, response) = self.send(url).await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(OriginError::Status {
                resource,
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(OriginError::transport)?;
        let docs: Docs<T> =
            serde_json::from_slice(&body).map_err(|err| OriginError::decode(resource, err))?;
        Ok(docs.docs)
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch_tenant_by_id(&self, tenant_id: &str) -> Result<Option<TenantRecord>, OriginError> {
        let url = self.endpoint(&["tenants", tenant_id])?;
        self.get_optional(url).await
    }

    async fn fetch_page_by_slug(
        &self,
        tenant_id: &str,
        slug: &str,
    ) -> Result<Option<PageRecord>, OriginError> {
        let url = self.tenant_lookup("pages", tenant_id, slug)?;
        let docs: Option<Docs<PageRecord>> = self.get_optional(url).await?;
        Ok(docs.and_then(|docs| docs.docs.into_iter().next()))
    }

    async fn fetch_product_by_slug(
        &self,
        tenant_id: &str,
        slug: &str,
    ) -> Result<Option<ProductRecord>, OriginError> {
        let url = self.tenant_lookup("products", tenant_id, slug)?;
        let docs: Option<Docs<ProductRecord>> = self.get_optional(url).await?;
        Ok(docs.and_then(|docs| docs.docs.into_iter().next()))
    }

    async fn fetch_template_snapshot(
        &self,
        tenant_id: &str,
        template_id: &str,
    ) -> Result<Option<Value>, OriginError> {
        let url = self.endpoint(&["templates", tenant_id, template_id, "snapshot"])?;
        let body: Option<Value> = self.get_optional(url).await?;
        Ok(body.map(unwrap_snapshot).filter(|record| !record.is_null()))
    }

    async fn list_tenants(&self) -> Result<Vec<TenantRecord>, OriginError> {
        let mut url = self.endpoint(&["tenants"])?;
        url.query_pairs_mut().append_pair("limit", LISTING_LIMIT);
        self.get_listing(url).await
    }

    async fn list_products(&self, tenant_slug: &str) -> Result<Vec<Value>, OriginError> {
        let mut url = self.endpoint(&["products"])?;
        url.query_pairs_mut()
            .append_pair("where[tenant.slug][equals]", tenant_slug)
            .append_pair("limit", LISTING_LIMIT);
        self.get_listing(url).await
    }
}

/// The snapshot endpoint may wrap the record as `{ "snapshot": ... }`.
fn unwrap_snapshot(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.get("snapshot").is_some_and(|inner| !inner.is_null()) => {
            map.remove("snapshot").unwrap_or(Value::Null)
        }
        other => other,
    }
}
