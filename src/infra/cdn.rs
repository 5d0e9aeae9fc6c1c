//! Edge cache purge client.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::config::CdnSettings;

use super::error::InfraError;

const SOURCE: &str = "infra::cdn";

#[derive(Debug, Serialize)]
struct PurgeRequest<'a> {
    urls: &'a [String],
}

#[derive(Clone, Debug)]
pub struct CdnPurger {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl CdnPurger {
    pub fn new(settings: &CdnSettings, timeout: Duration) -> Result<Self, InfraError> {
        let endpoint = settings
            .purge_url
            .clone()
            .ok_or_else(|| InfraError::configuration("cdn.purge_url is not set"))?;
        let client = Client::builder()
            .user_agent(concat!("storefront/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http(err.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            token: settings.token.clone(),
        })
    }

    /// Ask the CDN to drop its copies of `urls`. An empty list is a no-op.
    pub async fn purge(&self, urls: &[String]) -> Result<(), InfraError> {
        if urls.is_empty() {
            return Ok(());
        }

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&PurgeRequest { urls });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| InfraError::http(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InfraError::http(format!(
                "purge rejected with status {status}: {body}"
            )));
        }

        info!(target = SOURCE, count = urls.len(), "cdn purge accepted");
        Ok(())
    }
}
