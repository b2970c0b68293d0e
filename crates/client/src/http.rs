use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use clearfetch_core::{ClearanceToken, HarvestError, CLEARANCE_COOKIE};

/// Raw page response, before blocked classification.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
    pub final_url: Url,
}

/// Issues one credentialed page request. Separated from the orchestrator so
/// runs can be scripted in tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, token: &ClearanceToken) -> Result<PageResponse, HarvestError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    referer: String,
    locale: String,
}

impl HttpFetcher {
    pub fn new(referer: String, locale: String, timeout_seconds: u64) -> Result<Self, HarvestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| HarvestError::Network(e.to_string()))?;

        Ok(Self {
            client,
            referer,
            locale,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, token: &ClearanceToken) -> Result<PageResponse, HarvestError> {
        debug!(url = %url, "fetching page");

        let resp = self
            .client
            .get(url.as_str())
            // The issuing service binds the credential to this exact
            // identity; the two are replayed together or not at all.
            .header(reqwest::header::USER_AGENT, token.client_identity.as_str())
            .header(reqwest::header::ACCEPT_LANGUAGE, self.locale.as_str())
            .header(reqwest::header::REFERER, self.referer.as_str())
            .header(
                reqwest::header::COOKIE,
                format!("{}={}", CLEARANCE_COOKIE, token.value),
            )
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "fetch failed");
                HarvestError::Network(e.to_string())
            })?;

        let status = resp.status().as_u16();
        let final_url = Url::parse(resp.url().as_str()).unwrap_or_else(|_| url.clone());

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| HarvestError::Network(e.to_string()))?;
        // Decode as UTF-8 regardless of the declared charset.
        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(PageResponse {
            status,
            body,
            final_url,
        })
    }
}
