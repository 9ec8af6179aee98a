//! Perspective API transport
//!
//! The only component that talks to the network. One HTTP round trip per
//! call, no retries; non-2xx statuses surface as `TransportFailure` carrying
//! the status code and response body.

use std::time::Duration;

use async_trait::async_trait;
use persp_common::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Response;

const USER_AGENT: &str = concat!("persp-ctl/", env!("CARGO_PKG_VERSION"));

/// Operations the lifecycle needs from the perspective API
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a new perspective; returns the confirmation text
    async fn create(&self, body: Vec<u8>) -> Result<String>;

    /// GET the perspective document for `id`
    async fn fetch(&self, id: &str) -> Result<Vec<u8>>;

    /// PUT a full replacement document for `id`
    async fn replace(&self, id: &str, body: Vec<u8>) -> Result<()>;

    /// DELETE the perspective `id`
    async fn remove(&self, id: &str) -> Result<()>;
}

/// `reqwest`-backed transport authenticating with an `api_key` query parameter
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, id)
    }

    /// Map non-2xx responses to `TransportFailure`
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(status = status.as_u16(), error = %e, "Failed to read error response body");
                format!("<unreadable response body: {}>", e)
            }
        };
        tracing::warn!(status = status.as_u16(), "Perspective API returned error status");
        Err(Error::TransportFailure {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn create(&self, body: Vec<u8>) -> Result<String> {
        tracing::debug!(url = %self.base_url, bytes = body.len(), "POST perspective");

        let response = self
            .http_client
            .post(&self.base_url)
            .query(&[("api_key", &self.api_key)])
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Self::check(response)
            .await?
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>> {
        let url = self.item_url(id);
        tracing::debug!(url = %url, "GET perspective");

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", &self.api_key)])
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let bytes = Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn replace(&self, id: &str, body: Vec<u8>) -> Result<()> {
        let url = self.item_url(id);
        tracing::debug!(url = %url, bytes = body.len(), "PUT perspective");

        let response = self
            .http_client
            .put(&url)
            .query(&[("api_key", &self.api_key)])
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let text = Self::check(response)
            .await?
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        tracing::debug!(response = %text, "Response to PUT");
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let url = self.item_url(id);
        tracing::debug!(url = %url, "DELETE perspective");

        let response = self
            .http_client
            .delete(&url)
            .query(&[("api_key", &self.api_key)])
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }
}
