//! HTTP client seam.

use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};

/// A response whose body is read as a stream.
pub struct HttpResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Performs outbound GET requests.
pub trait HttpClient: Send + Sync {
    /// Start a download. `Err` means no response was received at all.
    fn get(&self, url: &str) -> Result<HttpResponse>;

    /// Lightweight request that only reports the status code.
    fn check(&self, url: &str) -> Result<u16> {
        self.get(url).map(|r| r.status)
    }
}

/// Blocking reqwest client.
///
/// Downloads only have a connect timeout since model weights can take many
/// minutes. Health checks use the full timeout.
pub struct ReqwestClient {
    downloads: reqwest::blocking::Client,
    control: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let user_agent = concat!("voicekit/", env!("CARGO_PKG_VERSION"));
        let downloads = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .timeout(None)
            .build()
            .context("failed to build HTTP client")?;
        let control = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(ReqwestClient { downloads, control })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self
            .downloads
            .get(url)
            .send()
            .with_context(|| format!("request to {} failed", url))?;
        Ok(HttpResponse {
            status: response.status().as_u16(),
            content_length: response.content_length(),
            body: Box::new(response),
        })
    }

    fn check(&self, url: &str) -> Result<u16> {
        let response = self
            .control
            .get(url)
            .send()
            .with_context(|| format!("request to {} failed", url))?;
        Ok(response.status().as_u16())
    }
}
