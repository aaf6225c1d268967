// # Rate-Limited HTTP Client
//
// This crate provides the one outbound HTTP transport of the porkdns
// pipeline.
//
// ## Purpose
//
// Every request (discovery GETs, registrar POSTs) passes through a single
// token bucket shared by all callers:
// - Sustained rate: the configured requests per second
// - Burst: at most two requests back to back
// - No queueing: with no token available the call fails with
//   `Error::RateLimited` immediately, without touching the network
//
// ## Architecture
//
// ```text
// caller ──► RateLimitedClient ──try_take──► TokenBucket ◄──tick── refill task
//                   │
//                   └──► reqwest::Client (timeout) ──► network
// ```

pub mod bucket;

pub use bucket::{BUCKET_CAPACITY, TokenBucket};

use async_trait::async_trait;
use porkdns_core::config::ClientConfig;
use porkdns_core::traits::{HttpResponse, HttpTransport};
use porkdns_core::{Error, Result};
use tracing::debug;

/// User agent sent with every request
const USER_AGENT: &str = concat!("porkdns/", env!("CARGO_PKG_VERSION"));

/// Token-bucket limited reqwest client
///
/// Share one instance (behind an `Arc`) between every component that talks
/// to the network; separate instances have separate buckets.
#[derive(Debug)]
pub struct RateLimitedClient {
    /// HTTP client with the configured timeout
    client: reqwest::Client,

    /// Shared rate limit
    bucket: TokenBucket,
}

impl RateLimitedClient {
    /// Create a client from configuration
    ///
    /// Starts the bucket's refill task, so this must be called from within a
    /// Tokio runtime.
    ///
    /// # Errors
    ///
    /// - `Error::Config`: invalid rate or timeout
    /// - `Error::Http`: the underlying client could not be built
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            bucket: TokenBucket::new(config.refill_period()),
        })
    }

    /// Tokens currently available
    pub fn available_tokens(&self) -> usize {
        self.bucket.available()
    }

    fn take_token(&self, method: &str, url: &str) -> Result<()> {
        if self.bucket.try_take() {
            Ok(())
        } else {
            debug!("Rate limited: {} {}", method, url);
            Err(Error::RateLimited)
        }
    }
}

#[async_trait]
impl HttpTransport for RateLimitedClient {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.take_token("GET", url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http(format!("GET {} returned {}", url, status)));
        }

        response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response from {}: {}", url, e)))
    }

    async fn post_json(&self, url: &str, payload: &serde_json::Value) -> Result<HttpResponse> {
        self.take_token("POST", url)?;

        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::http(format!("POST {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response from {}: {}", url, e)))?;

        Ok(HttpResponse::new(status, body))
    }
}
