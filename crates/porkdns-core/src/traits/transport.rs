// # HTTP Transport Trait
//
// Defines the outbound HTTP capability shared by the IP monitor and the
// registrar records.
//
// ## Implementations
//
// - Token-bucket limited reqwest client: `porkdns-http` crate
// - Scripted doubles in each crate's tests
//
// ## Usage
//
// ```rust,ignore
// use porkdns_core::HttpTransport;
//
// async fn public_v4(transport: &dyn HttpTransport) -> porkdns_core::Result<String> {
//     transport.fetch_text("https://api.ipify.org").await
// }
// ```

use async_trait::async_trait;

/// A raw HTTP response, status and body left uninterpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl HttpResponse {
    /// Create a new response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for outbound HTTP transports
///
/// # Rate Limiting
///
/// Implementations may refuse a call with [`crate::Error::RateLimited`]
/// instead of waiting. They never queue: backoff belongs to the caller, which
/// knows whether the call is worth repeating.
///
/// # Thread Safety
///
/// Implementations must be usable from several tasks at once.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET `url` and return the body as text
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The response body
    /// - `Err(Error::RateLimited)`: No capacity right now
    /// - `Err(Error)`: Transport failure
    async fn fetch_text(&self, url: &str) -> Result<String, crate::Error>;

    /// POST `payload` as JSON to `url`
    ///
    /// The response is returned as-is; callers interpret status and body.
    async fn post_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<HttpResponse, crate::Error>;
}
