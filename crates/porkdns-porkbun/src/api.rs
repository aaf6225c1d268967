//! Porkbun JSON API wire types and endpoint helpers
//!
//! Every call is a POST whose body carries the credential pair. Successful
//! calls answer 2xx with a call-specific body; failed calls answer non-2xx
//! with a `{status, message}` envelope.
//!
//! ## Endpoints
//!
//! ```http
//! POST {base}/dns/retrieveByNameType/{domain}/{TYPE}/{subdomain}
//! POST {base}/dns/editByNameType/{domain}/{TYPE}/{subdomain}
//! POST {base}/ping
//! ```
//!
//! An apex record (empty subdomain) drops the trailing `/{subdomain}`.

use porkdns_core::config::{Credentials, RecordConfig};
use porkdns_core::traits::{HttpResponse, HttpTransport};
use porkdns_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::debug;

/// Path of the retrieve-by-name-and-type call
pub const RETRIEVE_BY_NAME_TYPE: &str = "dns/retrieveByNameType";

/// Path of the edit-by-name-and-type call
pub const EDIT_BY_NAME_TYPE: &str = "dns/editByNameType";

/// Path of the credential check call
pub const PING: &str = "ping";

/// Body of `editByNameType`
#[derive(Debug, Serialize)]
pub struct EditPayload<'a> {
    #[serde(flatten)]
    pub credentials: &'a Credentials,
    pub content: IpAddr,
    pub ttl: u32,
}

/// Successful `retrieveByNameType` body
#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveResponse {
    pub status: String,
    #[serde(default)]
    pub cloudflare: Option<String>,
    pub records: Vec<RecordEntry>,
}

/// One DNS record as the registrar reports it
///
/// Porkbun sends every field as a string, and `prio`/`notes` may be null.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub record_type: Option<String>,
    pub content: String,
    #[serde(default)]
    pub ttl: Option<String>,
    #[serde(default)]
    pub prio: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Successful `ping` body
#[derive(Debug, Clone, Deserialize)]
pub struct PingResponse {
    pub status: String,
    #[serde(rename = "yourIp")]
    pub your_ip: IpAddr,
}

/// Body of every non-2xx answer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FailureEnvelope {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Build the URL of a per-record call
///
/// `action` is [`RETRIEVE_BY_NAME_TYPE`] or [`EDIT_BY_NAME_TYPE`].
pub fn record_url(api_base: &str, action: &str, record: &RecordConfig) -> String {
    let base = api_base.trim_end_matches('/');
    if record.subdomain.is_empty() {
        format!("{}/{}/{}/{}", base, action, record.domain, record.record_type)
    } else {
        format!(
            "{}/{}/{}/{}/{}",
            base, action, record.domain, record.record_type, record.subdomain
        )
    }
}

/// Turn a non-2xx response into an error
///
/// A body that is not a failure envelope is reported as `Error::Decode`, not
/// as an API error.
pub fn failure(response: &HttpResponse) -> Error {
    match serde_json::from_str::<FailureEnvelope>(&response.body) {
        Ok(envelope) => Error::api(response.status, envelope.message),
        Err(e) => Error::Decode(e),
    }
}

/// Check the credentials against the registrar
///
/// Returns the address the registrar saw the request come from.
pub async fn ping(
    transport: &dyn HttpTransport,
    api_base: &str,
    credentials: &Credentials,
) -> Result<IpAddr> {
    let url = format!("{}/{}", api_base.trim_end_matches('/'), PING);
    debug!("Pinging registrar at {}", url);

    let response = transport
        .post_json(&url, &serde_json::to_value(credentials)?)
        .await?;

    if !response.is_success() {
        return Err(failure(&response));
    }

    let pong: PingResponse = serde_json::from_str(&response.body)?;
    Ok(pong.your_ip)
}
