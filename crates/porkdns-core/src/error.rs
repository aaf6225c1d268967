//! Error types for the porkdns pipeline
//!
//! Every component reports failures through [`Error`]. The variants carry the
//! structured context callers match on (`domain`, `subdomain`, `record_type`,
//! `code`, `message`) rather than pre-rendered strings.

use crate::config::RecordType;
use crate::traits::AddressFamily;
use thiserror::Error;

/// Result type alias for porkdns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the porkdns pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// No rate-limit token was immediately available
    #[error("rate limit exceeded")]
    RateLimited,

    /// A bounded retry loop gave up after only seeing rate-limit failures
    #[error("retries exceeded after {attempts} attempt(s)")]
    RetriesExceeded {
        /// Number of attempts made
        attempts: usize,
    },

    /// The registrar holds no record for the managed endpoint
    #[error(
        "no record exists for the provided domain, subdomain, and type: {domain}, {subdomain}, {record_type}"
    )]
    NoRecord {
        domain: String,
        subdomain: String,
        record_type: RecordType,
    },

    /// The registrar holds more than one record for the managed endpoint
    #[error(
        "more than one record exists for the provided domain, subdomain, and type: {domain}, {subdomain}, {record_type}"
    )]
    AmbiguousRecord {
        domain: String,
        subdomain: String,
        record_type: RecordType,
    },

    /// The registrar rejected a call
    #[error("registrar API request failed with status {code}: {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Message from the registrar's failure envelope
        message: String,
    },

    /// Transport-level failure (connection, timeout, unexpected status)
    #[error("HTTP error: {0}")]
    Http(String),

    /// A body that should have been an address literal was not
    #[error("invalid IP address: {input:?}")]
    AddressParse {
        input: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// An address literal parsed, but belongs to the wrong family
    #[error("expected an {expected} address, got {found}")]
    AddressFamilyMismatch {
        expected: AddressFamily,
        found: std::net::IpAddr,
    },

    /// JSON serialization/deserialization errors
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an HTTP transport error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a registrar API error
    pub fn api(code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Whether this error is the transport refusing for lack of a token
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}
