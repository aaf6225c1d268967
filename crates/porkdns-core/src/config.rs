//! Configuration types for the porkdns pipeline
//!
//! This module defines all configuration structures used throughout the
//! workspace. Loading them (environment, files) is the daemon's job.

use crate::retry::RetryPolicy;
use crate::traits::AddressFamily;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default IPv4 discovery endpoint (plain-text body)
pub const DEFAULT_IPV4_URL: &str = "https://api.ipify.org";

/// Default IPv6 discovery endpoint (plain-text body)
pub const DEFAULT_IPV6_URL: &str = "https://api6.ipify.org";

/// Default registrar API base URL
pub const DEFAULT_API_BASE: &str = "https://api.porkbun.com/api/json/v3";

/// Main porkdns configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Registrar API credentials
    pub credentials: Credentials,

    /// DNS records to manage
    pub records: Vec<RecordConfig>,

    /// Outbound HTTP settings
    #[serde(default)]
    pub client: ClientConfig,

    /// IP monitor settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Registrar endpoint settings
    #[serde(default)]
    pub registrar: RegistrarConfig,
}

impl DdnsConfig {
    /// Create a configuration with defaults for everything but the essentials
    pub fn new(credentials: Credentials, records: Vec<RecordConfig>) -> Self {
        Self {
            credentials,
            records,
            client: ClientConfig::default(),
            monitor: MonitorConfig::default(),
            registrar: RegistrarConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.records.is_empty() {
            return Err(crate::Error::config("No records configured"));
        }

        self.credentials.validate()?;
        for record in &self.records {
            record.validate()?;
        }
        self.client.validate()?;
        self.monitor.validate()?;
        self.registrar.validate()?;

        Ok(())
    }
}

/// Registrar API credentials
///
/// Serializes to the `{apikey, secretapikey}` object every registrar call
/// carries in its body.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Public API key
    #[serde(rename = "apikey")]
    pub api_key: String,

    /// Secret API key
    /// ⚠️ NEVER log this value
    #[serde(rename = "secretapikey")]
    pub secret_api_key: String,
}

impl Credentials {
    /// Create a credential pair
    pub fn new(api_key: impl Into<String>, secret_api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_api_key: secret_api_key.into(),
        }
    }

    /// Both keys must be present
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_key.trim().is_empty() {
            return Err(crate::Error::config("API key cannot be empty"));
        }
        if self.secret_api_key.trim().is_empty() {
            return Err(crate::Error::config("Secret API key cannot be empty"));
        }
        Ok(())
    }
}

// Custom Debug implementation that hides both keys
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<REDACTED>")
            .field("secret_api_key", &"<REDACTED>")
            .finish()
    }
}

/// DNS record configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Registered domain (e.g., "example.com")
    pub domain: String,

    /// Subdomain label(s); empty for the apex
    #[serde(default)]
    pub subdomain: String,

    /// Record type (A for IPv4, AAAA for IPv6)
    pub record_type: RecordType,

    /// Time-to-live sent with every edit
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

impl RecordConfig {
    /// Create a new record configuration with the default TTL
    pub fn new(
        domain: impl Into<String>,
        subdomain: impl Into<String>,
        record_type: RecordType,
    ) -> Self {
        Self {
            domain: domain.into(),
            subdomain: subdomain.into(),
            record_type,
            ttl: default_ttl(),
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Fully qualified name, for logs
    pub fn fqdn(&self) -> String {
        if self.subdomain.is_empty() {
            self.domain.clone()
        } else {
            format!("{}.{}", self.subdomain, self.domain)
        }
    }

    /// Validate the record configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domain.trim().is_empty() {
            return Err(crate::Error::config("Record domain cannot be empty"));
        }
        if self.domain.contains('/') || self.subdomain.contains('/') {
            return Err(crate::Error::config(format!(
                "Record name cannot contain '/': {}",
                self.fqdn()
            )));
        }
        if self.ttl == 0 {
            return Err(crate::Error::config(format!(
                "Record TTL must be > 0: {}",
                self.fqdn()
            )));
        }
        Ok(())
    }
}

/// Parses the compact `TYPE:domain:subdomain[:ttl]` form
///
/// `A:example.com:www`, `AAAA:example.com::600` (apex).
impl FromStr for RecordConfig {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(crate::Error::config(format!(
                "Record must be TYPE:domain:subdomain[:ttl], got '{}'",
                s
            )));
        }

        let record_type: RecordType = parts[0].parse()?;
        let mut record = RecordConfig::new(parts[1].trim(), parts[2].trim(), record_type);

        if let Some(ttl) = parts.get(3) {
            record.ttl = ttl.trim().parse().map_err(|_| {
                crate::Error::config(format!("Invalid TTL '{}' in record '{}'", ttl, s))
            })?;
        }

        record.validate()?;
        Ok(record)
    }
}

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    #[serde(rename = "A")]
    A,
    /// AAAA record (IPv6)
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// The uppercase literal used in registrar URLs
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// The address family this record type holds
    pub fn family(self) -> AddressFamily {
        match self {
            RecordType::A => AddressFamily::V4,
            RecordType::Aaaa => AddressFamily::V6,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            other => Err(crate::Error::config(format!(
                "Unsupported record type '{}' (expected A or AAAA)",
                other
            ))),
        }
    }
}

fn default_ttl() -> u32 {
    600
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Sustained request rate; bursts of up to two are allowed
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Per-request timeout (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ClientConfig {
    /// Time between token refills
    pub fn refill_period(&self) -> Duration {
        Duration::from_secs(1) / self.requests_per_second.max(1)
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the client configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.requests_per_second == 0 {
            return Err(crate::Error::config("Requests per second must be > 0"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("HTTP timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_requests_per_second() -> u32 {
    1
}

fn default_timeout_secs() -> u64 {
    30
}

/// IP monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Pause between polling cycles (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// IPv4 discovery endpoint
    #[serde(default = "default_ipv4_url")]
    pub ipv4_url: String,

    /// IPv6 discovery endpoint
    #[serde(default = "default_ipv6_url")]
    pub ipv6_url: String,

    /// Attempts per fetch before giving up on a rate-limited transport
    #[serde(default = "default_max_fetch_attempts")]
    pub max_fetch_attempts: usize,

    /// Pause after a rate-limited attempt (in milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl MonitorConfig {
    /// Pause between polling cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Set the interval (builder style)
    pub fn with_interval(mut self, interval_secs: u64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    /// Discovery endpoint for `family`
    pub fn url_for(&self, family: AddressFamily) -> &str {
        match family {
            AddressFamily::V4 => &self.ipv4_url,
            AddressFamily::V6 => &self.ipv6_url,
        }
    }

    /// The bounded retry applied to each discovery fetch
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_fetch_attempts,
            Duration::from_millis(self.retry_delay_ms),
        )
    }

    /// Validate the monitor configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.max_fetch_attempts == 0 {
            return Err(crate::Error::config("Max fetch attempts must be > 0"));
        }
        for url in [&self.ipv4_url, &self.ipv6_url] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(crate::Error::config(format!(
                    "Discovery URL must use HTTP or HTTPS scheme. Got: {}",
                    url
                )));
            }
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            ipv4_url: default_ipv4_url(),
            ipv6_url: default_ipv6_url(),
            max_fetch_attempts: default_max_fetch_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_ipv4_url() -> String {
    DEFAULT_IPV4_URL.to_string()
}

fn default_ipv6_url() -> String {
    DEFAULT_IPV6_URL.to_string()
}

fn default_max_fetch_attempts() -> usize {
    10
}

fn default_retry_delay_ms() -> u64 {
    500
}

/// Registrar endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrarConfig {
    /// API base URL, without trailing slash
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl RegistrarConfig {
    /// Validate the registrar configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !self.api_base.starts_with("https://") && !self.api_base.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "Registrar API base must use HTTP or HTTPS scheme. Got: {}",
                self.api_base
            )));
        }
        Ok(())
    }
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}
