// # porkdnsd - porkdns Daemon
//
// Thin wiring for the porkdns pipeline. All behavior lives in the library
// crates; this binary only:
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Verifies the registrar credentials
// 4. Reads back every configured record and subscribes it to the monitor
// 5. Starts the monitor and waits for SIGINT/SIGTERM
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Credentials
// - `DDNS_API_KEY` / `DDNS_API_KEY_FILE`: Porkbun API key, or a file holding it
// - `DDNS_SECRET_API_KEY` / `DDNS_SECRET_API_KEY_FILE`: Porkbun secret key
//
// ### Records
// - `DDNS_RECORDS`: Comma-separated `TYPE:domain:subdomain[:ttl]` entries;
//   leave the subdomain empty for the apex (`A:example.com:`)
//
// ### Timing
// - `DDNS_REQUESTS_PER_SECOND`: Outbound request rate (default 1)
// - `DDNS_POLL_INTERVAL_SECS`: Pause between address checks (default 60)
//
// ### Endpoints
// - `DDNS_API_BASE`: Registrar API base URL
// - `DDNS_IPV4_URL` / `DDNS_IPV6_URL`: Address discovery endpoints
//
// ### Logging
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export DDNS_API_KEY_FILE=/run/secrets/porkbun_api_key
// export DDNS_SECRET_API_KEY_FILE=/run/secrets/porkbun_secret_api_key
// export DDNS_RECORDS=A:example.com:www,AAAA:example.com:www,A:example.com:
//
// porkdnsd
// ```

use anyhow::{Context, Result};
use porkdns_core::config::{Credentials, DdnsConfig, RecordConfig};
use porkdns_core::{HttpTransport, IpMonitor, RetryPolicy};
use porkdns_http::RateLimitedClient;
use porkdns_porkbun::{PorkbunRecord, SubscribedRecord, ping};
use std::env;
use std::fs;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    ddns: DdnsConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup` (environment in production)
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let credentials = Credentials::new(
            secret(&lookup, "DDNS_API_KEY")?,
            secret(&lookup, "DDNS_SECRET_API_KEY")?,
        );

        let records = lookup("DDNS_RECORDS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                RecordConfig::from_str(s).with_context(|| format!("Invalid DDNS_RECORDS entry '{}'", s))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut ddns = DdnsConfig::new(credentials, records);

        if let Some(rps) = parse_var(&lookup, "DDNS_REQUESTS_PER_SECOND")? {
            ddns.client.requests_per_second = rps;
        }
        if let Some(interval) = parse_var(&lookup, "DDNS_POLL_INTERVAL_SECS")? {
            ddns.monitor.interval_secs = interval;
        }
        if let Some(url) = lookup("DDNS_IPV4_URL") {
            ddns.monitor.ipv4_url = url;
        }
        if let Some(url) = lookup("DDNS_IPV6_URL") {
            ddns.monitor.ipv6_url = url;
        }
        if let Some(base) = lookup("DDNS_API_BASE") {
            ddns.registrar.api_base = base.trim_end_matches('/').to_string();
        }

        Ok(Self {
            ddns,
            log_level: lookup("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// On top of the library checks:
    /// - Record names must be valid DNS names
    /// - Keys must not be obvious placeholders
    /// - Poll interval and request rate must be within sane ranges
    /// - The log level must be known
    fn validate(&self) -> Result<()> {
        if self.ddns.records.is_empty() {
            anyhow::bail!(
                "DDNS_RECORDS must contain at least one record. \
                Set it via: export DDNS_RECORDS=A:example.com:www"
            );
        }

        self.ddns.validate()?;

        for record in &self.ddns.records {
            validate_domain_name(&record.fqdn())?;
        }

        // Check for obvious placeholder keys (common mistake)
        for (name, value) in [
            ("DDNS_API_KEY", &self.ddns.credentials.api_key),
            ("DDNS_SECRET_API_KEY", &self.ddns.credentials.secret_api_key),
        ] {
            let lower = value.to_lowercase();
            if lower.contains("your_key") || lower.contains("replace_me") || lower == "key" {
                anyhow::bail!(
                    "{} appears to be a placeholder. \
                    Use an actual key from the Porkbun API access page.",
                    name
                );
            }
        }

        let interval = self.ddns.monitor.interval_secs;
        if !(10..=3600).contains(&interval) {
            anyhow::bail!(
                "DDNS_POLL_INTERVAL_SECS must be between 10 and 3600 seconds. Got: {}",
                interval
            );
        }

        let rps = self.ddns.client.requests_per_second;
        if !(1..=10).contains(&rps) {
            anyhow::bail!(
                "DDNS_REQUESTS_PER_SECOND must be between 1 and 10. Got: {}",
                rps
            );
        }

        // Warn if discovery is not over HTTPS
        for url in [&self.ddns.monitor.ipv4_url, &self.ddns.monitor.ipv6_url] {
            if url.starts_with("http://") {
                eprintln!(
                    "WARNING: discovery endpoint {} uses HTTP (not HTTPS). \
                    Responses could be spoofed.",
                    url
                );
            }
        }

        parse_log_level(&self.log_level)?;

        Ok(())
    }
}

/// Read a secret from `name`, or from the file named by `{name}_FILE`
fn secret(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
        return Ok(value.trim().to_string());
    }

    let file_var = format!("{}_FILE", name);
    if let Some(path) = lookup(&file_var).filter(|p| !p.trim().is_empty()) {
        let contents = fs::read_to_string(path.trim())
            .with_context(|| format!("Failed to read {} from {}", name, path))?;
        return Ok(contents.trim().to_string());
    }

    anyhow::bail!(
        "{} is required. Set it via: export {}=your_key \
        (or point {} at a file holding it)",
        name,
        name,
        file_var
    )
}

/// Parse an optional numeric variable
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("{} must be a number. Got: '{}'", name, raw))
        })
        .transpose()
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "DDNS_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

/// Validate that a string is a valid domain name
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        // Wildcard records are managed like any other
        if label == "*" {
            continue;
        }

        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DdnsExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = parse_log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting porkdnsd daemon");
    info!("Configuration loaded: {} record(s)", config.ddns.records.len());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let daemon = match Daemon::start(config.ddns).await {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return DdnsExitCode::ConfigError;
            }
        };

        match daemon.run_until_shutdown().await {
            Ok(()) => DdnsExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DdnsExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// The running pipeline
struct Daemon {
    monitor: JoinHandle<()>,
    records: Vec<SubscribedRecord>,
}

impl Daemon {
    /// Build and start every component
    ///
    /// Startup calls are rate limited like everything else, so each one is
    /// wrapped in the default retry policy.
    async fn start(config: DdnsConfig) -> Result<Self> {
        let client: Arc<dyn HttpTransport> = Arc::new(RateLimitedClient::new(&config.client)?);
        let api_base = config.registrar.api_base.as_str();
        let policy = RetryPolicy::default();

        let seen = policy
            .run(|| ping(client.as_ref(), api_base, &config.credentials))
            .await
            .context("Registrar did not accept the API credentials")?;
        info!("Registrar credentials verified (registrar sees {})", seen);

        let monitor = IpMonitor::new(Arc::clone(&client), config.monitor.clone());

        let mut records = Vec::new();
        for record_config in &config.records {
            let built = policy
                .run(|| {
                    PorkbunRecord::new(
                        record_config.clone(),
                        config.credentials.clone(),
                        Arc::clone(&client),
                        api_base,
                    )
                })
                .await;

            match built {
                Ok(record) => records.push(record.subscribe(&monitor)),
                Err(e) => error!(
                    "Skipping {} record {}: {}",
                    record_config.record_type,
                    record_config.fqdn(),
                    e
                ),
            }
        }

        if records.is_empty() {
            anyhow::bail!("None of the {} configured record(s) could be managed", config.records.len());
        }
        if records.len() < config.records.len() {
            warn!(
                "Managing {} of {} configured record(s)",
                records.len(),
                config.records.len()
            );
        }

        Ok(Self {
            monitor: monitor.start(),
            records,
        })
    }

    /// Abort the monitor and every record task
    fn stop(&self) {
        self.monitor.abort();
        for record in &self.records {
            record.abort();
        }
    }

    /// Wait for a shutdown signal, then stop every task
    async fn run_until_shutdown(self) -> Result<()> {
        info!("Daemon initialized successfully");
        info!("Ready to monitor IP changes");

        let outcome = wait_for_shutdown().await;
        self.stop();

        let signal = outcome?;
        info!("Received shutdown signal: {}", signal);
        info!("Shutting down daemon");

        Ok(())
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };

    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use porkdns_core::config::RecordType;
    use std::collections::HashMap;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DDNS_API_KEY", "pk1_0123456789abcdef"),
            ("DDNS_SECRET_API_KEY", "sk1_0123456789abcdef"),
            ("DDNS_RECORDS", "A:noah-hood.io:sdm, AAAA:noah-hood.io::300"),
        ]
    }

    #[test]
    fn loads_records_and_defaults() {
        let config = Config::from_lookup(lookup_from(&minimal())).unwrap();
        config.validate().unwrap();

        let records = &config.ddns.records;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], RecordConfig::new("noah-hood.io", "sdm", RecordType::A));
        assert_eq!(
            records[1],
            RecordConfig::new("noah-hood.io", "", RecordType::Aaaa).with_ttl(300)
        );
        assert_eq!(config.ddns.client.requests_per_second, 1);
        assert_eq!(config.ddns.monitor.interval_secs, 60);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn overrides_are_applied() {
        let mut vars = minimal();
        vars.push(("DDNS_REQUESTS_PER_SECOND", "2"));
        vars.push(("DDNS_POLL_INTERVAL_SECS", "300"));
        vars.push(("DDNS_API_BASE", "https://api-ipv4.porkbun.com/api/json/v3/"));
        vars.push(("DDNS_IPV4_URL", "https://ipv4.icanhazip.com"));

        let config = Config::from_lookup(lookup_from(&vars)).unwrap();
        config.validate().unwrap();

        assert_eq!(config.ddns.client.requests_per_second, 2);
        assert_eq!(config.ddns.monitor.interval_secs, 300);
        assert_eq!(
            config.ddns.registrar.api_base,
            "https://api-ipv4.porkbun.com/api/json/v3"
        );
        assert_eq!(config.ddns.monitor.ipv4_url, "https://ipv4.icanhazip.com");
    }

    #[test]
    fn missing_key_is_an_error() {
        let vars = [("DDNS_SECRET_API_KEY", "sk1_x"), ("DDNS_RECORDS", "A:noah-hood.io:sdm")];

        let err = Config::from_lookup(lookup_from(&vars)).err().unwrap();
        assert!(err.to_string().contains("DDNS_API_KEY is required"));
    }

    #[test]
    fn keys_can_come_from_files() {
        let mut api_key = tempfile::NamedTempFile::new().unwrap();
        writeln!(api_key, "pk1_from_file").unwrap();
        let mut secret_key = tempfile::NamedTempFile::new().unwrap();
        writeln!(secret_key, "sk1_from_file").unwrap();

        let api_path = api_key.path().to_string_lossy().into_owned();
        let secret_path = secret_key.path().to_string_lossy().into_owned();
        let vars = [
            ("DDNS_API_KEY_FILE", api_path.as_str()),
            ("DDNS_SECRET_API_KEY_FILE", secret_path.as_str()),
            ("DDNS_RECORDS", "A:noah-hood.io:sdm"),
        ];

        let config = Config::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.ddns.credentials.api_key, "pk1_from_file");
        assert_eq!(config.ddns.credentials.secret_api_key, "sk1_from_file");
    }

    #[test]
    fn unreadable_key_file_is_an_error() {
        let vars = [
            ("DDNS_API_KEY_FILE", "/nonexistent/porkdns/api_key"),
            ("DDNS_SECRET_API_KEY", "sk1_x"),
            ("DDNS_RECORDS", "A:noah-hood.io:sdm"),
        ];

        assert!(Config::from_lookup(lookup_from(&vars)).is_err());
    }

    #[test]
    fn malformed_record_entry_is_rejected() {
        let mut vars = minimal();
        vars.retain(|(k, _)| *k != "DDNS_RECORDS");
        vars.push(("DDNS_RECORDS", "MX:noah-hood.io:sdm"));

        assert!(Config::from_lookup(lookup_from(&vars)).is_err());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let cases: &[(&str, &str)] = &[
            ("DDNS_RECORDS", ""),
            ("DDNS_RECORDS", "A:-bad-.io:sdm"),
            ("DDNS_POLL_INTERVAL_SECS", "5"),
            ("DDNS_REQUESTS_PER_SECOND", "0"),
            ("DDNS_LOG_LEVEL", "loud"),
            ("DDNS_API_KEY", "your_key_here"),
            ("DDNS_API_BASE", "ftp://api.porkbun.com"),
        ];

        for (name, value) in cases {
            let mut vars = minimal();
            vars.retain(|(k, _)| k != name);
            vars.push((*name, *value));

            let config = Config::from_lookup(lookup_from(&vars)).unwrap();
            assert!(
                config.validate().is_err(),
                "{}={} should fail validation",
                name,
                value
            );
        }
    }

    const PING_OK: &str = r#"{"status":"SUCCESS","yourIp":"66.65.64.63"}"#;
    const NO_RECORDS: &str = r#"{"status":"SUCCESS","records":[]}"#;
    const ONE_RECORD: &str = r#"{
        "status": "SUCCESS",
        "records": [{
            "id": "123456789",
            "name": "sdm.noah-hood.io",
            "type": "A",
            "content": "66.65.64.63",
            "ttl": "600",
            "prio": null,
            "notes": ""
        }]
    }"#;

    /// Configuration whose every endpoint lives on `server`
    fn daemon_config(server: &MockServer, records: Vec<RecordConfig>) -> DdnsConfig {
        let mut config = DdnsConfig::new(
            Credentials::new("pk1_0123456789abcdef", "sk1_0123456789abcdef"),
            records,
        );
        config.client.requests_per_second = 10;
        config.registrar.api_base = server.uri();
        config.monitor.ipv4_url = format!("{}/ipv4", server.uri());
        config.monitor.ipv6_url = format!("{}/ipv6", server.uri());
        config
    }

    async fn mount_post(server: &MockServer, route: &str, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn startup_skips_records_that_cannot_be_read_back() {
        let server = MockServer::start().await;
        mount_post(&server, "/ping", 200, PING_OK).await;
        mount_post(&server, "/dns/retrieveByNameType/noah-hood.io/A/sdm", 200, ONE_RECORD).await;
        mount_post(&server, "/dns/retrieveByNameType/noah-hood.io/A/gone", 200, NO_RECORDS).await;

        let config = daemon_config(
            &server,
            vec![
                RecordConfig::new("noah-hood.io", "sdm", RecordType::A),
                RecordConfig::new("noah-hood.io", "gone", RecordType::A),
            ],
        );

        let daemon = Daemon::start(config).await.unwrap();
        assert_eq!(daemon.records.len(), 1);
        assert_eq!(daemon.records[0].name(), "sdm.noah-hood.io");
        assert_eq!(daemon.records[0].answer(), "66.65.64.63".parse::<std::net::IpAddr>().unwrap());

        daemon.stop();
    }

    #[tokio::test]
    async fn startup_fails_when_no_record_is_usable() {
        let server = MockServer::start().await;
        mount_post(&server, "/ping", 200, PING_OK).await;
        mount_post(&server, "/dns/retrieveByNameType/noah-hood.io/A/gone", 200, NO_RECORDS).await;
        mount_post(
            &server,
            "/dns/retrieveByNameType/noah-hood.io/AAAA/gone",
            400,
            r#"{"status":"ERROR","message":"Invalid domain."}"#,
        )
        .await;

        let config = daemon_config(
            &server,
            vec![
                RecordConfig::new("noah-hood.io", "gone", RecordType::A),
                RecordConfig::new("noah-hood.io", "gone", RecordType::Aaaa),
            ],
        );

        let err = Daemon::start(config).await.err().unwrap();
        assert!(
            err.to_string().contains("None of the 2 configured record(s)"),
            "unexpected error: {:#}",
            err
        );
    }

    #[tokio::test]
    async fn startup_fails_when_credentials_are_rejected() {
        let server = MockServer::start().await;
        mount_post(
            &server,
            "/ping",
            403,
            r#"{"status":"ERROR","message":"Invalid API key. (002)"}"#,
        )
        .await;

        let config = daemon_config(
            &server,
            vec![RecordConfig::new("noah-hood.io", "sdm", RecordType::A)],
        );

        let err = Daemon::start(config).await.err().unwrap();
        assert!(err.to_string().contains("did not accept the API credentials"));

        // Records are never read back once the ping fails
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn domain_name_validation() {
        assert!(validate_domain_name("sdm.noah-hood.io").is_ok());
        assert!(validate_domain_name("*.noah-hood.io").is_ok());
        assert!(validate_domain_name("noah..hood.io").is_err());
        assert!(validate_domain_name(&"a".repeat(64)).is_err());
        assert!(validate_domain_name("under_score.io").is_err());
    }
}
