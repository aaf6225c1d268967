// # porkdns-core
//
// Core library for the porkdns dynamic DNS pipeline.
//
// ## Architecture Overview
//
// This library provides the pieces every other crate builds on:
// - **HttpTransport**: Trait for rate-limited outbound HTTP
// - **IpChangeSource**: Trait for per-family change subscriptions
// - **IpMonitor**: Polling monitor that detects and fans out address changes
// - **RetryPolicy**: Caller-side backoff for rate-limited calls
// - **Config / Error**: Shared configuration and error types
//
// ## Design Principles
//
// 1. **Fail fast, retry at the caller**: The transport never queues; callers
//    that know a request is safe to repeat decide how long to back off
// 2. **Channel-mediated**: Components share data only through bounded channels
// 3. **Update-only**: Nothing in the pipeline creates registrar records
// 4. **Library-First**: The daemon is wiring; all behavior lives here and in
//    the transport/registrar crates

pub mod config;
pub mod error;
pub mod monitor;
pub mod retry;
pub mod traits;

// Re-export core types for convenience
pub use config::{Credentials, DdnsConfig, MonitorConfig, RecordConfig, RecordType};
pub use error::{Error, Result};
pub use monitor::IpMonitor;
pub use retry::RetryPolicy;
pub use traits::{AddressFamily, HttpResponse, HttpTransport, IpChange, IpChangeSource, Subscription};
