//! Core traits for the porkdns pipeline
//!
//! This module defines the seams between components.
//!
//! - [`HttpTransport`]: Rate-limited outbound HTTP
//! - [`IpChangeSource`]: Per-family change subscriptions

pub mod ip_source;
pub mod transport;

pub use ip_source::{AddressFamily, IpChange, IpChangeSource, Subscription, SUBSCRIPTION_CAPACITY};
pub use transport::{HttpResponse, HttpTransport};
