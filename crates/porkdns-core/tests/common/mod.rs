//! Test doubles and common utilities for monitor contract tests
//!
//! The doubles answer discovery fetches from in-memory values that the test
//! can change between polling cycles. Nothing touches the network.

#![allow(dead_code)]

use porkdns_core::config::MonitorConfig;
use porkdns_core::error::{Error, Result};
use porkdns_core::traits::{AddressFamily, HttpResponse, HttpTransport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const V4_URL: &str = "http://v4.discovery.test";
pub const V6_URL: &str = "http://v6.discovery.test";

pub const V4_ADDR: &str = "192.168.1.1";
pub const V6_ADDR: &str = "0c71:d460:0961:07de:62d5:0f87:ac61:2f38";

/// What the double answers for one family
#[derive(Debug, Clone)]
pub enum Reply {
    /// Body text (normally an address literal)
    Body(String),
    /// Refuse with `Error::RateLimited`
    RateLimited,
    /// Fail with a transport error
    Unreachable,
}

impl Reply {
    pub fn body(text: &str) -> Self {
        Reply::Body(text.to_string())
    }
}

/// A discovery transport whose answers the test controls
pub struct ScriptedTransport {
    v4: Mutex<Reply>,
    v6: Mutex<Reply>,
    /// Call counter for fetch_text()
    fetch_count: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(v4: &str, v6: &str) -> Arc<Self> {
        Arc::new(Self {
            v4: Mutex::new(Reply::body(v4)),
            v6: Mutex::new(Reply::body(v6)),
            fetch_count: AtomicUsize::new(0),
        })
    }

    /// Change what the next fetches for `family` return
    pub fn set(&self, family: AddressFamily, reply: Reply) {
        *self.slot(family).lock().unwrap() = reply;
    }

    pub fn set_v4(&self, addr: &str) {
        self.set(AddressFamily::V4, Reply::body(addr));
    }

    pub fn set_v6(&self, addr: &str) {
        self.set(AddressFamily::V6, Reply::body(addr));
    }

    /// Get the number of times fetch_text() was called
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    fn slot(&self, family: AddressFamily) -> &Mutex<Reply> {
        match family {
            AddressFamily::V4 => &self.v4,
            AddressFamily::V6 => &self.v6,
        }
    }
}

#[async_trait::async_trait]
impl HttpTransport for ScriptedTransport {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        let family = match url {
            V4_URL => AddressFamily::V4,
            V6_URL => AddressFamily::V6,
            other => return Err(Error::http(format!("unexpected URL {}", other))),
        };

        let reply = self.slot(family).lock().unwrap().clone();
        match reply {
            Reply::Body(text) => Ok(text),
            Reply::RateLimited => Err(Error::RateLimited),
            Reply::Unreachable => Err(Error::http("connection refused")),
        }
    }

    async fn post_json(&self, url: &str, _payload: &serde_json::Value) -> Result<HttpResponse> {
        Err(Error::http(format!("monitor must not POST (got {})", url)))
    }
}

/// Monitor settings pointing at the scripted endpoints, one-second cycles
pub fn test_config() -> MonitorConfig {
    MonitorConfig {
        interval_secs: 1,
        ipv4_url: V4_URL.to_string(),
        ipv6_url: V6_URL.to_string(),
        max_fetch_attempts: 10,
        retry_delay_ms: 500,
    }
}

pub fn ip(text: &str) -> std::net::IpAddr {
    text.parse().expect("valid test address")
}
