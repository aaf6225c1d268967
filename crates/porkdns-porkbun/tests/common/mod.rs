//! Test doubles and common utilities for registrar contract tests
//!
//! Provides:
//! - RecordingTransport: answers every POST with a scripted reply and records
//!   each URL and payload
//! - ManualSource: an IpChangeSource the test publishes into by hand

#![allow(dead_code)]

use porkdns_core::config::{Credentials, RecordConfig, RecordType};
use porkdns_core::error::{Error, Result};
use porkdns_core::traits::{
    AddressFamily, HttpResponse, HttpTransport, IpChange, IpChangeSource, Subscription,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const API_BASE: &str = "https://api.porkbun.test/api/json/v3";

pub const RETRIEVE_A_URL: &str =
    "https://api.porkbun.test/api/json/v3/dns/retrieveByNameType/noah-hood.io/A/sdm";
pub const EDIT_A_URL: &str =
    "https://api.porkbun.test/api/json/v3/dns/editByNameType/noah-hood.io/A/sdm";

/// What the double answers for the next POST
#[derive(Debug, Clone)]
pub enum Reply {
    Response(HttpResponse),
    RateLimited,
    Unreachable,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Reply::Response(HttpResponse::new(200, body))
    }

    pub fn status(code: u16, body: impl Into<String>) -> Self {
        Reply::Response(HttpResponse::new(code, body))
    }
}

/// A recorded POST
#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub payload: serde_json::Value,
}

/// Transport double that records every POST
pub struct RecordingTransport {
    reply: Mutex<Reply>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingTransport {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Change what later POSTs return
    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn post_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Wait (up to a second) until at least `n` POSTs were made
    pub async fn wait_for_posts(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while self.post_count() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {} POSTs, saw {}", n, self.post_count()));
    }
}

#[async_trait::async_trait]
impl HttpTransport for RecordingTransport {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        Err(Error::http(format!("records must not GET (got {})", url)))
    }

    async fn post_json(&self, url: &str, payload: &serde_json::Value) -> Result<HttpResponse> {
        self.calls.lock().unwrap().push(Call {
            url: url.to_string(),
            payload: payload.clone(),
        });

        match self.reply.lock().unwrap().clone() {
            Reply::Response(response) => Ok(response),
            Reply::RateLimited => Err(Error::RateLimited),
            Reply::Unreachable => Err(Error::http("connection refused")),
        }
    }
}

/// Change source the test drives directly
#[derive(Default)]
pub struct ManualSource {
    subscribers: Mutex<Vec<(AddressFamily, mpsc::Sender<IpChange>)>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `change` to every subscriber of its family
    pub async fn publish(&self, change: IpChange) {
        let targets: Vec<_> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|(family, _)| *family == change.family())
            .map(|(_, tx)| tx.clone())
            .collect();

        for tx in targets {
            tx.send(change).await.expect("subscriber alive");
        }
    }

    pub fn subscriber_count(&self, family: AddressFamily) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|(f, _)| *f == family)
            .count()
    }

    /// Drop every sender, closing the subscriptions
    pub fn close(&self) {
        self.subscribers.lock().unwrap().clear();
    }
}

impl IpChangeSource for ManualSource {
    fn subscribe(&self, family: AddressFamily) -> Subscription {
        let (tx, subscription) = Subscription::channel(family);
        self.subscribers.lock().unwrap().push((family, tx));
        subscription
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("pk1_test", "sk1_test")
}

pub fn sdm(record_type: RecordType) -> RecordConfig {
    RecordConfig::new("noah-hood.io", "sdm", record_type)
}

/// A successful retrieve body listing one record per entry in `contents`
pub fn retrieve_body(record_type: RecordType, contents: &[&str]) -> String {
    let records: Vec<serde_json::Value> = contents
        .iter()
        .enumerate()
        .map(|(i, content)| {
            serde_json::json!({
                "id": format!("12345678{}", i),
                "name": "sdm.noah-hood.io",
                "type": record_type.as_str(),
                "content": content,
                "ttl": "600",
                "prio": "",
                "notes": "a record for sdm subdomain"
            })
        })
        .collect();

    serde_json::json!({
        "status": "SUCCESS",
        "cloudflare": "enabled",
        "records": records
    })
    .to_string()
}

pub fn success_body() -> String {
    r#"{"status":"SUCCESS"}"#.to_string()
}

pub fn ip(text: &str) -> std::net::IpAddr {
    text.parse().expect("valid test address")
}
