//! Managed Porkbun DNS records
//!
//! A [`PorkbunRecord`] mirrors one existing `A` or `AAAA` record at the
//! registrar. It is created by reading the record back, and it only ever
//! edits that record; it never creates one.
//!
//! ## Lifecycle
//!
//! ```text
//! PorkbunRecord::new ──retrieve──► Ready ──subscribe──► SubscribedRecord
//!        │                                                  (reactive task)
//!        └──► Err(NoRecord | AmbiguousRecord | Api | ...)
//! ```

use crate::api::{self, EditPayload, RetrieveResponse};
use porkdns_core::config::{Credentials, RecordConfig, RecordType};
use porkdns_core::monitor::parse_address;
use porkdns_core::traits::{HttpTransport, IpChange, IpChangeSource, Subscription};
use porkdns_core::{Error, Result};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// One registrar record, read back and ready to follow address changes
pub struct PorkbunRecord {
    /// Which record, and the TTL to write
    config: RecordConfig,

    /// Current content as last confirmed by the registrar
    answer: IpAddr,

    /// API credentials
    /// ⚠️ NEVER log this value
    credentials: Credentials,

    /// Shared, rate-limited transport
    transport: Arc<dyn HttpTransport>,

    /// Registrar API base URL
    api_base: String,
}

// Custom Debug implementation that leaves out the credentials
impl fmt::Debug for PorkbunRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PorkbunRecord")
            .field("config", &self.config)
            .field("answer", &self.answer)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl PorkbunRecord {
    /// Read the record back from the registrar
    ///
    /// Issues exactly one `retrieveByNameType` call and never retries; a
    /// rate-limited transport fails with `Error::RateLimited` and the caller
    /// decides whether to try again.
    ///
    /// # Errors
    ///
    /// - `Error::NoRecord`: the registrar holds no such record
    /// - `Error::AmbiguousRecord`: the registrar holds more than one
    /// - `Error::Api`: the registrar rejected the call
    /// - `Error::Decode`: a response body could not be decoded
    /// - `Error::AddressParse` / `Error::AddressFamilyMismatch`: the record's
    ///   content is not an address of the record's family
    /// - any transport error, as-is
    pub async fn new(
        config: RecordConfig,
        credentials: Credentials,
        transport: Arc<dyn HttpTransport>,
        api_base: impl Into<String>,
    ) -> Result<Self> {
        config.validate()?;
        let api_base = api_base.into();

        let url = api::record_url(&api_base, api::RETRIEVE_BY_NAME_TYPE, &config);
        debug!("Retrieving {} record for {}", config.record_type, config.fqdn());

        let response = transport
            .post_json(&url, &serde_json::to_value(&credentials)?)
            .await?;

        if !response.is_success() {
            return Err(api::failure(&response));
        }

        let retrieved: RetrieveResponse = serde_json::from_str(&response.body)?;
        let entry = match retrieved.records.as_slice() {
            [] => {
                return Err(Error::NoRecord {
                    domain: config.domain.clone(),
                    subdomain: config.subdomain.clone(),
                    record_type: config.record_type,
                });
            }
            [entry] => entry,
            _ => {
                return Err(Error::AmbiguousRecord {
                    domain: config.domain.clone(),
                    subdomain: config.subdomain.clone(),
                    record_type: config.record_type,
                });
            }
        };

        let answer = parse_address(&entry.content, config.record_type.family())?;

        info!(
            "Managing {} record {} (currently {})",
            config.record_type,
            config.fqdn(),
            answer
        );

        Ok(Self {
            config,
            answer,
            credentials,
            transport,
            api_base,
        })
    }

    /// Current content of the record
    pub fn answer(&self) -> IpAddr {
        self.answer
    }

    /// Record configuration
    pub fn config(&self) -> &RecordConfig {
        &self.config
    }

    /// Record type
    pub fn record_type(&self) -> RecordType {
        self.config.record_type
    }

    /// Start following address changes
    ///
    /// Subscribes to the family matching the record type and spawns a task
    /// that issues one edit per received change. Must be called from within a
    /// Tokio runtime.
    pub fn subscribe(self, source: &dyn IpChangeSource) -> SubscribedRecord {
        let subscription = source.subscribe(self.config.record_type.family());
        let (answer_tx, answer_rx) = watch::channel(self.answer);

        let name = self.config.fqdn();
        let record_type = self.config.record_type;
        let handle = tokio::spawn(self.react(subscription, answer_tx));

        SubscribedRecord {
            name,
            record_type,
            answer: answer_rx,
            handle,
        }
    }

    async fn react(mut self, subscription: Subscription, answer: watch::Sender<IpAddr>) {
        let url = api::record_url(&self.api_base, api::EDIT_BY_NAME_TYPE, &self.config);
        let name = self.config.fqdn();
        let mut changes = subscription.into_stream();

        while let Some(change) = changes.next().await {
            match self.edit(&url, change).await {
                Ok(()) => {
                    self.answer = change.to();
                    answer.send_replace(self.answer);
                    info!("Updated {} record {}: {}", self.config.record_type, name, change);
                }
                Err(e) => {
                    warn!(
                        "Failed to update {} record {} to {}: {}",
                        self.config.record_type,
                        name,
                        change.to(),
                        e
                    );
                }
            }
        }

        debug!("Change channel for {} closed, stopping", name);
    }

    /// One `editByNameType` call, no retry
    async fn edit(&self, url: &str, change: IpChange) -> Result<()> {
        let payload = serde_json::to_value(EditPayload {
            credentials: &self.credentials,
            content: change.to(),
            ttl: self.config.ttl,
        })?;

        let response = self.transport.post_json(url, &payload).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(api::failure(&response))
        }
    }
}

/// A record whose reactive task is running
///
/// Dropping this does not stop the task; call [`SubscribedRecord::abort()`].
#[derive(Debug)]
pub struct SubscribedRecord {
    name: String,
    record_type: RecordType,
    answer: watch::Receiver<IpAddr>,
    handle: JoinHandle<()>,
}

impl SubscribedRecord {
    /// Fully qualified record name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record type
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Content as of the last accepted edit (or the initial read)
    pub fn answer(&self) -> IpAddr {
        *self.answer.borrow()
    }

    /// Receiver that observes every accepted edit
    pub fn answer_changes(&self) -> watch::Receiver<IpAddr> {
        self.answer.clone()
    }

    /// Whether the reactive task has stopped
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the reactive task
    pub fn abort(&self) {
        self.handle.abort();
    }
}
