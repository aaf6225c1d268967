//! Polling IP change monitor
//!
//! The IpMonitor is responsible for:
//! - Polling the IPv4 and IPv6 discovery endpoints on a fixed interval
//! - Comparing each result with the last known address of its family
//! - Fanning every detected change out to that family's subscribers
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐  fetch_text   ┌──────────────┐
//! │ HttpTransport │◄──────────────│  IpMonitor   │
//! └───────────────┘               │  (poll loop) │
//!                                 └──────────────┘
//!                                        │ IpChange
//!                 ┌──────────────────────┼──────────────────────┐
//!                 ▼                      ▼                      ▼
//!         ┌──────────────┐       ┌──────────────┐       ┌──────────────┐
//!         │ Subscription │       │ Subscription │       │ Subscription │
//!         │ (v4, cap 1)  │       │ (v4, cap 1)  │       │ (v6, cap 1)  │
//!         └──────────────┘       └──────────────┘       └──────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. For v4, then v6: fetch with bounded retry on rate limiting
//! 2. If the address differs from the last known one, publish the change to
//!    every subscriber of that family, in registration order
//! 3. Update the last known address
//! 4. Sleep for the configured interval
//!
//! The last known address starts at the family's unspecified address, so the
//! first successful cycle always publishes a baseline change.
//!
//! ## Backpressure
//!
//! Publishing awaits each subscriber's one-slot channel. A subscriber that
//! stops draining its channel stalls the whole loop: the other family and
//! every other subscriber wait with it. Consumers must keep up.

use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::traits::{AddressFamily, HttpTransport, IpChange, IpChangeSource, Subscription};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Polling IP change monitor
///
/// Cheap to clone; clones share subscribers and configuration.
///
/// ## Lifecycle
///
/// 1. Create with [`IpMonitor::new()`]
/// 2. Register consumers with [`IpMonitor::subscribe()`]
/// 3. Spawn the polling loop with [`IpMonitor::start()`]
///
/// Subscribing after `start` is allowed; the new subscriber only sees changes
/// detected from then on.
#[derive(Clone)]
pub struct IpMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    /// Transport used for discovery fetches
    transport: Arc<dyn HttpTransport>,

    /// Endpoints, interval and retry settings
    config: MonitorConfig,

    /// Per-family subscriber senders, in registration order
    subscribers: Mutex<Subscribers>,
}

#[derive(Default)]
struct Subscribers {
    v4: Vec<mpsc::Sender<IpChange>>,
    v6: Vec<mpsc::Sender<IpChange>>,
}

impl Subscribers {
    fn family_mut(&mut self, family: AddressFamily) -> &mut Vec<mpsc::Sender<IpChange>> {
        match family {
            AddressFamily::V4 => &mut self.v4,
            AddressFamily::V6 => &mut self.v6,
        }
    }
}

/// Last observed address for each family
struct LastKnown {
    v4: IpAddr,
    v6: IpAddr,
}

impl LastKnown {
    fn unspecified() -> Self {
        Self {
            v4: AddressFamily::V4.unspecified(),
            v6: AddressFamily::V6.unspecified(),
        }
    }

    fn get_mut(&mut self, family: AddressFamily) -> &mut IpAddr {
        match family {
            AddressFamily::V4 => &mut self.v4,
            AddressFamily::V6 => &mut self.v6,
        }
    }
}

impl IpMonitor {
    /// Create a new monitor
    ///
    /// Nothing is polled until [`IpMonitor::start()`] is called.
    pub fn new(transport: Arc<dyn HttpTransport>, config: MonitorConfig) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                transport,
                config,
                subscribers: Mutex::new(Subscribers::default()),
            }),
        }
    }

    /// Register a subscriber for `family`
    ///
    /// Returns immediately. Past changes are not replayed.
    pub fn subscribe(&self, family: AddressFamily) -> Subscription {
        let (tx, subscription) = Subscription::channel(family);
        self.inner.lock_subscribers().family_mut(family).push(tx);
        debug!("New {} subscriber registered", family);
        subscription
    }

    /// Number of live subscribers for `family`
    pub fn subscriber_count(&self, family: AddressFamily) -> usize {
        self.inner.lock_subscribers().family_mut(family).len()
    }

    /// Spawn the polling loop
    ///
    /// The loop runs until the returned handle is aborted or the runtime shuts
    /// down. Must be called from within a Tokio runtime.
    pub fn start(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run().await })
    }
}

impl IpChangeSource for IpMonitor {
    fn subscribe(&self, family: AddressFamily) -> Subscription {
        IpMonitor::subscribe(self, family)
    }
}

impl MonitorInner {
    fn lock_subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(&self) {
        info!(
            "Starting IP monitoring (v4={}, v6={}, interval={:?})",
            self.config.ipv4_url,
            self.config.ipv6_url,
            self.config.interval()
        );

        let mut last_known = LastKnown::unspecified();
        let policy = self.config.retry_policy();

        loop {
            for family in AddressFamily::ALL {
                self.check_family(family, last_known.get_mut(family), &policy)
                    .await;
            }

            tokio::time::sleep(self.config.interval()).await;
        }
    }

    /// Fetch one family and publish if it moved
    async fn check_family(&self, family: AddressFamily, last: &mut IpAddr, policy: &RetryPolicy) {
        let url = self.config.url_for(family);

        let current = match fetch_address(self.transport.as_ref(), url, family, policy).await {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Failed to fetch {} address: {} (keeping {})", family, e, last);
                return;
            }
        };

        let Some(change) = IpChange::new(*last, current) else {
            debug!("{} address unchanged: {}", family, current);
            return;
        };

        self.publish(family, change).await;
        *last = current;

        info!("{} changed: {}", family, change);
    }

    /// Send `change` to every subscriber of `family`, one at a time
    ///
    /// Each send waits for room in that subscriber's buffer. Subscribers whose
    /// receiver is gone are dropped from the list afterwards.
    async fn publish(&self, family: AddressFamily, change: IpChange) {
        // Snapshot so the lock is not held across the awaits below
        let targets: Vec<mpsc::Sender<IpChange>> =
            self.lock_subscribers().family_mut(family).clone();

        let mut closed = Vec::new();
        for tx in &targets {
            if tx.send(change).await.is_err() {
                closed.push(tx.clone());
            }
        }

        if !closed.is_empty() {
            debug!("Dropping {} closed {} subscriber(s)", closed.len(), family);
            self.lock_subscribers()
                .family_mut(family)
                .retain(|tx| !closed.iter().any(|gone| gone.same_channel(tx)));
        }
    }
}

/// Fetch and parse one public address, retrying while rate limited
///
/// # Returns
///
/// - `Ok(IpAddr)`: A parsed address of `family`
/// - `Err(Error::RetriesExceeded)`: Every attempt was rate limited
/// - `Err(Error::AddressParse | Error::AddressFamilyMismatch)`: Bad body
/// - `Err(Error)`: Any other transport failure, after a single attempt
pub async fn fetch_address(
    transport: &dyn HttpTransport,
    url: &str,
    family: AddressFamily,
    policy: &RetryPolicy,
) -> Result<IpAddr> {
    let body = policy.run(|| transport.fetch_text(url)).await?;
    parse_address(&body, family)
}

/// Parse a discovery response body as an address of `family`
pub fn parse_address(body: &str, family: AddressFamily) -> Result<IpAddr> {
    let text = body.trim();
    let ip: IpAddr = text.parse().map_err(|source| Error::AddressParse {
        input: text.to_string(),
        source,
    })?;

    if AddressFamily::of(&ip) != family {
        return Err(Error::AddressFamilyMismatch {
            expected: family,
            found: ip,
        });
    }

    Ok(ip)
}
