// # IP Change Source Trait
//
// Defines the subscription contract between the IP monitor and its consumers.
//
// ## Implementations
//
// - Polling monitor: [`crate::monitor::IpMonitor`]
// - Hand-fed doubles in record tests
//
// ## Usage
//
// ```rust,ignore
// use porkdns_core::{AddressFamily, IpChangeSource};
//
// async fn follow(source: &dyn IpChangeSource) {
//     let mut changes = source.subscribe(AddressFamily::V4);
//     while let Some(change) = changes.recv().await {
//         println!("{} -> {}", change.from(), change.to());
//     }
// }
// ```

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_stream::wrappers::ReceiverStream;

/// Buffer size of every subscription channel
///
/// One slot: a subscriber that has not consumed the previous change holds up
/// the publisher until it does.
pub const SUBSCRIPTION_CAPACITY: usize = 1;

/// IP address family (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Both families, in the order the monitor polls them
    pub const ALL: [AddressFamily; 2] = [AddressFamily::V4, AddressFamily::V6];

    /// The "no value yet" address for this family
    pub fn unspecified(self) -> IpAddr {
        match self {
            AddressFamily::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }

    /// The family an address belongs to
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => f.write_str("IPv4"),
            AddressFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// A detected public address change
///
/// `from` and `to` always differ and always share a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpChange {
    from: IpAddr,
    to: IpAddr,
}

impl IpChange {
    /// Create a change event, or `None` if there is nothing to report
    pub fn new(from: IpAddr, to: IpAddr) -> Option<Self> {
        if from == to || AddressFamily::of(&from) != AddressFamily::of(&to) {
            return None;
        }
        Some(Self { from, to })
    }

    /// The previously known address (unspecified on the first observation)
    pub fn from(&self) -> IpAddr {
        self.from
    }

    /// The newly observed address
    pub fn to(&self) -> IpAddr {
        self.to
    }

    /// Which family this change affects
    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.to)
    }

    /// Whether this is the first observation rather than a real transition
    pub fn is_baseline(&self) -> bool {
        self.from.is_unspecified()
    }
}

impl fmt::Display for IpChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Receive side of one subscriber's change channel
#[derive(Debug)]
pub struct Subscription {
    family: AddressFamily,
    rx: mpsc::Receiver<IpChange>,
}

impl Subscription {
    /// Create a bounded channel and wrap its receiver
    ///
    /// The sender goes to the publisher; the subscription to the consumer.
    pub fn channel(family: AddressFamily) -> (mpsc::Sender<IpChange>, Self) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        (tx, Self { family, rx })
    }

    /// The family this subscription receives changes for
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Wait for the next change; `None` once the publisher is gone
    pub async fn recv(&mut self) -> Option<IpChange> {
        self.rx.recv().await
    }

    /// Take a buffered change without waiting
    pub fn try_recv(&mut self) -> Result<IpChange, TryRecvError> {
        self.rx.try_recv()
    }

    /// Consume the subscription as a stream of changes
    pub fn into_stream(self) -> ReceiverStream<IpChange> {
        ReceiverStream::new(self.rx)
    }
}

/// Trait for anything that hands out per-family change subscriptions
///
/// # Delivery Contract
///
/// - A subscription only sees changes detected after `subscribe` returned
/// - Changes arrive in detection order
/// - Every subscriber of a family sees the same change values
pub trait IpChangeSource: Send + Sync {
    /// Register a new subscriber for `family`
    fn subscribe(&self, family: AddressFamily) -> Subscription;
}
