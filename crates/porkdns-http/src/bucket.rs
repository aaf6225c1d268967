//! Token bucket used to pace outbound requests
//!
//! The bucket holds at most [`BUCKET_CAPACITY`] tokens and starts with one.
//! A background task adds one token per refill period; a token produced while
//! the bucket is full is discarded. Taking a token never waits.

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

/// Maximum number of tokens the bucket can hold
pub const BUCKET_CAPACITY: usize = 2;

/// Tokens available right after construction
pub const INITIAL_TOKENS: usize = 1;

/// Non-blocking token bucket
///
/// Tokens are semaphore permits that are forgotten once taken. Only the
/// refill task adds permits, so the count never exceeds the capacity.
#[derive(Debug)]
pub struct TokenBucket {
    tokens: Arc<Semaphore>,
    period: Duration,
}

impl TokenBucket {
    /// Create a bucket and spawn its refill task
    ///
    /// The refill task holds only a weak reference and exits at the first
    /// tick after the bucket is dropped. Must be called from within a Tokio
    /// runtime.
    pub fn new(period: Duration) -> Self {
        let tokens = Arc::new(Semaphore::new(INITIAL_TOKENS));
        tokio::spawn(refill(Arc::downgrade(&tokens), period));

        Self { tokens, period }
    }

    /// Take a token if one is available right now
    pub fn try_take(&self) -> bool {
        match self.tokens.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Tokens currently in the bucket
    pub fn available(&self) -> usize {
        self.tokens.available_permits()
    }

    /// Time between refills
    pub fn period(&self) -> Duration {
        self.period
    }
}

async fn refill(tokens: Weak<Semaphore>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(tokens) = tokens.upgrade() else {
            trace!("Token bucket dropped, stopping refill");
            return;
        };

        if tokens.available_permits() < BUCKET_CAPACITY {
            tokens.add_permits(1);
        } else {
            trace!("Token bucket full, discarding token");
        }
    }
}
