//! Caller-side backoff for rate-limited transports
//!
//! The transport refuses instead of queueing, so whoever knows a call is worth
//! repeating wraps it here. Only [`Error::RateLimited`] is retried; any other
//! failure is returned on the spot.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Bounded retry on rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: usize,
    /// Pause after each rate-limited attempt
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `op` until it stops reporting [`Error::RateLimited`]
    ///
    /// # Returns
    ///
    /// - `Ok(T)`: The first non-rate-limited success
    /// - `Err(Error::RetriesExceeded)`: Every attempt was rate limited
    /// - `Err(Error)`: The first other failure, unchanged
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        for attempt in 1..=self.max_attempts {
            match op().await {
                Err(Error::RateLimited) => {
                    debug!(
                        "Rate limited (attempt {}/{}), backing off {:?}",
                        attempt, self.max_attempts, self.delay
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
                other => return other,
            }
        }

        Err(Error::RetriesExceeded {
            attempts: self.max_attempts,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(500))
    }
}
