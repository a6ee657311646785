//! Backoff policy shared by per-model retries, retry sweeps and embedding
//! requests.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};

/// Exponential backoff without jitter.
///
/// With the default factor of 2 the first two waits are `base` and
/// `2 * base`, i.e. base delay times the attempt count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Retries of the same model before moving on.
    pub max_retries: usize,
    pub base_delay: Duration,
    pub factor: f32,
    /// Upper bound on any single wait.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    #[must_use]
    pub fn new(max_retries: usize, base_delay: Duration, factor: f32) -> Self {
        Self {
            max_retries,
            base_delay,
            factor,
            ..Self::default()
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// The `backon` builder for this policy.
    #[must_use]
    pub fn builder(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay.max(self.base_delay))
            .with_factor(self.factor)
            .with_max_times(self.max_retries)
    }

    /// A fresh schedule of waits; yields `max_retries` delays, then `None`.
    #[must_use]
    pub fn delays(&self) -> ExponentialBackoff {
        self.builder().build()
    }
}
