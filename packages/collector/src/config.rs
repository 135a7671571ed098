//! Pipeline configuration.

use std::time::Duration;

/// Tunables for one collector instance.
///
/// Defaults match production behavior; tests shrink the delays.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Page ceiling per (keyword, country) target. A ceiling, not a promise:
    /// pagination stops early on the first empty page.
    pub max_pages: u32,
    /// Number of reusable detail sessions (= batch size).
    pub pool_size: usize,
    /// Base delay between enrichment batches.
    pub batch_delay: Duration,
    /// First retry waits this long.
    pub retry_base_delay: Duration,
    /// Each subsequent retry adds this much.
    pub retry_increment: Duration,
    /// Retries after the initial attempt (3 attempts total).
    pub max_retries: u32,
    /// Per-navigation timeout.
    pub nav_timeout: Duration,
    /// Validity window of the persistent URL cache.
    pub cache_ttl: Duration,
    /// Outbound notifications per second.
    pub dispatch_per_second: u32,
    /// Minimum length before a re-parsed detailed description is trusted.
    pub min_detail_len: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            pool_size: 4,
            batch_delay: Duration::from_secs(2),
            retry_base_delay: Duration::from_secs(1),
            retry_increment: Duration::from_secs(1),
            max_retries: 2,
            nav_timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(48 * 60 * 60),
            dispatch_per_second: 1,
            min_detail_len: 100,
        }
    }
}

impl CollectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_retry_delays(mut self, base: Duration, increment: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_increment = increment;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_nav_timeout(mut self, timeout: Duration) -> Self {
        self.nav_timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_dispatch_per_second(mut self, per_second: u32) -> Self {
        self.dispatch_per_second = per_second;
        self
    }

    /// Backoff before retry number `retry` (1-based): base + (retry-1) × increment.
    pub fn retry_delay(&self, retry: u32) -> Duration {
        self.retry_base_delay + self.retry_increment * retry.saturating_sub(1)
    }
}
