//! Per-credential rate limiting.
//!
//! A sliding window limiter keyed by API key. The limit is supplied per call
//! so each credential can carry its own budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// A sliding window rate limiter that tracks requests per key.
///
/// Each key can make at most `limit` requests within `window`. Every call
/// to [`allow`](Self::allow) counts, including the ones it rejects.
pub struct RateLimiter {
    /// Request instants per key
    requests: DashMap<String, Vec<Instant>>,
    /// Limit used when a credential carries none
    default_limit: u32,
    /// Time window for rate limiting
    window: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Arguments
    ///
    /// * `default_limit` - Limit applied when a caller passes zero
    /// * `window` - Duration of the sliding window
    pub fn new(default_limit: u32, window: Duration) -> Self {
        Self {
            requests: DashMap::new(),
            default_limit,
            window,
        }
    }

    /// Check if a request for the given key is allowed and record it.
    ///
    /// Returns `true` if the request is allowed, `false` if rate limited.
    pub fn allow(&self, key: &str, limit: u32) -> bool {
        self.allow_at(key, limit, Instant::now())
    }

    pub(crate) fn allow_at(&self, key: &str, limit: u32, now: Instant) -> bool {
        let limit = if limit == 0 { self.default_limit } else { limit } as usize;

        let mut entry = self.requests.entry(key.to_string()).or_default();
        entry.retain(|&t| now.saturating_duration_since(t) < self.window);

        let allowed = entry.len() < limit;
        if allowed {
            entry.push(now);
        }
        allowed
    }

    /// Periodically clean up stale entries.
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&self, now: Instant) {
        self.requests.retain(|_, times| {
            times.retain(|&t| now.saturating_duration_since(t) < self.window);
            !times.is_empty()
        });
    }

    /// Get the number of keys being tracked.
    pub fn tracked_keys(&self) -> usize {
        self.requests.len()
    }

    /// Start a background cleanup task.
    ///
    /// This spawns a tokio task that periodically cleans up stale rate limit entries
    /// to prevent unbounded memory growth.
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration) {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            loop {
                interval_timer.tick().await;
                limiter.cleanup();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(100, Duration::from_secs(60))
    }

    #[test]
    fn test_rate_limiter_allows_under_limit() {
        let limiter = limiter();
        let now = Instant::now();

        for _ in 0..5 {
            assert!(limiter.allow_at("xui_a", 5, now));
        }
    }

    #[test]
    fn test_rate_limiter_blocks_over_limit() {
        let limiter = limiter();
        let now = Instant::now();

        assert!(limiter.allow_at("xui_a", 3, now));
        assert!(limiter.allow_at("xui_a", 3, now));
        assert!(limiter.allow_at("xui_a", 3, now));

        assert!(!limiter.allow_at("xui_a", 3, now));
    }

    #[test]
    fn test_rate_limiter_separate_keys() {
        let limiter = limiter();
        let now = Instant::now();

        assert!(limiter.allow_at("xui_a", 2, now));
        assert!(limiter.allow_at("xui_a", 2, now));
        assert!(!limiter.allow_at("xui_a", 2, now));

        assert!(limiter.allow_at("xui_b", 2, now));
        assert!(limiter.allow_at("xui_b", 2, now));
        assert!(!limiter.allow_at("xui_b", 2, now));
    }

    #[test]
    fn test_rate_limiter_window_slides() {
        let limiter = limiter();
        let start = Instant::now();

        assert!(limiter.allow_at("xui_a", 2, start));
        assert!(limiter.allow_at("xui_a", 2, start + Duration::from_secs(30)));
        assert!(!limiter.allow_at("xui_a", 2, start + Duration::from_secs(59)));

        // The first request has left the window.
        assert!(limiter.allow_at("xui_a", 2, start + Duration::from_secs(60)));
        assert!(!limiter.allow_at("xui_a", 2, start + Duration::from_secs(61)));
    }

    #[test]
    fn test_zero_limit_uses_default() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.allow_at("xui_a", 0, now));
        assert!(limiter.allow_at("xui_a", 0, now));
        assert!(!limiter.allow_at("xui_a", 0, now));
    }

    #[test]
    fn test_concurrent_callers_never_exceed_limit() {
        let limiter = Arc::new(limiter());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || (0..50).filter(|_| limiter.allow("xui_a", 25)).count())
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 25);
        assert!(!limiter.allow("xui_a", 25));
    }

    #[test]
    fn test_rate_limiter_cleanup() {
        let limiter = limiter();
        let now = Instant::now();

        limiter.allow_at("xui_a", 10, now);
        limiter.allow_at("xui_b", 10, now);
        limiter.allow_at("xui_c", 10, now + Duration::from_secs(30));
        assert_eq!(limiter.tracked_keys(), 3);

        limiter.cleanup_at(now + Duration::from_secs(61));
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
