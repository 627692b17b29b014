//! Timestamp window and nonce cache for replay attack prevention.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::clock;
use crate::error::AuthErrorKind;

/// Rejects stale, future-dated and replayed requests.
///
/// Nonces are remembered per credential until the request timestamp they
/// arrived with leaves the acceptance window. After that point the timestamp
/// check alone rejects a replay, so the entry can be dropped.
pub struct ReplayGuard {
    /// Map of (credential key, nonce) -> unix second after which the entry is dead.
    nonces: DashMap<(String, String), i64>,
    /// Oldest accepted request age.
    max_age: Duration,
    /// Furthest a timestamp may lie in the future.
    max_skew: Duration,
}

impl ReplayGuard {
    /// Create a new replay guard.
    pub fn new(max_age: Duration, max_skew: Duration) -> Self {
        Self {
            nonces: DashMap::new(),
            max_age,
            max_skew,
        }
    }

    /// Check the timestamp window and record the nonce.
    pub fn accept(&self, credential: &str, timestamp: i64, nonce: &str) -> Result<(), AuthErrorKind> {
        self.accept_at(credential, timestamp, nonce, clock::now_secs())
    }

    /// Same as [`accept`](Self::accept) with an explicit current time.
    pub(crate) fn accept_at(
        &self,
        credential: &str,
        timestamp: i64,
        nonce: &str,
        now: i64,
    ) -> Result<(), AuthErrorKind> {
        let max_age = self.max_age.as_secs() as i64;
        let max_skew = self.max_skew.as_secs() as i64;

        let age = now.saturating_sub(timestamp);
        if age > max_age || -age > max_skew {
            return Err(AuthErrorKind::Expired { skew_seconds: age });
        }

        let expires_at = timestamp.saturating_add(max_age);
        match self.nonces.entry((credential.to_string(), nonce.to_string())) {
            Entry::Occupied(mut entry) => {
                if *entry.get() >= now {
                    return Err(AuthErrorKind::Replayed);
                }
                // Dead entry that cleanup has not reached yet.
                entry.insert(expires_at);
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
            }
        }

        Ok(())
    }

    /// Get the current number of stored nonces (for monitoring).
    pub fn len(&self) -> usize {
        self.nonces.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.nonces.is_empty()
    }

    /// Force cleanup of expired nonces.
    pub fn cleanup(&self) {
        self.cleanup_at(clock::now_secs());
    }

    fn cleanup_at(&self, now: i64) {
        self.nonces.retain(|_, expires_at| *expires_at >= now);
    }

    /// Start a background cleanup task.
    ///
    /// This spawns a tokio task that periodically cleans up expired nonces.
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration) {
        let guard = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            loop {
                interval_timer.tick().await;
                guard.cleanup();
                debug!(remaining = guard.len(), "Nonce cache cleaned");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn guard() -> ReplayGuard {
        ReplayGuard::new(Duration::from_secs(300), Duration::from_secs(60))
    }

    #[test]
    fn test_fresh_request_accepted() {
        let guard = guard();
        assert!(guard.accept_at("key", NOW, "nonce1", NOW).is_ok());
        assert!(guard.accept_at("key", NOW, "nonce2", NOW).is_ok());
    }

    #[test]
    fn test_window_edges() {
        let guard = guard();
        assert!(guard.accept_at("key", NOW - 300, "a", NOW).is_ok());
        assert!(guard.accept_at("key", NOW + 60, "b", NOW).is_ok());

        assert!(matches!(
            guard.accept_at("key", NOW - 301, "c", NOW),
            Err(AuthErrorKind::Expired { .. })
        ));
        assert!(matches!(
            guard.accept_at("key", NOW + 61, "d", NOW),
            Err(AuthErrorKind::Expired { .. })
        ));
    }

    #[test]
    fn test_stale_request_does_not_record_nonce() {
        let guard = guard();
        assert!(guard.accept_at("key", NOW - 310, "nonce", NOW).is_err());
        assert!(guard.is_empty());
    }

    #[test]
    fn test_duplicate_nonce_rejected() {
        let guard = guard();
        assert!(guard.accept_at("key", NOW, "nonce1", NOW).is_ok());
        assert_eq!(
            guard.accept_at("key", NOW, "nonce1", NOW + 10),
            Err(AuthErrorKind::Replayed)
        );
    }

    #[test]
    fn test_nonce_scoped_per_credential() {
        let guard = guard();
        assert!(guard.accept_at("key-a", NOW, "shared", NOW).is_ok());
        assert!(guard.accept_at("key-b", NOW, "shared", NOW).is_ok());
        assert_eq!(
            guard.accept_at("key-a", NOW, "shared", NOW),
            Err(AuthErrorKind::Replayed)
        );
    }

    #[test]
    fn test_replay_rejected_until_window_closes() {
        let guard = guard();
        assert!(guard.accept_at("key", NOW, "nonce", NOW).is_ok());

        // Still inside the window: replay.
        assert_eq!(
            guard.accept_at("key", NOW, "nonce", NOW + 300),
            Err(AuthErrorKind::Replayed)
        );

        // Past the window: the timestamp itself is rejected.
        assert!(matches!(
            guard.accept_at("key", NOW, "nonce", NOW + 301),
            Err(AuthErrorKind::Expired { .. })
        ));
    }

    #[test]
    fn test_cleanup_drops_dead_entries() {
        let guard = guard();
        guard.accept_at("key", NOW, "old", NOW).unwrap();
        guard.accept_at("key", NOW + 200, "new", NOW + 200).unwrap();
        assert_eq!(guard.len(), 2);

        guard.cleanup_at(NOW + 301);
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn test_concurrent_duplicates_accept_once() {
        let guard = Arc::new(guard());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                std::thread::spawn(move || guard.accept_at("key", NOW, "race", NOW).is_ok())
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(accepted, 1);
    }
}
