//! Window store: per-key request counts inside a fixed window.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::Result;

/// Rate window - tracks requests for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub count: u32,
    pub window_start: Instant,
}

impl RateWindow {
    fn fresh(now: Instant) -> Self {
        Self {
            count: 1,
            window_start: now,
        }
    }

    /// A window is expired once `now - window_start >= window`.
    pub fn is_expired(&self, window: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }

    pub fn resets_at(&self, window: Duration) -> Instant {
        self.window_start + window
    }
}

/// Storage behind a rate limiter.
///
/// Every operation on a single key is atomic with respect to the others.
/// Implementations return `Err(GatewayError::StorageFault)` when they cannot
/// read or write a window; callers must then reject the request.
pub trait WindowStore: Send + Sync {
    /// Count one request against `key` and return the resulting window.
    fn increment(&self, key: &str) -> Result<RateWindow>;

    /// Give one request back, floored at zero. No-op for unknown keys.
    fn decrement(&self, key: &str) -> Result<()>;

    /// Forget the window for `key`.
    fn reset(&self, key: &str) -> Result<()>;

    /// Forget every window.
    fn reset_all(&self) -> Result<()>;

    /// Current count for `key`; expired or missing windows read as 0.
    fn query(&self, key: &str) -> Result<u32>;

    /// Drop windows that have expired and return how many were removed.
    fn purge_expired(&self) -> Result<usize>;

    /// Window length the store expires keys after.
    fn window(&self) -> Duration;

    /// Number of tracked windows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store. Each key lives in a DashMap shard, so mutation is
/// serialized per key while distinct keys proceed in parallel.
pub struct MemoryWindowStore {
    windows: DashMap<String, RateWindow>,
    window: Duration,
}

impl MemoryWindowStore {
    pub fn new(window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            window,
        }
    }
}

impl WindowStore for MemoryWindowStore {
    fn increment(&self, key: &str) -> Result<RateWindow> {
        let now = Instant::now();

        // fast path: existing key, no allocation
        if let Some(mut entry) = self.windows.get_mut(key) {
            if entry.is_expired(self.window, now) {
                *entry = RateWindow::fresh(now);
            } else {
                entry.count = entry.count.saturating_add(1);
            }
            return Ok(*entry);
        }

        // another caller may have inserted between get_mut and entry
        let window = match self.windows.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired(self.window, now) {
                    *entry = RateWindow::fresh(now);
                } else {
                    entry.count = entry.count.saturating_add(1);
                }
                *entry
            }
            Entry::Vacant(vacant) => *vacant.insert(RateWindow::fresh(now)),
        };
        Ok(window)
    }

    fn decrement(&self, key: &str) -> Result<()> {
        if let Some(mut entry) = self.windows.get_mut(key) {
            entry.count = entry.count.saturating_sub(1);
        }
        Ok(())
    }

    fn reset(&self, key: &str) -> Result<()> {
        self.windows.remove(key);
        Ok(())
    }

    fn reset_all(&self) -> Result<()> {
        self.windows.clear();
        Ok(())
    }

    fn query(&self, key: &str) -> Result<u32> {
        let now = Instant::now();
        Ok(self
            .windows
            .get(key)
            .filter(|entry| !entry.is_expired(self.window, now))
            .map(|entry| entry.count)
            .unwrap_or(0))
    }

    fn purge_expired(&self) -> Result<usize> {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, entry| !entry.is_expired(self.window, now));
        Ok(before.saturating_sub(self.windows.len()))
    }

    fn window(&self) -> Duration {
        self.window
    }

    fn len(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn counts_every_increment_inside_window() {
        let store = MemoryWindowStore::new(MINUTE);

        for n in 1..=11 {
            let window = store.increment("global").unwrap();
            assert_eq!(window.count, n);
            assert_eq!(store.query("global").unwrap(), n);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_restarts_window_at_boundary() {
        let store = MemoryWindowStore::new(MINUTE);

        let first = store.increment("global").unwrap();
        store.increment("global").unwrap();
        store.increment("global").unwrap();

        tokio::time::advance(MINUTE - Duration::from_millis(1)).await;
        assert_eq!(store.increment("global").unwrap().count, 4);

        tokio::time::advance(Duration::from_millis(1)).await;
        let restarted = store.increment("global").unwrap();
        assert_eq!(restarted.count, 1);
        assert_eq!(restarted.window_start, first.window_start + MINUTE);
    }

    #[tokio::test(start_paused = true)]
    async fn query_treats_expired_window_as_zero_without_creating() {
        let store = MemoryWindowStore::new(MINUTE);
        store.increment("1.2.3.4").unwrap();

        tokio::time::advance(MINUTE).await;
        assert_eq!(store.query("1.2.3.4").unwrap(), 0);
        assert_eq!(store.query("5.6.7.8").unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn decrement_never_goes_below_zero() {
        let store = MemoryWindowStore::new(MINUTE);

        store.decrement("absent").unwrap();
        assert!(store.is_empty());

        store.increment("k").unwrap();
        store.decrement("k").unwrap();
        store.decrement("k").unwrap();
        assert_eq!(store.query("k").unwrap(), 0);

        assert_eq!(store.increment("k").unwrap().count, 1);
    }

    #[tokio::test]
    async fn reset_and_reset_all_forget_windows() {
        let store = MemoryWindowStore::new(MINUTE);
        for key in ["a", "b", "c"] {
            store.increment(key).unwrap();
            store.increment(key).unwrap();
        }

        store.reset("a").unwrap();
        assert_eq!(store.query("a").unwrap(), 0);
        assert_eq!(store.query("b").unwrap(), 2);

        store.reset_all().unwrap();
        for key in ["a", "b", "c"] {
            assert_eq!(store.query(key).unwrap(), 0);
        }
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired_windows() {
        let store = MemoryWindowStore::new(MINUTE);
        store.increment("old").unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        store.increment("young").unwrap();
        assert_eq!(store.purge_expired().unwrap(), 0);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.query("young").unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryWindowStore::new(MINUTE));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for _ in 0..250 {
                    store.increment("global").unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.query("global").unwrap(), 2000);
    }
}
