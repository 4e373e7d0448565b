use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use url::Url;

/// Per-origin minimum-interval gate for outbound HTTP. One instance is owned
/// by the scrape stage and shared across all of its tasks for the lifetime
/// of a run.
///
/// The next free slot for an origin is reserved while the map lock is held;
/// only the sleep happens outside it. Two tasks racing on the same origin
/// therefore get distinct slots even on a multi-threaded runtime.
pub struct RateLimiter {
    interval: Duration,
    next_free: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_free: Mutex::new(HashMap::new()),
        }
    }

    /// Block until at least `interval` has passed since the previous request
    /// to this URL's origin, then claim the slot.
    pub async fn wait(&self, url: &str) {
        let origin = origin_key(url);
        let slot = {
            let mut map = self.next_free.lock().await;
            let now = Instant::now();
            let slot = match map.get(&origin) {
                Some(next) if *next > now => *next,
                _ => now,
            };
            map.insert(origin, slot + self.interval);
            slot
        };
        sleep_until(slot).await;
    }
}

/// Scheme://host:port of the URL, or the raw string when it does not parse.
fn origin_key(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_else(|_| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const INTERVAL: Duration = Duration::from_millis(1200);

    #[tokio::test(start_paused = true)]
    async fn test_same_origin_requests_are_spaced() {
        let limiter = RateLimiter::new(INTERVAL);
        let start = Instant::now();

        limiter.wait("https://example.com/a").await;
        limiter.wait("https://example.com/b").await;

        assert!(start.elapsed() >= INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_origins_do_not_block() {
        let limiter = RateLimiter::new(INTERVAL);
        let start = Instant::now();

        limiter.wait("https://example.com/a").await;
        limiter.wait("https://other.org/b").await;

        assert!(start.elapsed() < INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_get_distinct_slots() {
        let limiter = Arc::new(RateLimiter::new(INTERVAL));
        let start = Instant::now();

        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.wait("https://example.com/x").await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        // Three requests occupy slots 0s, 1.2s and 2.4s.
        assert!(start.elapsed() >= INTERVAL * 2);
    }

    #[test]
    fn test_origin_key_strips_path() {
        assert_eq!(
            origin_key("https://example.com/some/path?q=1"),
            "https://example.com"
        );
        assert_eq!(origin_key("not a url"), "not a url");
    }
}
