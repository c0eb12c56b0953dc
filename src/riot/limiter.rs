//! Token-bucket rate limiting for the Riot API.
//!
//! Two layers of quotas apply to every request: the static application-wide
//! quota (configured, e.g. `"20:1,100:120"`) and per-method quotas discovered
//! at runtime from `X-Method-Rate-Limit` response headers. Buckets refill
//! proportionally to elapsed wall-clock time and never exceed capacity.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use tracing::warn;

#[derive(Debug)]
pub struct RateLimitBucket {
    capacity: u32,
    window: Duration,
    tokens: u32,
    last_refill: Instant,
}

impl RateLimitBucket {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            window,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Take one token if available.
    pub fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);

        if elapsed >= self.window {
            self.tokens = self.capacity;
            self.last_refill = now;
        } else {
            let earned =
                (elapsed.as_secs_f64() / self.window.as_secs_f64() * self.capacity as f64) as u32;
            if earned > 0 {
                self.tokens = (self.tokens + earned).min(self.capacity);
                self.last_refill = now;
            }
        }
    }

    #[cfg(test)]
    fn tokens(&mut self) -> u32 {
        self.refill();
        self.tokens
    }
}

/// Combined application-wide and per-method limiter.
#[derive(Debug)]
pub struct RateLimiter {
    app_buckets: Mutex<Vec<RateLimitBucket>>,
    method_buckets: Mutex<HashMap<String, Vec<RateLimitBucket>>>,
}

impl RateLimiter {
    /// `app_limit` is a comma separated list of `count:window_seconds` pairs.
    pub fn new(app_limit: &str) -> Self {
        Self {
            app_buckets: Mutex::new(parse_limit_spec(app_limit)),
            method_buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token from every applicable bucket. Returns false as soon as
    /// any bucket is empty; the caller backs off and tries the whole request
    /// again, so partially consumed tokens are deliberately not refunded.
    pub fn try_acquire(&self, endpoint: &str) -> bool {
        let mut app = self.app_buckets.lock().expect("limiter lock poisoned");
        for bucket in app.iter_mut() {
            if !bucket.try_acquire() {
                return false;
            }
        }
        drop(app);

        let mut methods = self.method_buckets.lock().expect("limiter lock poisoned");
        if let Some(buckets) = methods.get_mut(endpoint) {
            for bucket in buckets.iter_mut() {
                if !bucket.try_acquire() {
                    return false;
                }
            }
        }
        true
    }

    /// Replace the bucket set for a logical endpoint from an
    /// `X-Method-Rate-Limit` header value.
    pub fn update_method_limits(&self, endpoint: &str, header: &str) {
        let buckets = parse_limit_spec(header);
        if buckets.is_empty() {
            return;
        }
        self.method_buckets
            .lock()
            .expect("limiter lock poisoned")
            .insert(endpoint.to_string(), buckets);
    }
}

fn parse_limit_spec(spec: &str) -> Vec<RateLimitBucket> {
    let buckets: Vec<_> = spec
        .split(',')
        .filter(|pair| !pair.trim().is_empty())
        .filter_map(|pair| {
            let (count, seconds) = pair.trim().split_once(':')?;
            let count: u32 = count.parse().ok()?;
            let seconds: u64 = seconds.parse().ok()?;
            Some(RateLimitBucket::new(count, Duration::from_secs(seconds)))
        })
        .collect();

    if buckets.is_empty() && !spec.trim().is_empty() {
        warn!(spec, "unparseable rate limit spec, no buckets created");
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_exhausts_after_capacity_acquisitions() {
        let mut bucket = RateLimitBucket::new(3, Duration::from_secs(60));

        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn bucket_refills_proportionally_to_elapsed_time() {
        let mut bucket = RateLimitBucket::new(10, Duration::from_millis(500));
        for _ in 0..10 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());

        // 40% of the window => 4 tokens earned.
        std::thread::sleep(Duration::from_millis(200));
        let tokens = bucket.tokens();
        assert!((3..=5).contains(&tokens), "earned {tokens} tokens");
    }

    #[test]
    fn bucket_never_exceeds_capacity() {
        let mut bucket = RateLimitBucket::new(2, Duration::from_millis(50));
        assert!(bucket.try_acquire());

        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(bucket.tokens(), 2);
    }

    #[test]
    fn limiter_parses_multi_window_spec() {
        let limiter = RateLimiter::new("2:1,100:120");

        assert!(limiter.try_acquire("league/entries"));
        assert!(limiter.try_acquire("league/entries"));
        // First window (2 per second) is exhausted.
        assert!(!limiter.try_acquire("league/entries"));
    }

    #[test]
    fn method_limits_replace_previous_buckets() {
        let limiter = RateLimiter::new("1000:120");
        limiter.update_method_limits("spectator/active-games", "1:60");

        assert!(limiter.try_acquire("spectator/active-games"));
        assert!(!limiter.try_acquire("spectator/active-games"));
        // Other endpoints only see the app-wide quota.
        assert!(limiter.try_acquire("match/ids"));

        limiter.update_method_limits("spectator/active-games", "5:60");
        assert!(limiter.try_acquire("spectator/active-games"));
    }

    #[test]
    fn malformed_specs_are_ignored() {
        let limiter = RateLimiter::new("not-a-spec");
        assert!(limiter.try_acquire("anything"));
    }
}
