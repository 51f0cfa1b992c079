// Per-IP sliding-window limiters and the per-user activity tracker.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Maps larger than this are pruned of idle keys before the next insert.
const PRUNE_THRESHOLD: usize = 1000;

/// Hard cap on tracked keys. A full map drops its least recently active key.
pub const MAX_TRACKED: usize = 10_000;

/// Keep timestamps inside `window`; admit and record `now` if fewer than `max` remain.
pub fn check_rate_limit(
    entries: &mut Vec<Instant>,
    now: Instant,
    window: Duration,
    max: usize,
) -> bool {
    entries.retain(|t| now.duration_since(*t) < window);
    if entries.len() >= max {
        return false;
    }
    entries.push(now);
    true
}

pub struct RateLimiter {
    window: Duration,
    max: usize,
    capacity: usize,
    hits: Mutex<HashMap<IpAddr, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max: usize) -> Self {
        Self {
            window,
            max,
            capacity: MAX_TRACKED,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// 5 attempts per 15 minutes.
    pub fn login() -> Self {
        Self::new(Duration::from_secs(15 * 60), 5)
    }

    /// 5 accounts per hour.
    pub fn register() -> Self {
        Self::new(Duration::from_secs(3600), 5)
    }

    /// 100 catalog calls per minute.
    pub fn catalog() -> Self {
        Self::new(Duration::from_secs(60), 100)
    }

    pub async fn tracked(&self) -> usize {
        self.hits.lock().await.len()
    }

    pub async fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now()).await
    }

    pub async fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut hits = self.hits.lock().await;
        if hits.len() > PRUNE_THRESHOLD {
            let window = self.window;
            hits.retain(|_, entries| {
                entries.retain(|t| now.duration_since(*t) < window);
                !entries.is_empty()
            });
        }
        if hits.len() >= self.capacity && !hits.contains_key(&ip) {
            let stalest = hits
                .iter()
                .min_by_key(|(_, entries)| entries.last().copied())
                .map(|(key, _)| *key);
            if let Some(key) = stalest {
                hits.remove(&key);
            }
        }
        let entries = hits.entry(ip).or_default();
        check_rate_limit(entries, now, self.window, self.max)
    }
}

struct Activity {
    count: u32,
    start: Instant,
}

/// Counts requests per username in fixed windows. A user crossing the limit is
/// reported once and their count starts over.
pub struct ActivityTracker {
    window: Duration,
    limit: u32,
    capacity: usize,
    users: Mutex<HashMap<String, Activity>>,
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 60)
    }
}

impl ActivityTracker {
    pub fn new(window: Duration, limit: u32) -> Self {
        Self {
            window,
            limit,
            capacity: MAX_TRACKED,
            users: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Returns the request count when this request pushes `username` over the limit.
    pub async fn record(&self, username: &str, now: Instant) -> Option<u32> {
        let mut users = self.users.lock().await;
        if users.len() > PRUNE_THRESHOLD {
            let window = self.window;
            users.retain(|_, a| now.duration_since(a.start) <= window);
        }
        if users.len() >= self.capacity && !users.contains_key(username) {
            let stalest = users
                .iter()
                .min_by_key(|(_, a)| a.start)
                .map(|(name, _)| name.clone());
            if let Some(name) = stalest {
                users.remove(&name);
            }
        }

        let activity = users.entry(username.to_string()).or_insert(Activity {
            count: 0,
            start: now,
        });
        if now.duration_since(activity.start) > self.window {
            activity.count = 1;
            activity.start = now;
        } else {
            activity.count += 1;
        }

        if activity.count > self.limit {
            let count = activity.count;
            activity.count = 0;
            return Some(count);
        }
        None
    }

    pub async fn tracked(&self) -> usize {
        self.users.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn window_admits_up_to_max() {
        let now = Instant::now();
        let window = Duration::from_secs(60);
        let mut entries = Vec::new();
        for _ in 0..3 {
            assert!(check_rate_limit(&mut entries, now, window, 3));
        }
        assert!(!check_rate_limit(&mut entries, now, window, 3));
        assert!(check_rate_limit(&mut entries, now + window, window, 3));
    }

    #[tokio::test]
    async fn login_limiter_blocks_sixth_attempt() {
        let limiter = RateLimiter::login();
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let other = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        for _ in 0..5 {
            assert!(limiter.check(ip).await);
        }
        assert!(!limiter.check(ip).await);
        assert!(limiter.check(other).await);
    }

    #[tokio::test]
    async fn tracker_reports_once_then_restarts() {
        let tracker = ActivityTracker::new(Duration::from_secs(60), 3);
        let now = Instant::now();
        for _ in 0..3 {
            assert_eq!(tracker.record("ana", now).await, None);
        }
        assert_eq!(tracker.record("ana", now).await, Some(4));
        assert_eq!(tracker.record("ana", now).await, None);
    }

    #[tokio::test]
    async fn tracker_window_resets_count() {
        let tracker = ActivityTracker::new(Duration::from_secs(60), 2);
        let start = Instant::now();
        tracker.record("ana", start).await;
        tracker.record("ana", start).await;
        let later = start + Duration::from_secs(61);
        assert_eq!(tracker.record("ana", later).await, None);
        assert_eq!(tracker.record("ana", later).await, None);
        assert_eq!(tracker.record("ana", later).await, Some(3));
    }

    #[tokio::test]
    async fn tracker_evicts_idle_users_past_threshold() {
        let tracker = ActivityTracker::default();
        let start = Instant::now();
        for i in 0..=PRUNE_THRESHOLD {
            tracker.record(&format!("user{i}"), start).await;
        }
        assert_eq!(tracker.tracked().await, PRUNE_THRESHOLD + 1);
        tracker
            .record("fresh", start + Duration::from_secs(120))
            .await;
        assert_eq!(tracker.tracked().await, 1);
    }

    #[tokio::test]
    async fn full_limiter_drops_least_recent_ip() {
        let limiter = RateLimiter::catalog().with_capacity(3);
        let start = Instant::now();
        let ip = |n: u8| IpAddr::V4(Ipv4Addr::new(10, 0, 0, n));
        for n in 1..=3 {
            assert!(limiter.check_at(ip(n), start + Duration::from_secs(n.into())).await);
        }
        assert!(limiter.check_at(ip(4), start + Duration::from_secs(4)).await);
        assert_eq!(limiter.tracked().await, 3);

        // An evicted key comes back with an empty history.
        let strict = RateLimiter::login().with_capacity(1);
        for _ in 0..5 {
            assert!(strict.check_at(ip(1), start).await);
        }
        assert!(!strict.check_at(ip(1), start).await);
        assert!(strict.check_at(ip(2), start).await);
        assert!(strict.check_at(ip(1), start).await);
    }

    #[tokio::test]
    async fn full_tracker_drops_oldest_window() {
        let tracker = ActivityTracker::default().with_capacity(2);
        let start = Instant::now();
        tracker.record("ana", start).await;
        tracker.record("bia", start + Duration::from_secs(1)).await;
        tracker.record("caio", start + Duration::from_secs(2)).await;
        assert_eq!(tracker.tracked().await, 2);

        // Known keys never evict.
        tracker.record("caio", start + Duration::from_secs(3)).await;
        assert_eq!(tracker.tracked().await, 2);
    }

    #[tokio::test]
    async fn tracker_stays_bounded_within_one_window() {
        let tracker = ActivityTracker::default().with_capacity(50);
        let now = Instant::now();
        for i in 0..500 {
            tracker.record(&format!("user{i}"), now).await;
        }
        assert_eq!(tracker.tracked().await, 50);
    }
}
