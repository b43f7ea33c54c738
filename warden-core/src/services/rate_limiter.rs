//! Per-identifier lockout after repeated failed logins.
//!
//! Failed attempts are counted per opaque identifier (typically
//! `username|ip`) inside a sliding window. Reaching the threshold locks the
//! identifier out for a fixed duration; further failures during the lockout
//! are counted but never move the lockout deadline.
//!
//! # Example
//!
//! ```rust
//! use warden_core::config::RateLimitConfig;
//! use warden_core::services::LoginRateLimiter;
//!
//! let limiter = LoginRateLimiter::new(RateLimitConfig::default());
//!
//! let (locked, _) = limiter.is_locked_out("alice|203.0.113.7");
//! if !locked {
//!     // verify the password, then on failure:
//!     let status = limiter.record_failed_attempt("alice|203.0.113.7");
//!     assert_eq!(status.remaining_attempts, 4);
//! }
//! ```
//!
//! # State per identifier
//!
//! `Unknown → Tracking(count < max) → LockedOut(until T) → (T elapses) → Tracking | Evicted`

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    attempt::{AttemptRecord, LockoutStatus},
    config::RateLimitConfig,
    pool::{Allocator, HeapAllocator, ObjectPool},
};

/// Tracks failed login attempts and lockouts.
///
/// # Thread Safety
///
/// Every update to one identifier runs while holding that identifier's map
/// entry, so concurrent failures on the same identifier are never lost.
/// Identifiers live in a sharded map; there is no global lock.
pub struct LoginRateLimiter<A: Allocator<AttemptRecord> = ObjectPool<AttemptRecord>> {
    records: DashMap<String, AttemptRecord>,
    allocator: A,
    config: RateLimitConfig,
}

impl LoginRateLimiter<ObjectPool<AttemptRecord>> {
    /// Create a limiter that recycles attempt records through a pool.
    pub fn new(config: RateLimitConfig) -> Self {
        let pool = ObjectPool::new(config.pool_capacity);
        Self::with_allocator(config, pool)
    }
}

impl LoginRateLimiter<HeapAllocator<AttemptRecord>> {
    /// Create a limiter that allocates a new record for every identifier.
    pub fn unpooled(config: RateLimitConfig) -> Self {
        Self::with_allocator(config, HeapAllocator::new())
    }
}

impl<A: Allocator<AttemptRecord>> LoginRateLimiter<A> {
    pub fn with_allocator(config: RateLimitConfig, allocator: A) -> Self {
        Self {
            records: DashMap::new(),
            allocator,
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Number of identifiers currently tracked.
    pub fn tracked_identifiers(&self) -> usize {
        self.records.len()
    }

    /// Record a failed login for `identifier` and return its updated status.
    pub fn record_failed_attempt(&self, identifier: &str) -> LockoutStatus {
        self.record_failed_attempt_at(identifier, Utc::now())
    }

    pub fn record_failed_attempt_at(&self, identifier: &str, now: DateTime<Utc>) -> LockoutStatus {
        let (status, newly_locked) = match self.records.entry(identifier.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                let newly_locked = self.apply_failure(record, now);
                (self.status_of(record, now), newly_locked)
            }
            Entry::Vacant(vacant) => {
                let mut record = self.allocator.rent();
                record.start(identifier, now);
                let newly_locked = self.lock_if_exceeded(&mut record, now);
                let status = self.status_of(&record, now);
                vacant.insert(record);
                (status, newly_locked)
            }
        };

        if newly_locked {
            tracing::warn!(
                identifier = %identifier,
                failed_attempts = status.failed_attempts,
                locked_until = ?status.locked_until,
                "Identifier locked out after repeated failed logins"
            );
        }

        status
    }

    /// Whether `identifier` is locked out, and for how much longer.
    ///
    /// An expired lockout evicts the record and reports `(false, 0)`.
    pub fn is_locked_out(&self, identifier: &str) -> (bool, Duration) {
        self.is_locked_out_at(identifier, Utc::now())
    }

    pub fn is_locked_out_at(&self, identifier: &str, now: DateTime<Utc>) -> (bool, Duration) {
        let locked_until = match self.records.get(identifier) {
            Some(record) => record.locked_out_until,
            None => return (false, Duration::zero()),
        };

        match locked_until {
            Some(until) if now < until => (true, until - now),
            Some(_) => {
                if self.evict_if(identifier, |record| record.lock_expired_at(now)) {
                    tracing::debug!(identifier = %identifier, "Lockout expired, record evicted");
                }
                (false, Duration::zero())
            }
            None => (false, Duration::zero()),
        }
    }

    /// Forget everything about `identifier`, typically after a successful login.
    ///
    /// Returns `true` if the identifier was being tracked.
    pub fn reset_attempts(&self, identifier: &str) -> bool {
        match self.records.remove(identifier) {
            Some((_, record)) => {
                self.allocator.release(record);
                true
            }
            None => false,
        }
    }

    /// Failures left before lockout; zero while locked out.
    pub fn get_remaining_attempts(&self, identifier: &str) -> u32 {
        self.get_remaining_attempts_at(identifier, Utc::now())
    }

    pub fn get_remaining_attempts_at(&self, identifier: &str, now: DateTime<Utc>) -> u32 {
        self.records
            .get(identifier)
            .map_or(self.config.max_attempts, |record| {
                self.remaining_for(&record, now)
            })
    }

    pub fn status(&self, identifier: &str) -> LockoutStatus {
        self.status_at(identifier, Utc::now())
    }

    pub fn status_at(&self, identifier: &str, now: DateTime<Utc>) -> LockoutStatus {
        match self.records.get(identifier) {
            Some(record) => self.status_of(&record, now),
            None => LockoutStatus {
                identifier: identifier.to_string(),
                failed_attempts: 0,
                remaining_attempts: self.config.max_attempts,
                locked_until: None,
            },
        }
    }

    /// Evict records whose last failure is older than the lockout duration.
    ///
    /// Returns the number of records removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now())
    }

    pub fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let idle_for = self.config.lockout_duration;
        let is_idle =
            |record: &AttemptRecord| now - record.last_attempt_at > idle_for && !record.is_locked_at(now);

        let candidates: Vec<String> = self
            .records
            .iter()
            .filter(|entry| is_idle(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();

        let evicted = candidates
            .iter()
            .filter(|identifier| self.evict_if(identifier.as_str(), is_idle))
            .count();

        if evicted > 0 {
            tracing::debug!(
                evicted = evicted,
                tracked = self.records.len(),
                "Swept idle login attempt records"
            );
        }

        evicted
    }

    /// Start the periodic cleanup sweep.
    ///
    /// The task runs [`cleanup`](Self::cleanup) every `cleanup_interval` until
    /// `shutdown` changes or its sender is dropped.
    pub fn start_cleanup_task(
        self: &Arc<Self>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        let period = self
            .config
            .cleanup_interval
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(300));

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(period);
            interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        limiter.cleanup();
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down login attempt cleanup task");
                        break;
                    }
                }
            }
        })
    }

    /// Apply one failure to an existing record. Returns `true` if this failure
    /// triggered the lockout.
    fn apply_failure(&self, record: &mut AttemptRecord, now: DateTime<Utc>) -> bool {
        if record.is_locked_at(now) {
            // Counted, but the deadline stays where it is.
            record.failed_attempts = record.failed_attempts.saturating_add(1);
            record.last_attempt_at = now;
            return false;
        }

        if record.lock_expired_at(now) || record.window_expired_at(now, self.config.attempt_window)
        {
            record.restart(now);
        } else {
            record.failed_attempts = record.failed_attempts.saturating_add(1);
            record.last_attempt_at = now;
        }

        self.lock_if_exceeded(record, now)
    }

    fn lock_if_exceeded(&self, record: &mut AttemptRecord, now: DateTime<Utc>) -> bool {
        if record.locked_out_until.is_none() && record.failed_attempts >= self.config.max_attempts {
            record.locked_out_until = Some(now + self.config.lockout_duration);
            return true;
        }
        false
    }

    fn remaining_for(&self, record: &AttemptRecord, now: DateTime<Utc>) -> u32 {
        if record.is_locked_at(now) {
            return 0;
        }
        if record.lock_expired_at(now) || record.window_expired_at(now, self.config.attempt_window)
        {
            return self.config.max_attempts;
        }
        self.config
            .max_attempts
            .saturating_sub(record.failed_attempts)
    }

    fn status_of(&self, record: &AttemptRecord, now: DateTime<Utc>) -> LockoutStatus {
        LockoutStatus {
            identifier: record.identifier.clone(),
            failed_attempts: record.failed_attempts,
            remaining_attempts: self.remaining_for(record, now),
            locked_until: record.locked_out_until.filter(|until| now < *until),
        }
    }

    fn evict_if(&self, identifier: &str, predicate: impl Fn(&AttemptRecord) -> bool) -> bool {
        match self
            .records
            .remove_if(identifier, |_, record| predicate(record))
        {
            Some((_, record)) => {
                self.allocator.release(record);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const ALICE: &str = "alice|1.2.3.4";

    fn config() -> RateLimitConfig {
        RateLimitConfig {
            max_attempts: 5,
            lockout_duration: Duration::minutes(15),
            attempt_window: Duration::minutes(5),
            ..Default::default()
        }
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_first_failure_starts_tracking() {
        let limiter = LoginRateLimiter::new(config());
        let status = limiter.record_failed_attempt_at(ALICE, start());

        assert_eq!(status.failed_attempts, 1);
        assert_eq!(status.remaining_attempts, 4);
        assert!(!status.is_locked());
        assert_eq!(limiter.tracked_identifiers(), 1);
    }

    #[test]
    fn test_lockout_after_max_attempts() {
        let limiter = LoginRateLimiter::new(config());
        let t0 = start();

        for i in 0..4 {
            let status = limiter.record_failed_attempt_at(ALICE, t0 + Duration::seconds(i * 10));
            assert!(!status.is_locked());
        }
        let last = t0 + Duration::seconds(50);
        let status = limiter.record_failed_attempt_at(ALICE, last);

        assert!(status.is_locked());
        assert_eq!(status.remaining_attempts, 0);
        assert_eq!(status.locked_until, Some(last + Duration::minutes(15)));

        let (locked, remaining) = limiter.is_locked_out_at(ALICE, last);
        assert!(locked);
        assert_eq!(remaining, Duration::minutes(15));
        assert_eq!(limiter.get_remaining_attempts_at(ALICE, last), 0);
    }

    #[test]
    fn test_failure_during_lockout_does_not_move_deadline() {
        let limiter = LoginRateLimiter::new(config());
        let t0 = start();
        for i in 0..5 {
            limiter.record_failed_attempt_at(ALICE, t0 + Duration::seconds(i));
        }
        let deadline = limiter.status_at(ALICE, t0).locked_until.unwrap();

        let sixth = limiter.record_failed_attempt_at(ALICE, t0 + Duration::minutes(1));
        assert_eq!(sixth.failed_attempts, 6);
        assert_eq!(sixth.locked_until, Some(deadline));

        // Even once the attempt window has passed, the lockout stands.
        let later = limiter.record_failed_attempt_at(ALICE, t0 + Duration::minutes(10));
        assert_eq!(later.failed_attempts, 7);
        assert_eq!(later.locked_until, Some(deadline));
    }

    #[test]
    fn test_stale_window_restarts_count() {
        let limiter = LoginRateLimiter::new(config());
        let t0 = start();
        limiter.record_failed_attempt_at(ALICE, t0);
        limiter.record_failed_attempt_at(ALICE, t0 + Duration::minutes(1));

        let status = limiter.record_failed_attempt_at(ALICE, t0 + Duration::minutes(6));
        assert_eq!(status.failed_attempts, 1);
        assert_eq!(status.remaining_attempts, 4);
    }

    #[test]
    fn test_remaining_attempts_for_stale_window_is_full() {
        let limiter = LoginRateLimiter::new(config());
        let t0 = start();
        limiter.record_failed_attempt_at(ALICE, t0);
        limiter.record_failed_attempt_at(ALICE, t0);

        assert_eq!(limiter.get_remaining_attempts_at(ALICE, t0), 3);
        assert_eq!(
            limiter.get_remaining_attempts_at(ALICE, t0 + Duration::minutes(6)),
            5
        );
    }

    #[test]
    fn test_expired_lockout_is_evicted_lazily() {
        let limiter = LoginRateLimiter::new(config());
        let t0 = start();
        for _ in 0..5 {
            limiter.record_failed_attempt_at(ALICE, t0);
        }
        assert_eq!(limiter.allocator().available(), 0);

        let after = t0 + Duration::minutes(15);
        assert_eq!(limiter.is_locked_out_at(ALICE, after), (false, Duration::zero()));
        assert_eq!(limiter.tracked_identifiers(), 0);
        assert_eq!(limiter.allocator().available(), 1);
        assert_eq!(limiter.get_remaining_attempts_at(ALICE, after), 5);
    }

    #[test]
    fn test_failure_after_expired_lockout_starts_fresh() {
        let limiter = LoginRateLimiter::new(config());
        let t0 = start();
        for _ in 0..5 {
            limiter.record_failed_attempt_at(ALICE, t0);
        }

        let status = limiter.record_failed_attempt_at(ALICE, t0 + Duration::minutes(16));
        assert_eq!(status.failed_attempts, 1);
        assert!(!status.is_locked());
    }

    #[test]
    fn test_reset_attempts() {
        let limiter = LoginRateLimiter::new(config());
        let t0 = start();
        for _ in 0..3 {
            limiter.record_failed_attempt_at(ALICE, t0);
        }

        assert!(limiter.reset_attempts(ALICE));
        assert!(!limiter.reset_attempts(ALICE));
        assert_eq!(limiter.get_remaining_attempts_at(ALICE, t0), 5);
        assert_eq!(limiter.status_at(ALICE, t0).failed_attempts, 0);
    }

    #[test]
    fn test_reset_clears_active_lockout() {
        let limiter = LoginRateLimiter::new(config());
        let t0 = start();
        for _ in 0..5 {
            limiter.record_failed_attempt_at(ALICE, t0);
        }

        limiter.reset_attempts(ALICE);
        assert!(!limiter.is_locked_out_at(ALICE, t0).0);
    }

    #[test]
    fn test_identifiers_are_independent() {
        let limiter = LoginRateLimiter::new(config());
        let t0 = start();
        for _ in 0..5 {
            limiter.record_failed_attempt_at(ALICE, t0);
        }

        assert!(limiter.is_locked_out_at(ALICE, t0).0);
        assert!(!limiter.is_locked_out_at("alice|5.6.7.8", t0).0);
        assert_eq!(limiter.get_remaining_attempts_at("bob|1.2.3.4", t0), 5);
    }

    #[test]
    fn test_cleanup_evicts_idle_records() {
        let limiter = LoginRateLimiter::new(config());
        let t0 = start();
        limiter.record_failed_attempt_at("idle|10.0.0.1", t0);
        limiter.record_failed_attempt_at("recent|10.0.0.2", t0 + Duration::minutes(10));

        let evicted = limiter.cleanup_at(t0 + Duration::minutes(16));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked_identifiers(), 1);
        assert_eq!(limiter.status_at("recent|10.0.0.2", t0).failed_attempts, 1);
        assert_eq!(limiter.allocator().available(), 1);
    }

    #[test]
    fn test_pooled_records_do_not_leak_state() {
        let limiter = LoginRateLimiter::new(config());
        let t0 = start();
        for _ in 0..5 {
            limiter.record_failed_attempt_at("mallory|6.6.6.6", t0);
        }
        limiter.reset_attempts("mallory|6.6.6.6");
        assert_eq!(limiter.allocator().available(), 1);

        let status = limiter.record_failed_attempt_at(ALICE, t0);
        assert_eq!(status.identifier, ALICE);
        assert_eq!(status.failed_attempts, 1);
        assert!(!status.is_locked());
        assert_eq!(limiter.allocator().available(), 0);
    }

    #[test]
    fn test_pooled_and_unpooled_behave_identically() {
        let pooled = LoginRateLimiter::new(config());
        let plain = LoginRateLimiter::unpooled(config());
        let t0 = start();
        let script = [0, 1, 2, 7, 8, 9, 10, 11, 12, 40];

        for minute in script {
            let now = t0 + Duration::minutes(minute);
            assert_eq!(
                pooled.record_failed_attempt_at(ALICE, now),
                plain.record_failed_attempt_at(ALICE, now)
            );
            assert_eq!(pooled.is_locked_out_at(ALICE, now), plain.is_locked_out_at(ALICE, now));
            assert_eq!(
                pooled.get_remaining_attempts_at(ALICE, now),
                plain.get_remaining_attempts_at(ALICE, now)
            );
        }
    }

    #[test]
    fn test_concurrent_failures_are_not_lost() {
        let limiter = Arc::new(LoginRateLimiter::new(RateLimitConfig {
            max_attempts: 1_000_000,
            ..config()
        }));
        let threads = 8;
        let per_thread = 250;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        limiter.record_failed_attempt(ALICE);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(limiter.status(ALICE).failed_attempts, threads * per_thread);
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_on_shutdown() {
        let limiter = Arc::new(LoginRateLimiter::new(RateLimitConfig {
            cleanup_interval: Duration::seconds(1),
            ..config()
        }));
        limiter.record_failed_attempt_at(ALICE, start());
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let handle = limiter.start_cleanup_task(shutdown_rx);

        // The first tick fires immediately and sweeps the long-idle record.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(limiter.tracked_identifiers(), 0);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
