//! Per-identifier failed-attempt state.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::pool::Poolable;

/// Failed-login bookkeeping for one identifier.
///
/// Owned exclusively by the rate limiter. Records are rented from an
/// [`Allocator`](crate::pool::Allocator) and always passed through
/// [`AttemptRecord::start`] before use, so nothing survives from a previous
/// identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptRecord {
    pub identifier: String,
    pub failed_attempts: u32,
    pub first_attempt_at: DateTime<Utc>,
    pub last_attempt_at: DateTime<Utc>,
    pub locked_out_until: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    /// Begin a fresh window with a single failure at `now`.
    pub fn start(&mut self, identifier: &str, now: DateTime<Utc>) {
        self.identifier.clear();
        self.identifier.push_str(identifier);
        self.restart(now);
    }

    /// Reset the counter to one failure at `now`, keeping the identifier.
    pub fn restart(&mut self, now: DateTime<Utc>) {
        self.failed_attempts = 1;
        self.first_attempt_at = now;
        self.last_attempt_at = now;
        self.locked_out_until = None;
    }

    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_out_until.is_some_and(|until| now < until)
    }

    /// A lockout was set and has since run out.
    pub fn lock_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_out_until.is_some_and(|until| now >= until)
    }

    pub fn window_expired_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.first_attempt_at > window
    }
}

impl Poolable for AttemptRecord {
    fn reset(&mut self) {
        self.identifier.clear();
        self.failed_attempts = 0;
        self.first_attempt_at = DateTime::<Utc>::default();
        self.last_attempt_at = DateTime::<Utc>::default();
        self.locked_out_until = None;
    }
}

/// Snapshot of an identifier's lockout state, safe to hand to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockoutStatus {
    pub identifier: String,
    pub failed_attempts: u32,
    pub remaining_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutStatus {
    pub fn is_locked(&self) -> bool {
        self.locked_until.is_some()
    }

    /// Time left on the lockout relative to `now`, if locked.
    pub fn retry_after_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.locked_until
            .map(|until| until - now)
            .filter(|remaining| *remaining > Duration::zero())
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_overwrites_previous_state() {
        let now = Utc::now();
        let mut record = AttemptRecord {
            identifier: "mallory|6.6.6.6".to_string(),
            failed_attempts: 9,
            first_attempt_at: now - Duration::hours(1),
            last_attempt_at: now - Duration::minutes(1),
            locked_out_until: Some(now + Duration::minutes(10)),
        };

        record.start("alice|1.2.3.4", now);

        assert_eq!(record.identifier, "alice|1.2.3.4");
        assert_eq!(record.failed_attempts, 1);
        assert_eq!(record.first_attempt_at, now);
        assert_eq!(record.locked_out_until, None);
    }

    #[test]
    fn test_reset_returns_to_default() {
        let mut record = AttemptRecord::default();
        record.start("bob|10.0.0.2", Utc::now());
        record.locked_out_until = Some(Utc::now());

        record.reset();
        assert_eq!(record, AttemptRecord::default());
    }

    #[test]
    fn test_lock_predicates() {
        let now = Utc::now();
        let mut record = AttemptRecord::default();
        record.start("carol|10.0.0.3", now);
        assert!(!record.is_locked_at(now));
        assert!(!record.lock_expired_at(now));

        record.locked_out_until = Some(now + Duration::minutes(15));
        assert!(record.is_locked_at(now));
        assert!(!record.lock_expired_at(now + Duration::minutes(14)));
        assert!(record.lock_expired_at(now + Duration::minutes(15)));
        assert!(!record.is_locked_at(now + Duration::minutes(15)));
    }

    #[test]
    fn test_window_expiry_is_strict() {
        let now = Utc::now();
        let mut record = AttemptRecord::default();
        record.start("dave|10.0.0.4", now);

        let window = Duration::minutes(5);
        assert!(!record.window_expired_at(now + window, window));
        assert!(record.window_expired_at(now + window + Duration::milliseconds(1), window));
    }

    #[test]
    fn test_retry_after() {
        let now = Utc::now();
        let status = LockoutStatus {
            identifier: "erin|10.0.0.5".to_string(),
            failed_attempts: 5,
            remaining_attempts: 0,
            locked_until: Some(now + Duration::minutes(15)),
        };

        assert!(status.is_locked());
        assert_eq!(status.retry_after_at(now), Some(Duration::minutes(15)));
        assert_eq!(status.retry_after_at(now + Duration::minutes(20)), None);
    }

    #[test]
    fn test_status_serializes() {
        let status = LockoutStatus {
            identifier: "frank|10.0.0.6".to_string(),
            failed_attempts: 2,
            remaining_attempts: 3,
            locked_until: None,
        };
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["identifier"], "frank|10.0.0.6");
        assert_eq!(json["remaining_attempts"], 3);
        assert!(json["locked_until"].is_null());
    }
}
