//! Configuration for the lockout tracker and the audit trail.
//!
//! Both structs carry sensible defaults and a `validate` method that the
//! builder runs before any component is constructed.

use std::path::PathBuf;

use chrono::Duration;

use crate::error::ValidationError;

/// Default number of failed attempts before an identifier is locked out.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default PBKDF2 iteration count.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

/// Default number of lines kept in the recent-event cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Default size at which the active audit file is rotated (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Lockout policy for [`LoginRateLimiter`](crate::services::LoginRateLimiter).
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Failed attempts within one window that trigger a lockout
    pub max_attempts: u32,
    /// How long a lockout lasts once triggered
    pub lockout_duration: Duration,
    /// Span over which failed attempts accumulate
    pub attempt_window: Duration,
    /// Period of the background sweep that drops idle records
    pub cleanup_interval: Duration,
    /// Idle attempt records kept for reuse
    pub pool_capacity: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_duration: Duration::minutes(15),
            attempt_window: Duration::minutes(5),
            cleanup_interval: Duration::minutes(5),
            pool_capacity: 256,
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidField(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.lockout_duration <= Duration::zero() {
            return Err(ValidationError::InvalidField(
                "lockout_duration must be positive".to_string(),
            ));
        }
        if self.attempt_window <= Duration::zero() {
            return Err(ValidationError::InvalidField(
                "attempt_window must be positive".to_string(),
            ));
        }
        if self.cleanup_interval <= Duration::zero() {
            return Err(ValidationError::InvalidField(
                "cleanup_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Upper bound for `retention_days` and `search_days`: one hundred years.
pub const MAX_AUDIT_DAYS: u32 = 36_500;

/// Settings for [`AuditLogger`](crate::audit::AuditLogger).
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Directory holding the daily log files
    pub log_dir: PathBuf,
    /// File name prefix, followed by `yyyyMMdd`
    pub file_prefix: String,
    /// Lines kept in memory for `get_recent_events`
    pub cache_capacity: usize,
    /// Size in bytes above which the active file is rotated
    pub max_file_size: u64,
    /// Files whose day is older than this many days are deleted on startup
    pub retention_days: u32,
    /// Number of most recent days scanned by historical search
    pub search_days: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            file_prefix: "security_audit_".to_string(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            retention_days: 30,
            search_days: 7,
        }
    }
}

impl AuditConfig {
    /// Default settings writing into `log_dir`.
    pub fn in_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.file_prefix.is_empty()
            || self
                .file_prefix
                .chars()
                .any(|c| std::path::is_separator(c) || c == '.')
        {
            return Err(ValidationError::InvalidField(format!(
                "file_prefix must be a non-empty plain name: {:?}",
                self.file_prefix
            )));
        }
        if self.cache_capacity == 0 {
            return Err(ValidationError::InvalidField(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_file_size == 0 {
            return Err(ValidationError::InvalidField(
                "max_file_size must be positive".to_string(),
            ));
        }
        if self.search_days == 0 || self.search_days > MAX_AUDIT_DAYS {
            return Err(ValidationError::InvalidField(format!(
                "search_days must be between 1 and {MAX_AUDIT_DAYS}"
            )));
        }
        if self.retention_days > MAX_AUDIT_DAYS {
            return Err(ValidationError::InvalidField(format!(
                "retention_days must be at most {MAX_AUDIT_DAYS}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.lockout_duration, Duration::minutes(15));
        assert_eq!(config.attempt_window, Duration::minutes(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rate_limit_validation() {
        let config = RateLimitConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RateLimitConfig {
            lockout_duration: Duration::zero(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RateLimitConfig {
            attempt_window: Duration::seconds(-1),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_audit_defaults() {
        let config = AuditConfig::in_dir("/tmp/audit");
        assert_eq!(config.log_dir, PathBuf::from("/tmp/audit"));
        assert_eq!(config.cache_capacity, 1000);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.retention_days, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_audit_validation() {
        let config = AuditConfig {
            file_prefix: "../escape".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AuditConfig {
            cache_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AuditConfig {
            search_days: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_audit_day_counts_are_bounded() {
        let config = AuditConfig {
            retention_days: u32::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AuditConfig {
            search_days: u32::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AuditConfig {
            retention_days: MAX_AUDIT_DAYS,
            search_days: MAX_AUDIT_DAYS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
