//! Builder for constructing [`Warden`] instances
//!
//! The builder collects the hashing, lockout and audit settings, validates them
//! and opens the audit trail before handing back a ready [`Warden`].
//!
//! # Example
//!
//! ```rust,no_run
//! use warden::WardenBuilder;
//! use chrono::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warden = WardenBuilder::new()
//!         .with_audit_dir("/var/log/warden")
//!         .with_max_attempts(3)
//!         .with_lockout_duration(Duration::minutes(30))
//!         .build()
//!         .await?;
//!
//!     warden.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::{path::PathBuf, sync::Arc};

use chrono::Duration;
use warden_core::{
    AuditConfig, AuditLogger, LoginGuard, LoginRateLimiter, PasswordHasher, RateLimitConfig,
    config::DEFAULT_PBKDF2_ITERATIONS,
};

use crate::{CleanupTask, Warden};

/// Errors that can occur when building a Warden instance.
#[derive(Debug, thiserror::Error)]
pub enum WardenBuilderError {
    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Builder for [`Warden`].
///
/// # Defaults
///
/// - PBKDF2 iterations: 100 000
/// - Lockout: 5 attempts within 5 minutes, 15 minute lockout
/// - Audit directory: `logs`, 1000 cached events, 10 MiB rotation, 30 day retention
/// - Background cleanup: enabled
pub struct WardenBuilder {
    password_iterations: u32,
    rate_limit: RateLimitConfig,
    audit: AuditConfig,
    cleanup_task: bool,
}

impl Default for WardenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WardenBuilder {
    pub fn new() -> Self {
        Self {
            password_iterations: DEFAULT_PBKDF2_ITERATIONS,
            rate_limit: RateLimitConfig::default(),
            audit: AuditConfig::default(),
            cleanup_task: true,
        }
    }

    /// Set the PBKDF2 iteration count.
    ///
    /// Hashes only verify under the count they were created with, so changing
    /// this invalidates existing hashes.
    pub fn with_password_iterations(mut self, iterations: u32) -> Self {
        self.password_iterations = iterations;
        self
    }

    /// Replace the whole lockout policy.
    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.rate_limit.max_attempts = max_attempts;
        self
    }

    pub fn with_lockout_duration(mut self, duration: Duration) -> Self {
        self.rate_limit.lockout_duration = duration;
        self
    }

    /// Replace the whole audit configuration.
    pub fn with_audit(mut self, config: AuditConfig) -> Self {
        self.audit = config;
        self
    }

    /// Write audit files into `dir`, keeping the other audit settings.
    pub fn with_audit_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.audit.log_dir = dir.into();
        self
    }

    /// Whether to run the periodic sweep of idle attempt records.
    ///
    /// Default: true. Requires a Tokio runtime when enabled.
    pub fn with_cleanup_task(mut self, enabled: bool) -> Self {
        self.cleanup_task = enabled;
        self
    }

    /// Validate the configuration and assemble the components.
    ///
    /// # Errors
    ///
    /// Returns [`WardenBuilderError::InvalidConfiguration`] if any setting is
    /// out of range. Audit directory problems are not errors: the audit trail
    /// falls back to its in-memory cache.
    pub async fn build(self) -> Result<Warden, WardenBuilderError> {
        let hasher = PasswordHasher::with_iterations(self.password_iterations)
            .map_err(|e| WardenBuilderError::InvalidConfiguration(e.to_string()))?;
        self.rate_limit
            .validate()
            .map_err(|e| WardenBuilderError::InvalidConfiguration(e.to_string()))?;
        self.audit
            .validate()
            .map_err(|e| WardenBuilderError::InvalidConfiguration(e.to_string()))?;

        let hasher = Arc::new(hasher);
        let limiter = Arc::new(LoginRateLimiter::new(self.rate_limit));
        let audit = Arc::new(AuditLogger::open(self.audit).await);

        let cleanup = self.cleanup_task.then(|| {
            let (shutdown, receiver) = tokio::sync::watch::channel(false);
            let handle = limiter.start_cleanup_task(receiver);
            tracing::info!(
                interval_secs = limiter.config().cleanup_interval.num_seconds(),
                "Started login attempt cleanup task"
            );
            CleanupTask { shutdown, handle }
        });

        let guard = LoginGuard::new(hasher, limiter, audit);
        Ok(Warden::from_parts(guard, cleanup))
    }
}
