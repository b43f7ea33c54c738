//! # Warden
//!
//! Warden is a login guard for Rust services. It takes care of the parts of
//! password authentication that are easy to get subtly wrong, while leaving
//! user storage to the host application:
//!
//! - Salted PBKDF2-HMAC-SHA256 password hashes with constant-time verification
//! - Per-identifier lockout after repeated failed logins
//! - A security audit trail in daily, size-rotated log files with an
//!   in-memory cache of recent events
//!
//! ## Warning
//!
//! This project has not undergone a security audit. Review it before relying
//! on it in production.
//!
//! ## Example
//!
//! ```rust,no_run
//! use warden::{LoginAttempt, WardenBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warden = WardenBuilder::new()
//!         .with_audit_dir("/var/log/warden")
//!         .build()
//!         .await?;
//!
//!     let stored = warden.hash_password("correct horse battery staple")?;
//!
//!     let outcome = warden
//!         .login(LoginAttempt {
//!             identifier: "alice|203.0.113.7",
//!             username: "alice",
//!             ip_address: "203.0.113.7",
//!             password: "correct horse battery staple",
//!             stored_hash: Some(&stored),
//!         })
//!         .await;
//!     println!("{}", outcome.user_message());
//!
//!     warden.shutdown().await;
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use chrono::Duration;
use tokio::{sync::Mutex, task::JoinHandle};
use warden_core::{LoginGuard, LoginRateLimiter};

mod builder;

pub use builder::{WardenBuilder, WardenBuilderError};

/// Re-export core types from warden_core
///
/// These types are commonly used when working with the Warden API.
pub use warden_core::{
    AuditConfig, AuditEvent, AuditEventType, AuditLogger, LockoutStatus, LoginAttempt,
    LoginOutcome, PasswordHasher, RateLimitConfig,
};

/// Errors that can occur when using Warden.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// Error while hashing or generating a password
    #[error("Password error: {0}")]
    PasswordError(String),
}

pub(crate) struct CleanupTask {
    pub(crate) shutdown: tokio::sync::watch::Sender<bool>,
    pub(crate) handle: JoinHandle<()>,
}

/// The login guard assembled by [`WardenBuilder`].
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Warden {
    guard: LoginGuard,
    cleanup: Mutex<Option<CleanupTask>>,
}

impl Warden {
    pub(crate) fn from_parts(guard: LoginGuard, cleanup: Option<CleanupTask>) -> Self {
        Self {
            guard,
            cleanup: Mutex::new(cleanup),
        }
    }

    pub fn hasher(&self) -> &Arc<PasswordHasher> {
        self.guard.hasher()
    }

    pub fn limiter(&self) -> &Arc<LoginRateLimiter> {
        self.guard.limiter()
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        self.guard.audit()
    }

    pub fn guard(&self) -> &LoginGuard {
        &self.guard
    }

    /// Hash a password for storage.
    pub fn hash_password(&self, password: &str) -> Result<String, WardenError> {
        self.hasher()
            .hash(password)
            .map_err(|e| WardenError::PasswordError(e.to_string()))
    }

    /// Check a password against a stored hash.
    ///
    /// Runs the full key derivation on the calling thread; prefer
    /// [`login`](Self::login) from async request handlers.
    pub fn verify_password(&self, password: &str, stored_hash: &str) -> bool {
        self.hasher().verify(password, stored_hash)
    }

    /// Generate a random password of `length` characters.
    pub fn generate_password(&self, length: usize) -> Result<String, WardenError> {
        PasswordHasher::generate_random_password(length)
            .map_err(|e| WardenError::PasswordError(e.to_string()))
    }

    /// Run a login attempt through lockout, verification and auditing.
    pub async fn login(&self, attempt: LoginAttempt<'_>) -> LoginOutcome {
        self.guard.attempt_login(attempt).await
    }

    pub async fn logout(&self, username: &str, ip_address: &str) {
        self.guard.record_logout(username, ip_address).await;
    }

    pub async fn session_expired(&self, username: &str, ip_address: &str) {
        self.guard.record_session_expired(username, ip_address).await;
    }

    /// Whether `identifier` is locked out, and for how much longer.
    pub fn is_locked_out(&self, identifier: &str) -> (bool, Duration) {
        self.limiter().is_locked_out(identifier)
    }

    pub fn remaining_attempts(&self, identifier: &str) -> u32 {
        self.limiter().get_remaining_attempts(identifier)
    }

    pub fn lockout_status(&self, identifier: &str) -> LockoutStatus {
        self.limiter().status(identifier)
    }

    /// Clear the failed-attempt history of `identifier`, e.g. after an
    /// administrator unlocks an account.
    pub fn unlock(&self, identifier: &str) -> bool {
        self.limiter().reset_attempts(identifier)
    }

    /// The last `count` audit lines held in memory, oldest first.
    pub fn recent_audit_events(&self, count: usize) -> Vec<String> {
        self.audit().get_recent_events(count)
    }

    /// Search recent audit files for lines containing `term`.
    pub async fn search_audit_events(&self, term: &str, max_results: usize) -> Vec<String> {
        self.audit().search_historical_events(term, max_results).await
    }

    /// Stop the background cleanup task and wait for it to finish.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        let Some(task) = self.cleanup.lock().await.take() else {
            return;
        };

        let _ = task.shutdown.send(true);
        if let Err(e) = task.handle.await {
            tracing::error!(error = %e, "Login attempt cleanup task failed");
        }
    }
}
