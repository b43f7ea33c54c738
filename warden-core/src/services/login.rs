//! Login flow combining lockout checks, password verification and auditing.
//!
//! # Example
//!
//! ```rust,ignore
//! let guard = LoginGuard::new(hasher, limiter, audit);
//!
//! let outcome = guard
//!     .attempt_login(LoginAttempt {
//!         identifier: "alice|203.0.113.7",
//!         username: "alice",
//!         ip_address: "203.0.113.7",
//!         password: "hunter2",
//!         stored_hash: user.as_ref().map(|u| u.password_hash.as_str()),
//!     })
//!     .await;
//!
//! if !outcome.is_success() {
//!     return Err(outcome.user_message());
//! }
//! ```

use std::sync::Arc;

use chrono::Duration;

use crate::{
    attempt::AttemptRecord,
    audit::AuditLogger,
    pool::{Allocator, ObjectPool},
    services::{password::PasswordHasher, rate_limiter::LoginRateLimiter},
};

/// Well-formed stand-in verified when the user does not exist, so unknown and
/// known accounts cost the same key derivation.
const DUMMY_HASH: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Credentials and request context for one login.
#[derive(Clone, Copy)]
pub struct LoginAttempt<'a> {
    /// Key used for lockout tracking, chosen by the caller (e.g. `username|ip`)
    pub identifier: &'a str,
    pub username: &'a str,
    pub ip_address: &'a str,
    pub password: &'a str,
    /// Stored hash of the account, `None` if no such user exists
    pub stored_hash: Option<&'a str>,
}

impl std::fmt::Debug for LoginAttempt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginAttempt")
            .field("identifier", &self.identifier)
            .field("username", &self.username)
            .field("ip_address", &self.ip_address)
            .field("password", &"[REDACTED]")
            .field("stored_hash", &self.stored_hash.map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Result of [`LoginGuard::attempt_login`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Failed { remaining_attempts: u32 },
    LockedOut { retry_after: Duration },
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success)
    }

    /// Text safe to show the end user.
    ///
    /// Never reveals whether the username exists.
    pub fn user_message(&self) -> String {
        match self {
            LoginOutcome::Success => "Login successful.".to_string(),
            LoginOutcome::Failed {
                remaining_attempts: 1,
            } => "Invalid username or password. 1 attempt remaining before temporary lockout."
                .to_string(),
            LoginOutcome::Failed { remaining_attempts } => format!(
                "Invalid username or password. {remaining_attempts} attempts remaining before temporary lockout."
            ),
            LoginOutcome::LockedOut { retry_after } => {
                let minutes = ceil_minutes(*retry_after);
                if minutes == 1 {
                    "Too many failed attempts. Please try again in 1 minute.".to_string()
                } else {
                    format!("Too many failed attempts. Please try again in {minutes} minutes.")
                }
            }
        }
    }
}

fn ceil_minutes(duration: Duration) -> i64 {
    let seconds = duration.num_seconds().max(0);
    ((seconds + 59) / 60).max(1)
}

/// Runs a login attempt through the limiter, the hasher and the audit trail.
pub struct LoginGuard<A: Allocator<AttemptRecord> = ObjectPool<AttemptRecord>> {
    hasher: Arc<PasswordHasher>,
    limiter: Arc<LoginRateLimiter<A>>,
    audit: Arc<AuditLogger>,
}

impl<A: Allocator<AttemptRecord>> Clone for LoginGuard<A> {
    fn clone(&self) -> Self {
        Self {
            hasher: Arc::clone(&self.hasher),
            limiter: Arc::clone(&self.limiter),
            audit: Arc::clone(&self.audit),
        }
    }
}

impl<A: Allocator<AttemptRecord>> LoginGuard<A> {
    pub fn new(
        hasher: Arc<PasswordHasher>,
        limiter: Arc<LoginRateLimiter<A>>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            hasher,
            limiter,
            audit,
        }
    }

    pub fn hasher(&self) -> &Arc<PasswordHasher> {
        &self.hasher
    }

    pub fn limiter(&self) -> &Arc<LoginRateLimiter<A>> {
        &self.limiter
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    /// Check the lockout, verify the password and record the outcome.
    pub async fn attempt_login(&self, attempt: LoginAttempt<'_>) -> LoginOutcome {
        let LoginAttempt {
            identifier,
            username,
            ip_address,
            ..
        } = attempt;

        let (locked, retry_after) = self.limiter.is_locked_out(identifier);
        if locked {
            self.audit
                .log_suspicious_activity(
                    username,
                    ip_address,
                    &format!(
                        "Login attempt while locked out ({} minutes remaining)",
                        ceil_minutes(retry_after)
                    ),
                )
                .await;
            return LoginOutcome::LockedOut { retry_after };
        }

        let user_exists = attempt.stored_hash.is_some();
        if self.verify(attempt).await && user_exists {
            self.limiter.reset_attempts(identifier);
            self.audit.log_login_success(username, ip_address).await;
            return LoginOutcome::Success;
        }

        let status = self.limiter.record_failed_attempt(identifier);
        let max_attempts = self.limiter.config().max_attempts;
        if status.is_locked() && status.failed_attempts == max_attempts {
            let lockout = self.limiter.config().lockout_duration;
            self.audit
                .log_account_lockout(username, ip_address, lockout)
                .await;
            return LoginOutcome::LockedOut {
                retry_after: status.retry_after().unwrap_or(lockout),
            };
        }

        self.audit
            .log_login_failure(username, ip_address, "Invalid credentials")
            .await;
        match status.retry_after() {
            Some(retry_after) => LoginOutcome::LockedOut { retry_after },
            None => LoginOutcome::Failed {
                remaining_attempts: status.remaining_attempts,
            },
        }
    }

    pub async fn record_logout(&self, username: &str, ip_address: &str) {
        self.audit.log_logout(username, ip_address).await;
    }

    pub async fn record_session_expired(&self, username: &str, ip_address: &str) {
        self.audit.log_session_expired(username, ip_address).await;
    }

    /// Key derivation on the blocking pool.
    async fn verify(&self, attempt: LoginAttempt<'_>) -> bool {
        let hasher = Arc::clone(&self.hasher);
        let password = attempt.password.to_owned();
        let stored = attempt.stored_hash.unwrap_or(DUMMY_HASH).to_owned();

        match tokio::task::spawn_blocking(move || hasher.verify(&password, &stored)).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::error!(error = %e, "Password verification task failed");
                false
            }
        }
    }
}
