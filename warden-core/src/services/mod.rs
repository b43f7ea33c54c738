//! Service layer
//!
//! This module contains the concrete services that make up the login guard:
//! password hashing, failed-attempt lockout and the combined login flow.

pub mod login;
pub mod password;
pub mod rate_limiter;

pub use login::{LoginAttempt, LoginGuard, LoginOutcome};
pub use password::PasswordHasher;
pub use rate_limiter::LoginRateLimiter;
