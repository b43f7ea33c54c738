//! Core functionality for the warden project
//!
//! This crate contains the building blocks of the warden login guard:
//!
//! - [`PasswordHasher`](services::PasswordHasher) for salted PBKDF2 password hashes
//! - [`LoginRateLimiter`](services::LoginRateLimiter) for per-identifier lockout after repeated failures
//! - [`AuditLogger`](audit::AuditLogger) for the security audit trail
//! - [`LoginGuard`](services::LoginGuard), which runs a login through all three
//!
//! The supporting [`RingBuffer`](ring_buffer::RingBuffer) and [`ObjectPool`](pool::ObjectPool)
//! are public so hosts can reuse them.
//!
//! Most applications should depend on the `warden` crate, which assembles these
//! components behind a builder.
//!
pub mod attempt;
pub mod audit;
pub mod config;
pub mod crypto;
pub mod error;
pub mod pool;
pub mod ring_buffer;
pub mod services;

pub use attempt::{AttemptRecord, LockoutStatus};
pub use audit::{AuditEvent, AuditEventType, AuditLogger};
pub use config::{AuditConfig, RateLimitConfig};
pub use error::Error;
pub use services::{LoginAttempt, LoginGuard, LoginOutcome, LoginRateLimiter, PasswordHasher};
