use std::{borrow::Cow, fmt};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Kind of security event recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuditEventType {
    LoginSuccess,
    LoginFailure,
    AccountLockout,
    Logout,
    SessionExpired,
    SuspiciousActivity,
    /// Host-defined event kind, written upper-cased with `_` for spaces
    Custom(String),
}

impl AuditEventType {
    /// The tag written between brackets on each log line.
    pub fn tag(&self) -> Cow<'static, str> {
        match self {
            AuditEventType::LoginSuccess => Cow::Borrowed("LOGIN_SUCCESS"),
            AuditEventType::LoginFailure => Cow::Borrowed("LOGIN_FAILURE"),
            AuditEventType::AccountLockout => Cow::Borrowed("ACCOUNT_LOCKOUT"),
            AuditEventType::Logout => Cow::Borrowed("LOGOUT"),
            AuditEventType::SessionExpired => Cow::Borrowed("SESSION_EXPIRED"),
            AuditEventType::SuspiciousActivity => Cow::Borrowed("SUSPICIOUS_ACTIVITY"),
            AuditEventType::Custom(name) => Cow::Owned(
                name.trim()
                    .chars()
                    .map(|c| match c {
                        ' ' | '\r' | '\n' | '\t' => '_',
                        '[' | ']' => '_',
                        c => c.to_ascii_uppercase(),
                    })
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

impl Serialize for AuditEventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.tag())
    }
}

/// One immutable entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub username: String,
    pub ip_address: String,
    pub message: String,
}

impl AuditEvent {
    /// Create an event stamped with the current time.
    pub fn new(
        event_type: AuditEventType,
        username: impl Into<String>,
        ip_address: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            username: username.into(),
            ip_address: ip_address.into(),
            message: message.into(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Render the event as a single log line (no trailing newline).
    ///
    /// `[2024-01-15 10:30:45.123 UTC] [LOGIN_FAILURE] [User: alice] [IP: 1.2.3.4] message`
    ///
    /// Line breaks inside fields are replaced with spaces so an event always
    /// occupies exactly one line.
    pub fn format_line(&self) -> String {
        format!(
            "[{} UTC] [{}] [User: {}] [IP: {}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.event_type.tag(),
            single_line(&self.username),
            single_line(&self.ip_address),
            single_line(&self.message),
        )
    }
}

fn single_line(field: &str) -> Cow<'_, str> {
    if field.contains(['\r', '\n']) {
        Cow::Owned(field.replace(['\r', '\n'], " "))
    } else {
        Cow::Borrowed(field)
    }
}
