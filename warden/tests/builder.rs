//! Tests for the Warden builder

use std::sync::Arc;

use tempfile::TempDir;
use warden::{AuditConfig, RateLimitConfig, WardenBuilder, WardenBuilderError};

#[tokio::test]
async fn test_builder_creates_audit_dir() {
    let dir = TempDir::new().unwrap();
    let audit_dir = dir.path().join("nested").join("audit");

    let warden = WardenBuilder::new()
        .with_audit_dir(&audit_dir)
        .build()
        .await
        .expect("Failed to build Warden");

    assert!(audit_dir.is_dir());
    warden.shutdown().await;
}

#[tokio::test]
async fn test_builder_rejects_invalid_rate_limit() {
    let dir = TempDir::new().unwrap();
    let result = WardenBuilder::new()
        .with_audit_dir(dir.path())
        .with_rate_limit(RateLimitConfig {
            lockout_duration: chrono::Duration::zero(),
            ..Default::default()
        })
        .build()
        .await;

    let Err(WardenBuilderError::InvalidConfiguration(message)) = result else {
        panic!("expected invalid configuration");
    };
    assert!(message.contains("lockout_duration"));
}

#[tokio::test]
async fn test_unwritable_audit_dir_still_builds() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("occupied");
    std::fs::write(&blocker, "not a directory").unwrap();

    let warden = WardenBuilder::new()
        .with_audit(AuditConfig::in_dir(&blocker))
        .with_cleanup_task(false)
        .build()
        .await
        .expect("Audit directory problems must not fail the build");

    warden.logout("erin", "10.0.0.5").await;
    assert_eq!(warden.recent_audit_events(5).len(), 1);
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let warden = Arc::new(
        WardenBuilder::new()
            .with_audit_dir(dir.path())
            .build()
            .await
            .unwrap(),
    );

    warden.shutdown().await;
    warden.shutdown().await;
}
