//! Tests for `src/logging.rs`.

use webrig::config::LoggingConfig;
use webrig::logging::LoggingGuard;

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn init_test_is_idempotent() {
    webrig::logging::init_test();
    webrig::logging::init_test();
    tracing::info!("test logging initialised twice");
}

#[test]
fn init_without_a_dir_returns_no_guard() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        dir: None,
    };
    assert!(webrig::logging::init(&config).is_none());
    webrig::logging::init(&config);
    tracing::debug!("still logging");
}

#[test]
fn init_with_a_dir_creates_it() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("configured");
    let config = LoggingConfig {
        level: "info".to_string(),
        dir: Some(logs_dir.clone()),
    };

    // Another test may already own the global subscriber; that is reported,
    // not returned, and the directory exists either way.
    let _guard = webrig::logging::init(&config);
    assert!(logs_dir.is_dir(), "logs directory should be created");
}

#[test]
fn init_file_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("logs");
    assert!(!logs_dir.exists());

    let _result = webrig::logging::init_file(&logs_dir, "info");
    assert!(logs_dir.exists(), "logs directory should be created");
}
