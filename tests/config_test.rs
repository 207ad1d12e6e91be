/*!
 * Config Tests
 * Environment overrides and config files
 */

use loci_kernel::core::config::{KernelConfig, ReadinessMode};
use loci_kernel::core::errors::ConfigError;
use pretty_assertions::assert_eq;
use parking_lot::Mutex;
use serial_test::serial;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

const OVERRIDE_KEYS: &[&str] = &[
    "LOCI_KERNEL_DATA_DIR",
    "LOCI_KERNEL_INSTALL_DIR",
    "LOCI_KERNEL_SUBPROGRAMS",
    "LOCI_KERNEL_POLL_INTERVAL_MS",
    "LOCI_KERNEL_READINESS",
    "LOCI_KERNEL_COPY_BUFFER_SIZE",
    "LOCI_KERNEL_DISABLED_SUBPROGRAMS",
    "DISABLED_SUBPROGRAMS",
];

fn clear_env() {
    for key in OVERRIDE_KEYS {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_env_overrides_apply() {
    clear_env();
    std::env::set_var("LOCI_KERNEL_DATA_DIR", "/data/loci");
    std::env::set_var("LOCI_KERNEL_SUBPROGRAMS", "server_webgui, geoserver");
    std::env::set_var("LOCI_KERNEL_POLL_INTERVAL_MS", "40");
    std::env::set_var("LOCI_KERNEL_READINESS", "tcp_probe");

    let config = KernelConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.data_dir, PathBuf::from("/data/loci"));
    assert_eq!(config.install_dir(), PathBuf::from("/data/loci").as_path());
    assert_eq!(
        config.subprograms,
        vec!["server_webgui".to_string(), "geoserver".to_string()]
    );
    assert_eq!(config.poll_interval, Duration::from_millis(40));
    assert_eq!(config.readiness, ReadinessMode::TcpProbe);
}

#[test]
#[serial]
fn test_legacy_disabled_subprograms_variable() {
    clear_env();
    std::env::set_var("DISABLED_SUBPROGRAMS", "server_webgui");

    let config = KernelConfig::from_env().unwrap();
    clear_env();

    assert!(!config.is_enabled("server_webgui"));
    assert!(config.is_enabled("geoserver"));
}

#[test]
#[serial]
fn test_invalid_override_is_reported() {
    clear_env();
    std::env::set_var("LOCI_KERNEL_COPY_BUFFER_SIZE", "lots");

    let result = KernelConfig::from_env();
    clear_env();

    match result {
        Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "COPY_BUFFER_SIZE"),
        other => panic!("expected InvalidValue, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_json_file_then_env() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kernel.json");
    std::fs::write(
        &path,
        r#"{
            "data_dir": "/data/from-file",
            "install_dir": "/opt/loci",
            "restart_backoff_ms": 1000,
            "device_id": "9774d56d682e549c"
        }"#,
    )
    .unwrap();

    std::env::set_var("LOCI_KERNEL_DATA_DIR", "/data/from-env");
    let config = KernelConfig::from_json_file(&path)
        .and_then(KernelConfig::apply_env)
        .unwrap();
    clear_env();

    assert_eq!(config.data_dir, PathBuf::from("/data/from-env"));
    assert_eq!(config.install_dir(), PathBuf::from("/opt/loci").as_path());
    assert_eq!(config.restart_backoff, Duration::from_secs(1));
    assert_eq!(config.device_id.as_deref(), Some("9774d56d682e549c"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_malformed_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kernel.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        KernelConfig::from_json_file(&path),
        Err(ConfigError::Parse { .. })
    ));
    assert!(matches!(
        KernelConfig::from_json_file(dir.path().join("missing.json")),
        Err(ConfigError::Io { .. })
    ));
}

/// Log sink shared between a test and its subscriber
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
#[serial]
fn test_load_reports_file_and_overrides_to_subscriber() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kernel.json");
    std::fs::write(&path, r#"{"startup_delay_ms": 500}"#).unwrap();

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let config =
        tracing::subscriber::with_default(subscriber, || KernelConfig::load(Some(path.as_path())))
            .unwrap();

    assert_eq!(config.startup_delay, Duration::from_millis(500));
    let output = logs.contents();
    assert!(output.contains("Loaded kernel config file"), "{}", output);
    assert!(output.contains("Applied environment overrides"), "{}", output);
}

#[test]
#[serial]
fn test_load_without_file_uses_env() {
    clear_env();
    std::env::set_var("LOCI_KERNEL_SUBPROGRAMS", "geoserver");

    let config = KernelConfig::load(None).unwrap();
    clear_env();

    assert_eq!(config.subprograms, vec!["geoserver".to_string()]);
}
