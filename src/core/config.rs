/*!
 * Kernel Configuration
 *
 * Defaults come from `core::limits`, an optional JSON file may replace them,
 * and `LOCI_KERNEL_*` environment variables override both.
 */

use super::errors::{ConfigError, ConfigResult};
use super::limits;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// How the coordinator decides that supervised servers are ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessMode {
    /// Sleep for `startup_delay` and assume the server is up
    FixedDelay,
    /// Connect to `ui_address` until it accepts or `probe_timeout` elapses
    TcpProbe,
}

impl std::str::FromStr for ReadinessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed_delay" | "delay" => Ok(ReadinessMode::FixedDelay),
            "tcp_probe" | "probe" => Ok(ReadinessMode::TcpProbe),
            other => Err(format!("unknown readiness mode '{}'", other)),
        }
    }
}

/// Host configuration for supervision
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct KernelConfig {
    /// Private writable directory: materialized binaries and the id file live here
    pub data_dir: PathBuf,
    /// Exposed as LOCI_INSTALL_DIR; falls back to `data_dir`
    pub install_dir: Option<PathBuf>,
    /// Directory holding bundled payloads
    pub bundle_dir: PathBuf,
    pub subprograms: Vec<String>,
    pub disabled_subprograms: Vec<String>,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "poll_interval_ms")]
    pub poll_interval: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "restart_backoff_ms")]
    pub restart_backoff: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "startup_delay_ms")]
    pub startup_delay: Duration,
    pub copy_buffer_size: usize,
    pub readiness: ReadinessMode,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "probe_timeout_ms")]
    pub probe_timeout: Duration,
    pub ui_address: String,
    /// Written to `machine_id.txt` when present
    pub device_id: Option<String>,
    pub trace_json: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            data_dir: std::env::temp_dir().join("loci"),
            install_dir: None,
            bundle_dir: default_bundle_dir(),
            subprograms: vec![limits::DEFAULT_SUBPROGRAM.to_string()],
            disabled_subprograms: Vec::new(),
            poll_interval: limits::CHILD_POLL_INTERVAL,
            restart_backoff: limits::RESTART_BACKOFF,
            startup_delay: limits::STARTUP_HEAD_START,
            copy_buffer_size: limits::MATERIALIZE_BUFFER_SIZE,
            readiness: ReadinessMode::FixedDelay,
            probe_timeout: limits::READINESS_PROBE_TIMEOUT,
            ui_address: limits::DEFAULT_UI_ADDRESS.to_string(),
            device_id: None,
            trace_json: false,
        }
    }
}

/// Payloads ship next to the host executable
fn default_bundle_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl KernelConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().apply_env()
    }

    /// Load a JSON config file; missing keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded kernel config file");
        Ok(config)
    }

    /// JSON file (when given) then environment overrides, else environment only
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::from_json_file(path)?.apply_env(),
            None => Self::from_env(),
        }
    }

    /// Apply `LOCI_KERNEL_*` and `DISABLED_SUBPROGRAMS` overrides
    pub fn apply_env(mut self) -> ConfigResult<Self> {
        if let Some(v) = env_override("DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = env_override("INSTALL_DIR") {
            self.install_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = env_override("BUNDLE_DIR") {
            self.bundle_dir = PathBuf::from(v);
        }
        if let Some(v) = env_override("SUBPROGRAMS") {
            self.subprograms = split_list(&v);
        }
        if let Some(v) = env_override("POLL_INTERVAL_MS") {
            self.poll_interval = parse_millis("POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = env_override("RESTART_BACKOFF_MS") {
            self.restart_backoff = parse_millis("RESTART_BACKOFF_MS", &v)?;
        }
        if let Some(v) = env_override("STARTUP_DELAY_MS") {
            self.startup_delay = parse_millis("STARTUP_DELAY_MS", &v)?;
        }
        if let Some(v) = env_override("PROBE_TIMEOUT_MS") {
            self.probe_timeout = parse_millis("PROBE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = env_override("COPY_BUFFER_SIZE") {
            self.copy_buffer_size = v.trim().parse().map_err(|e| invalid("COPY_BUFFER_SIZE", e))?;
        }
        if let Some(v) = env_override("READINESS") {
            self.readiness = v.parse().map_err(|e| invalid("READINESS", e))?;
        }
        if let Some(v) = env_override("UI_ADDRESS") {
            self.ui_address = v;
        }
        if let Some(v) = env_override("DEVICE_ID") {
            self.device_id = Some(v);
        }
        if let Some(v) = env_override("TRACE_JSON") {
            self.trace_json = v == "1" || v.eq_ignore_ascii_case("true");
        }

        let disabled = env_override("DISABLED_SUBPROGRAMS")
            .or_else(|| non_empty_var(limits::DISABLED_SUBPROGRAMS_ENV_KEY));
        if let Some(v) = disabled {
            self.disabled_subprograms.extend(split_list(&v));
        }

        debug!(config = ?self, "Applied environment overrides");
        Ok(self)
    }

    /// Reject configurations the supervisors cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.copy_buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "copy_buffer_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.subprograms.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "subprograms".to_string(),
                reason: "at least one subprogram is required".to_string(),
            });
        }

        // Names become file names under data_dir
        for name in &self.subprograms {
            if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(ConfigError::InvalidValue {
                    key: "subprograms".to_string(),
                    reason: format!("'{}' is not a valid file name", name),
                });
            }
        }

        self.ui_socket_addr()?;
        Ok(())
    }

    pub fn install_dir(&self) -> &Path {
        self.install_dir.as_deref().unwrap_or(&self.data_dir)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        !self.disabled_subprograms.iter().any(|d| d == name)
    }

    pub fn ui_socket_addr(&self) -> ConfigResult<SocketAddr> {
        self.ui_address
            .parse()
            .map_err(|e| invalid("ui_address", e))
    }

    /// URL the UI surface loads
    pub fn ui_url(&self) -> String {
        format!("http://{}/", self.ui_address)
    }
}

fn env_override(key: &str) -> Option<String> {
    non_empty_var(&format!("{}{}", limits::CONFIG_ENV_PREFIX, key))
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_millis(key: &str, raw: &str) -> ConfigResult<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| invalid(key, e))
}

fn invalid(key: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
