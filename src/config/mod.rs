//! Configuration loading and management.
//!
//! Loads rig configuration from `./webrig.toml` (or `$WEBRIG_CONFIG_PATH`).
//! Environment variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::assertions::DEFAULT_ERROR_TEXT;

// ── Top-level config ────────────────────────────────────────────

/// Top-level rig configuration loaded from TOML.
///
/// Path: `./webrig.toml` or `$WEBRIG_CONFIG_PATH`.
/// Env vars override file values; file values override defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Embedded server settings (`[server]`).
    pub server: ServerConfig,
    /// Hosted web application settings (`[webapp]`).
    pub webapp: WebAppConfig,
    /// Browser-emulation client settings (`[browser]`).
    pub browser: BrowserConfig,
    /// Page assertion settings (`[assertions]`).
    pub assertions: AssertionsConfig,
    /// Logging settings (`[logging]`).
    pub logging: LoggingConfig,
}

impl HarnessConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Config file path: `$WEBRIG_CONFIG_PATH` or `./webrig.toml`.
    /// If the file does not exist, returns defaults.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no config file found, using defaults");
                Ok(HarnessConfig::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config file {}: {e}",
                path.display()
            )),
        }
    }

    /// Resolve config path using a custom env resolver (for testing).
    pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        match env("WEBRIG_CONFIG_PATH") {
            Some(p) => PathBuf::from(p),
            None => PathBuf::from("webrig.toml"),
        }
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in tests).
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        // Server.
        if let Some(v) = env("WEBRIG_RESERVED_PORT") {
            match v.trim().parse() {
                Ok(port) => self.server.reserved_port = Some(port),
                Err(_) => warn_invalid("WEBRIG_RESERVED_PORT", &v),
            }
        }
        if let Some(v) = env("WEBRIG_DEFAULT_PORT") {
            match v.trim().parse() {
                Ok(port) => self.server.default_port = port,
                Err(_) => warn_invalid("WEBRIG_DEFAULT_PORT", &v),
            }
        }
        if let Some(v) = env("WEBRIG_BIND_ADDRESS") {
            match v.trim().parse() {
                Ok(addr) => self.server.bind_address = addr,
                Err(_) => warn_invalid("WEBRIG_BIND_ADDRESS", &v),
            }
        }

        // Webapp.
        if let Some(v) = env("WEBRIG_WEBAPP_ROOT") {
            self.webapp.root = PathBuf::from(v);
        }
        if let Some(v) = env("WEBRIG_WEBAPP_OVERLAY") {
            self.webapp.overlay = PathBuf::from(v);
        }
        if let Some(v) = env("WEBRIG_CONTEXT_PATH") {
            self.webapp.context_path = v;
        }

        // Logging.
        if let Some(v) = env("WEBRIG_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env("WEBRIG_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(v));
        }
    }

    /// Parse a TOML string into config (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: HarnessConfig =
            toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }
}

fn warn_invalid(var: &str, value: &str) {
    tracing::warn!(var, value = %value, "ignoring invalid env override");
}

// ── Server config ───────────────────────────────────────────────

/// Embedded server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// First port of the free-port scan.
    pub default_port: u16,
    /// Number of ports scanned, starting at `default_port`.
    pub scan_width: u16,
    /// Address the listener binds to and the port probe connects to.
    pub bind_address: IpAddr,
    /// Host name used in the base URI.
    pub host: String,
    /// Port used as-is, skipping the scan.
    pub reserved_port: Option<u16>,
    /// Worker threads of the server's dedicated runtime.
    pub worker_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_port: 8180,
            scan_width: 10,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            host: "localhost".to_string(),
            reserved_port: None,
            worker_threads: 2,
        }
    }
}

// ── Webapp config ───────────────────────────────────────────────

/// Location and mount point of the hosted web application.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebAppConfig {
    /// Main resource directory.
    pub root: PathBuf,
    /// Overlay resource directory, used only if it exists.
    pub overlay: PathBuf,
    /// Path the application is mounted at.
    pub context_path: String,
}

impl Default for WebAppConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("src/main/webapp"),
            overlay: PathBuf::from("src/test/webapp"),
            context_path: "/".to_string(),
        }
    }
}

// ── Browser config ──────────────────────────────────────────────

/// Browser-emulation client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Treat 4xx/5xx responses as errors.
    pub fail_on_error_status: bool,
    /// Maximum redirects followed per request.
    pub max_redirects: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("webrig/", env!("CARGO_PKG_VERSION")).to_string(),
            fail_on_error_status: true,
            max_redirects: 10,
        }
    }
}

// ── Assertions config ───────────────────────────────────────────

/// Page assertion settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssertionsConfig {
    /// Banner text the application renders on validation errors.
    pub error_text: String,
}

impl Default for AssertionsConfig {
    fn default() -> Self {
        Self {
            error_text: DEFAULT_ERROR_TEXT.to_string(),
        }
    }
}

// ── Logging config ──────────────────────────────────────────────

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tracing filter used when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for JSON log files. Unset means output goes to the test
    /// harness capture only.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
