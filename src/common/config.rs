//! Harness configuration
//!
//! Every tunable the harness uses (address, port, poll intervals, timeouts,
//! test directories) lives here and is passed explicitly to the components
//! that need it.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::{self, config_path};
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct HarnessConfig {
    /// How the server under test is launched and cleaned up
    #[serde(default)]
    pub server: ServerConfig,

    /// Readiness polling
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// Control-connection settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Test and configuration file locations
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Server process settings
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address the server listens on
    #[serde(default = "default_host")]
    pub host: String,

    /// Fixed test port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Arguments appended after `-c <config>`
    #[serde(default = "default_server_args")]
    pub args: Vec<String>,

    /// Delay before checking whether the server exited during startup
    #[serde(default = "default_startup_grace")]
    pub startup_grace_ms: u64,

    /// Kill every process of the current user named like the server binary
    /// during cleanup
    #[serde(default = "default_true")]
    pub sweep_by_name: bool,

    /// Forward server stdout/stderr to the harness terminal
    #[serde(default)]
    pub inherit_output: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            args: default_server_args(),
            startup_grace_ms: default_startup_grace(),
            sweep_by_name: true,
            inherit_output: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    10566
}
fn default_server_args() -> Vec<String> {
    vec!["-D".to_string()]
}
fn default_startup_grace() -> u64 {
    2000
}
fn default_true() -> bool {
    true
}

/// Readiness poll settings
#[derive(Debug, Deserialize, Clone)]
pub struct ReadinessConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_ready_timeout")]
    pub timeout_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            timeout_secs: default_ready_timeout(),
        }
    }
}

fn default_poll_interval() -> u64 {
    500
}
fn default_ready_timeout() -> u64 {
    10
}

/// Control-connection settings
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Connection attempts before giving up
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Fixed delay between connection attempts
    #[serde(default = "default_connect_backoff")]
    pub connect_backoff_ms: u64,

    /// Upper bound for a single connection attempt
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Upper bound for reading one response line
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_attempts: default_connect_attempts(),
            connect_backoff_ms: default_connect_backoff(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

fn default_connect_attempts() -> u32 {
    3
}
fn default_connect_backoff() -> u64 {
    2000
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_read_timeout() -> u64 {
    20
}

/// Test and configuration file locations
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Directory server configuration names are resolved against
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Directory searched in batch mode
    #[serde(default = "default_testcase_dir")]
    pub testcase_dir: PathBuf,

    /// Glob matched against file names in `testcase_dir`
    #[serde(default = "default_testcase_pattern")]
    pub testcase_pattern: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            testcase_dir: default_testcase_dir(),
            testcase_pattern: default_testcase_pattern(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("testing_environment/configurations")
}
fn default_testcase_dir() -> PathBuf {
    PathBuf::from("testing_environment/testcases")
}
fn default_testcase_pattern() -> String {
    "*input*".to_string()
}

impl ServerConfig {
    /// `host:port` of the control connection
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }
}

impl ReadinessConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SessionConfig {
    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl HarnessConfig {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the platform config file is
    /// used when present, otherwise the built-in defaults. Directory paths are
    /// made absolute before returning.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.resolve_paths()
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Anchor relative directories to the current working directory
    pub fn resolve_paths(mut self) -> Result<Self> {
        self.paths.config_dir = paths::absolutize(&self.paths.config_dir)?;
        self.paths.testcase_dir = paths::absolutize(&self.paths.testcase_dir)?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.session.connect_attempts == 0 {
            return Err(Error::ConfigParse(
                "session.connect_attempts must be at least 1".to_string(),
            ));
        }
        if self.readiness.poll_interval_ms == 0 {
            return Err(Error::ConfigParse(
                "readiness.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
