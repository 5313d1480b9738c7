//! storeproxy: a background worker that proxies key-value storage requests.
//!
//! A foreground context posts `put`, `get` and `delete` requests to the
//! worker and awaits one reply per request on a port it hands over with the
//! message. The worker opens the persistent store, performs the operation,
//! closes the store and posts `{result}` back. Callers never block on storage
//! themselves.

#![allow(clippy::multiple_crate_versions)]

//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Host (host.rs, main.rs)                            │  ← Line protocol on stdin/stdout
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌───────────────┐   ┌─────────────────────────────────┐
//! │ Client        │──▶│ Worker Layer (worker/)          │
//! │ (client.rs)   │   │ - Messages & reply ports        │
//! │ - Timeouts    │   │ - Lifecycle                     │
//! └───────────────┘   │ - Handler & runtime             │
//!                     └─────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Storage Layer (storage/)                           │
//! │  - Provider / connection traits                     │
//! │  - JSON file engine, in-memory engine               │
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain, Infrastructure, Observability              │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`domain`]: Error type and command set
//! - [`storage`]: Storage engines behind the worker
//! - [`worker`]: The worker, its messages and its runtime
//! - [`client`]: Foreground client with reply timeouts
//! - [`host`]: Line-delimited JSON host used by the binary
//! - [`infrastructure`]: Data directory resolution
//! - [`observability`]: Tracing with OTLP file export
//!
//! # Configuration
//!
//! ```toml
//! data_dir = "~/.local/share/storeproxy"
//! db_name = "sqflite_ffi_web"
//! store_name = "sqflite"
//! trace_level = "debug"
//! reply_timeout_ms = 5000
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use storeproxy::client::StorageClient;
//! use storeproxy::worker::{StorageProxyWorker, WorkerRuntime};
//! use storeproxy::Config;
//! use serde_json::json;
//!
//! # async fn demo() -> storeproxy::Result<()> {
//! let config = Config::default();
//! let runtime = WorkerRuntime::spawn(Arc::new(StorageProxyWorker::from_config(&config)));
//! let client = StorageClient::new(runtime.handle(), config.reply_timeout());
//!
//! client.put("a", json!("x")).await?;
//! assert_eq!(client.get("a").await?, Some(json!("x")));
//! client.delete("a").await?;
//! assert_eq!(client.get("a").await?, None);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod domain;
pub mod host;
pub mod infrastructure;
pub mod observability;
pub mod storage;
pub mod worker;

pub use domain::{Command, ProxyError, Result};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Worker configuration.
///
/// Built from defaults, optionally a TOML file ([`Config::from_file`]) and
/// then string overrides ([`Config::apply_overrides`]).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding the database files.
    pub data_dir: PathBuf,

    /// Name of the single database the worker uses. Default: `"sqflite_ffi_web"`
    pub db_name: String,

    /// Object store within the database. Default: `"sqflite"`
    pub store_name: String,

    /// Schema version the database is opened with. Fixed at `1` for the
    /// worker's single store; it cannot be overridden from the command line.
    /// Databases written at a higher version refuse to open at this one.
    pub db_version: u32,

    /// Tracing filter directive (`trace`, `debug`, `info`, ...). Default: `"info"`
    pub trace_level: Option<String>,

    /// How long clients wait for a reply, in milliseconds. Default: `5000`
    pub reply_timeout_ms: u64,

    /// Trace file size that triggers rotation. Default: 10 MiB
    pub trace_max_bytes: u64,

    /// Rotated trace files to keep. Default: `3`
    pub trace_backups: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: infrastructure::default_data_dir(),
            db_name: "sqflite_ffi_web".to_string(),
            store_name: "sqflite".to_string(),
            db_version: 1,
            trace_level: None,
            reply_timeout_ms: 5000,
            trace_max_bytes: 10 * 1024 * 1024,
            trace_backups: 3,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Io`] if the file cannot be read and
    /// [`ProxyError::Config`] if it is not valid or fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|e| ProxyError::Config(format!("{}: {e}", path.display())))
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Config`] on parse or validation failure.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(contents).map_err(|e| ProxyError::Config(e.to_string()))?;
        config.data_dir = expand_data_dir(&config.data_dir);
        config.validate()?;
        Ok(config)
    }

    /// Applies `key=value` style overrides.
    ///
    /// # Parsing Rules
    ///
    /// - `data_dir`: path, `~` expanded
    /// - `db_name`, `store_name`, `trace_level`: taken verbatim
    /// - `reply_timeout_ms`, `trace_max_bytes`, `trace_backups`: integers
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Config`] for unknown keys, unparsable numbers or
    /// a result that fails validation.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::BTreeMap;
    /// use storeproxy::Config;
    ///
    /// let mut overrides = BTreeMap::new();
    /// overrides.insert("db_name".to_string(), "other".to_string());
    /// overrides.insert("reply_timeout_ms".to_string(), "250".to_string());
    ///
    /// let mut config = Config::default();
    /// config.apply_overrides(&overrides).unwrap();
    /// assert_eq!(config.db_name, "other");
    /// assert_eq!(config.reply_timeout_ms, 250);
    /// ```
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, String>) -> Result<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "data_dir" => self.data_dir = expand_data_dir(Path::new(value)),
                "db_name" => self.db_name.clone_from(value),
                "store_name" => self.store_name.clone_from(value),
                "trace_level" => self.trace_level = Some(value.clone()),
                "reply_timeout_ms" => self.reply_timeout_ms = parse_number(key, value)?,
                "trace_max_bytes" => self.trace_max_bytes = parse_number(key, value)?,
                "trace_backups" => self.trace_backups = parse_number(key, value)?,
                other => return Err(ProxyError::Config(format!("unknown setting: {other}"))),
            }
        }
        self.validate()
    }

    /// Checks invariants the worker relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.db_name.is_empty() {
            return Err(ProxyError::Config("db_name must not be empty".to_string()));
        }
        if self.store_name.is_empty() {
            return Err(ProxyError::Config("store_name must not be empty".to_string()));
        }
        if self.db_version == 0 {
            return Err(ProxyError::Config("db_version must be at least 1".to_string()));
        }
        if self.reply_timeout_ms == 0 {
            return Err(ProxyError::Config("reply_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Reply timeout as a [`Duration`].
    #[must_use]
    pub const fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

fn expand_data_dir(path: &Path) -> PathBuf {
    path.to_str()
        .map_or_else(|| path.to_path_buf(), infrastructure::expand_tilde)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ProxyError::Config(format!("{key}: expected a number, got {value:?}")))
}
