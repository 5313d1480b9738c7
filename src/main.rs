//! `storeproxy` host binary.
//!
//! Runs the storage proxy worker behind a line-delimited JSON protocol so any
//! foreground process can drive it over pipes.
//!
//! # Protocol
//!
//! stdin, one event per line:
//!
//! ```text
//! {"type":"install"}
//! {"type":"activate"}
//! {"type":"fetch","url":"https://example.test/"}
//! {"type":"message","port":1,"data":{"command":"put","key":"a","value":"x"}}
//! ```
//!
//! stdout, one output per line:
//!
//! ```text
//! {"type":"lifecycle","action":"skipWaiting"}
//! {"type":"lifecycle","action":"claimClients"}
//! {"type":"lifecycle","action":"passthrough"}
//! {"type":"reply","port":1,"data":{"result":true}}
//! ```
//!
//! Replies are written in completion order, not request order. Messages with
//! an unknown command, or whose storage operation fails, get no reply line.
//! Logs go to stderr and the OTLP trace file.

#![allow(clippy::multiple_crate_versions)]

use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;

use storeproxy::host::serve;
use storeproxy::observability::{init_tracing, LogOutput};
use storeproxy::storage::{JsonFileProvider, MemoryProvider, StoreProvider};
use storeproxy::worker::StorageProxyWorker;
use storeproxy::{Config, Result};

/// Storage proxy worker speaking line-delimited JSON on stdin/stdout.
#[derive(Debug, Parser)]
#[command(name = "storeproxy", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory for database files (overrides the config file).
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Keep databases in memory instead of on disk.
    #[arg(long)]
    memory: bool,

    /// Override a configuration key, e.g. `--set reply_timeout_ms=250`.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    overrides: Vec<(String, String)>,
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    Ok((key.trim().to_string(), value.to_string()))
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        let mut overrides: BTreeMap<String, String> = self.overrides.iter().cloned().collect();
        if let Some(dir) = &self.data_dir {
            overrides.insert("data_dir".to_string(), dir.display().to_string());
        }
        config.apply_overrides(&overrides)?;

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("storeproxy: {e}");
            return ExitCode::from(2);
        }
    };

    init_tracing(&config, LogOutput::Stderr);

    match run(&cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "storeproxy stopped");
            eprintln!("storeproxy: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, config: &Config) -> Result<()> {
    let provider: Arc<dyn StoreProvider> = if cli.memory {
        Arc::new(MemoryProvider::new())
    } else {
        Arc::new(JsonFileProvider::new(&config.data_dir))
    };

    tracing::info!(
        data_dir = ?config.data_dir,
        in_memory = cli.memory,
        db_name = %config.db_name,
        store_name = %config.store_name,
        "starting storage proxy worker"
    );

    let worker = Arc::new(StorageProxyWorker::new(provider, config));
    let stdin = BufReader::new(tokio::io::stdin());
    serve(worker, stdin, tokio::io::stdout()).await?;
    Ok(())
}
