//! # ember
//!
//! Runtime binary: starts every service, then reads control actions
//! (`start`, `stop`, `restart`, `wakeword_start`, ...) one per line on stdin
//! until Ctrl-C.

#![deny(unsafe_code)]

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use ember_runtime::{ControlAction, LifecycleCoordinator, RuntimeConfig};
use ember_telemetry::{init_telemetry, TelemetryConfig};

/// Ember assistant runtime.
#[derive(Parser, Debug)]
#[command(name = "ember", about = "Ember assistant runtime")]
struct Cli {
    /// Directory holding the config file and database.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Address every service binds to.
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Realtime protocol port (retries once on the next port if taken).
    #[arg(long)]
    protocol_port: Option<u16>,

    #[arg(long)]
    file_port: Option<u16>,

    #[arg(long)]
    asset_port: Option<u16>,

    /// Ollama chat endpoint.
    #[arg(long)]
    ollama_url: Option<String>,

    /// Chat-completions endpoint used when Ollama fails.
    #[arg(long)]
    chat_url: Option<String>,

    /// Log directives, e.g. "debug,ember_llm=trace". RUST_LOG wins if set.
    #[arg(long)]
    log: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(self, mut config: RuntimeConfig) -> RuntimeConfig {
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(addr) = self.bind {
            config.bind_addr = addr;
        }
        if let Some(port) = self.protocol_port {
            config.protocol_port = port;
        }
        if let Some(port) = self.file_port {
            config.file_port = port;
        }
        if let Some(port) = self.asset_port {
            config.asset_port = port;
        }
        if let Some(url) = self.ollama_url {
            config.ollama_url = url;
        }
        if let Some(url) = self.chat_url {
            config.chat_url = url;
        }
        if self.log.is_some() {
            config.log = self.log;
        }
        config
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let json_logs = cli.json_logs;
    let config = cli.apply(RuntimeConfig::from_env());

    let mut telemetry = TelemetryConfig {
        json: json_logs,
        ..TelemetryConfig::default()
    };
    if let Some(directives) = &config.log {
        telemetry = telemetry.with_directives(directives);
    }
    init_telemetry(&telemetry).context("failed to initialise logging")?;

    info!(data_dir = %config.data_dir.display(), "starting ember");
    let mut runtime = LifecycleCoordinator::open(config).context("failed to open runtime")?;
    runtime.start_all().context("failed to start services")?;

    control_loop(&mut runtime).await;

    info!("shutting down");
    runtime.stop_all();
    Ok(())
}

async fn control_loop(runtime: &mut LifecycleCoordinator) {
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = &mut shutdown => return,
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<ControlAction>() {
                    Ok(action) => {
                        if let Err(e) = runtime.perform(action) {
                            warn!(action = %action, error = %e, "control action failed");
                        }
                    }
                    Err(e) => warn!(error = %e, "ignoring control input"),
                },
                Ok(None) | Err(_) => {
                    // No control surface left; run until interrupted.
                    let _ = (&mut shutdown).await;
                    return;
                }
            },
        }
    }
}
