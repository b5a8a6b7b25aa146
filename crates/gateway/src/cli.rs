//! CLI surface, mirrored down from `gateway/src/cli/mod.rs` to the two
//! commands this binary actually needs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rtd-gateway", version, about = "Real-time talking-avatar dialogue gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP/WebSocket server (the default when no subcommand is given).
    Serve {
        /// Path to a TOML config file. Defaults to `RTD_CONFIG` or `./config.toml`.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override `server.host`.
        #[arg(long)]
        host: Option<String>,
        /// Override `server.port`.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the binary version and exit.
    Version,
}

/// Resolve the config file path (`--config`, then `RTD_CONFIG`, then
/// `./config.toml`), load it, then apply `--host`/`--port` overrides on
/// top of whatever `Config::load`'s own `RTD_HOST`/`RTD_PORT` env
/// handling produced.
pub fn load_config(
    config: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<rtd_domain::Config> {
    let path = config
        .or_else(|| std::env::var("RTD_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let mut cfg = rtd_domain::Config::load(&path)?;
    if let Some(host) = host {
        cfg.server.host = host;
    }
    if let Some(port) = port {
        cfg.server.port = port;
    }
    Ok(cfg)
}
