//! `gemnet` binary: listen for GEM monitors and record their readings.
//!
//! ```text
//! gemnet [PORT] [--config gemnet.yaml] [--bind 0.0.0.0] [--output gem.csv] [-v|-vv]
//! ```
//!
//! Runs until Ctrl-C, then closes every connection and flushes the outputs.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;

use gemnet::config::Config;
use gemnet::logging;
use gemnet::server::GemServer;
use gemnet::sink::{CsvSink, LogSink, ReadingSink};

#[derive(Parser)]
#[command(name = "gemnet")]
#[command(about = "Passive TCP listener for GEM energy monitors")]
#[command(version)]
struct Cli {
    /// TCP port to listen on (default 8000)
    port: Option<u16>,

    /// Configuration file (default gemnet.yaml, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// CSV file to write readings to (truncated on start)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose logging (-v, -vv for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if let Some(address) = self.bind {
            config.listen.address = address;
        }
        if let Some(path) = &self.output {
            config.output.csv_path = Some(path.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        Config::load_or_default(cli.config.as_deref()).context("Loading configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    logging::init(&config.logging.level, cli.verbose)?;
    info!("Starting gemnet v{}", env!("CARGO_PKG_VERSION"));

    let mut sinks: Vec<Box<dyn ReadingSink>> = Vec::new();
    if let Some(path) = &config.output.csv_path {
        let sink = CsvSink::create(path).with_context(|| format!("Creating {}", path.display()))?;
        sinks.push(Box::new(sink));
    }
    if config.output.log_readings {
        sinks.push(Box::new(LogSink));
    }

    let server = GemServer::bind(config.listen_addr(), config.server_settings(), sinks)
        .await
        .with_context(|| format!("Listening on {}", config.listen_addr()))?;
    info!("Listening on {}, press Ctrl-C to stop", server.local_addr());

    tokio::signal::ctrl_c().await.context("Waiting for Ctrl-C")?;
    info!("Interrupt received");

    server.shutdown().await?;
    Ok(())
}
