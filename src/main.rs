//! Circuit breaker daemon.
//!
//! Loads a TOML config, runs one self-monitoring breaker per entry, applies
//! tuning changes when the file is edited and stops cleanly on SIGINT/SIGTERM.
//!
//! ```text
//!   hystrix.toml ──▶ loader ──▶ startup ──▶ ┌──────────────────────────┐
//!        │                                  │ breaker (one per entry)  │
//!        ▼                                  │  ├─ status evaluation    │
//!     watcher ──▶ BreakerSet::apply ──────▶ │  └─ counter cleanup      │
//!                                           └──────────────────────────┘
//!   SIGINT/SIGTERM ──▶ Shutdown::trigger ──▶ loops exit ──▶ join
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::sync::mpsc;

use hystrix::config::load_config;
use hystrix::config::watcher::ConfigWatcher;
use hystrix::lifecycle::{signals, startup, Shutdown};
use hystrix::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "hystrix")]
#[command(about = "Runs self-monitoring circuit breakers", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "hystrix.toml")]
    config: PathBuf,

    /// Do not reload the configuration when the file changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init(&config.observability);
    tracing::info!(
        config = ?cli.config,
        breakers = config.breakers.len(),
        "hystrix v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        // validated at load
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let shutdown = Shutdown::new();
    let breakers = startup::start_breakers(&config, &shutdown)?;

    let (_watcher, mut updates) = if cli.no_watch {
        let (_, rx) = mpsc::unbounded_channel();
        (None, rx)
    } else {
        let (watcher, rx) = ConfigWatcher::new(&cli.config);
        (Some(watcher.starting_from(config.clone()).run()?), rx)
    };

    let signal = signals::wait_for_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            Some(new_config) = updates.recv() => {
                breakers.apply(&new_config);
            }
            _ = &mut signal => break,
        }
    }

    tracing::info!("Stopping breakers");
    shutdown.trigger();
    breakers.join().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
