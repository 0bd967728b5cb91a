mod console;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use mvi_devtools::config::Config;
use mvi_devtools::logging::init_tracing;
use mvi_devtools::server::DebugServer;
use mvi_devtools::shutdown::ShutdownSignal;
use mvi_devtools::store::EventStore;

#[derive(Parser)]
#[command(name = "mvi-devtools", version, about = "Debug host for MVI state containers")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(short, long)]
    bind: Option<String>,

    #[arg(long)]
    log_capacity: Option<usize>,

    #[arg(long)]
    history_capacity: Option<usize>,

    /// Default tracing filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Do not read operator commands from stdin
    #[arg(long)]
    no_console: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }
    if let Some(capacity) = cli.log_capacity {
        config.store.log_capacity = capacity;
    }
    if let Some(capacity) = cli.history_capacity {
        config.store.history_capacity = capacity;
    }
    config.validate()?;

    let store = EventStore::new(config.store);
    let server = DebugServer::bind(&config.server, store.clone())
        .await
        .context("failed to start debug host")?;
    let handle = server.handle();
    println!(
        "mvi-devtools listening on ws://{}{}/<app>",
        server.local_addr(),
        config.server.ws_prefix.trim_end_matches('/')
    );

    let shutdown = ShutdownSignal::new();
    let server_task = tokio::spawn(server.run());

    let mut revisions = store.subscribe();
    let watched = store.clone();
    tokio::spawn(async move {
        while revisions.changed().await.is_ok() {
            tracing::debug!(events = watched.len(), "store updated");
        }
    });

    if !cli.no_console {
        tokio::spawn(console::run(handle.clone(), shutdown.clone()));
    }

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            ctrl_c.signal();
        }
    });

    shutdown.wait().await;
    handle.stop().await;
    server_task.await.context("debug host task panicked")??;
    Ok(())
}
