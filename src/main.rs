//! Platform Feed Server - Binary Entry Point
//!
//! Serves a demo in-memory simulation over WebSocket (`/ws`), server-sent events
//! (`/events`) and REST.
//!
//! # Usage
//!
//! ```bash
//! # Default: 127.0.0.1:8080 with 2000 demo platforms
//! feed-server
//!
//! # Custom port, config file and auto-start
//! feed-server --port 9000 --config feed.json --start
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use platform_feed::{create_router, AppState, FeedResult, InMemorySource, ServerConfig};

/// Real-time platform state server
#[derive(Parser, Debug)]
#[command(name = "feed-server")]
#[command(about = "Real-time platform state distribution server")]
#[command(version)]
struct Args {
    /// JSON config file; missing fields use defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// HTTP port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of demo platforms to seed
    #[arg(long, default_value = "2000")]
    demo_platforms: usize,

    /// Start the simulation immediately
    #[arg(long)]
    start: bool,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> FeedResult<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate()?;

    let source = Arc::new(InMemorySource::with_demo_platforms(args.demo_platforms));
    let state = Arc::new(AppState::new(source.clone(), config.clone()));
    state.spawn_tasks();

    if args.start {
        if let Err(e) = state.control.start() {
            warn!("Could not start simulation: {}", e);
        }
    }

    // Demo physics: integrate velocities at the broadcast cadence
    let tick = config.hub.tick_interval();
    tokio::spawn(async move {
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            source.advance(tick.as_secs_f64());
        }
    });

    let addr = config.addr();
    info!("Platform Feed v{}", platform_feed::VERSION);
    info!("HTTP server: http://{}", addr);
    info!("WebSocket: ws://{}/ws", addr);
    info!("Event stream: http://{}/events", addr);
    info!("{} demo platforms loaded", args.demo_platforms);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, create_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let stats = state.hub.stats();
    info!(
        "Shutting down: {} frames published, {} dropped",
        stats.published, stats.displaced
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
