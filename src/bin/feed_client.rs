//! Platform Feed Client - Binary Entry Point
//!
//! Subscribes to a feed server, keeps a headless visibility model of the
//! platforms inside a viewport and logs what it sees.
//!
//! # Usage
//!
//! ```bash
//! # Whole globe, WebSocket first
//! feed-client --url http://127.0.0.1:8080
//!
//! # Western Europe over the event stream
//! feed-client --mode stream --viewport 35,-10,60,20 --zoom 5
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use platform_feed::client::{
    ClientCommand, ClientDriver, ClientEvent, ConnectionState, TokioTransport, TransportClient,
};
use platform_feed::{
    ClientConfig, FeedResult, HeadlessBackend, TransportMode, Viewport, VisibilityConfig,
    VisibilityManager,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Duplex,
    Stream,
}

/// Real-time platform feed subscriber
#[derive(Parser, Debug)]
#[command(name = "feed-client")]
#[command(about = "Subscribe to a platform feed server")]
#[command(version)]
struct Args {
    /// Base HTTP URL of the server
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Preferred transport
    #[arg(short, long, value_enum, default_value = "duplex")]
    mode: Mode,

    /// Never fall back from WebSocket to the event stream
    #[arg(long)]
    no_fallback: bool,

    /// Viewport as south,west,north,east in degrees
    #[arg(long, value_parser = parse_viewport)]
    viewport: Option<Viewport>,

    /// Map zoom level used for marker sizing
    #[arg(long, default_value = "6.0")]
    zoom: f64,

    /// Seconds between summary lines
    #[arg(long, default_value = "5")]
    report_secs: u64,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_viewport(text: &str) -> Result<Viewport, String> {
    let parts: Vec<f64> = text
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|e| e.to_string()))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [south, west, north, east] if south < north => {
            Ok(Viewport::new(*south, *west, *north, *east))
        }
        [_, _, _, _] => Err("south must be below north".to_string()),
        _ => Err("expected south,west,north,east".to_string()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> FeedResult<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = ClientConfig {
        url: args.url.clone(),
        preferred_mode: match args.mode {
            Mode::Duplex => TransportMode::Duplex,
            Mode::Stream => TransportMode::Stream,
        },
        fallback_enabled: !args.no_fallback,
        ..ClientConfig::default()
    };
    let visibility_config = VisibilityConfig::default();
    visibility_config.validate()?;

    let visibility = Rc::new(RefCell::new(VisibilityManager::new(
        &visibility_config,
        HeadlessBackend::new(),
    )));
    if let Some(viewport) = args.viewport {
        visibility.borrow_mut().set_viewport(viewport, args.zoom);
    }

    let (transport, events) = TokioTransport::new(&config);
    let mut client = TransportClient::new(config, transport);

    let model = visibility.clone();
    let report_every = Duration::from_secs(args.report_secs.max(1));
    let mut last_report = Instant::now();
    client.on_platforms(move |batch| {
        let mut model = model.borrow_mut();
        model.apply_batch(batch);
        if last_report.elapsed() >= report_every {
            last_report = Instant::now();
            let stats = model.stats();
            info!(
                "{} platforms tracked, {} visible, clustering {}",
                stats.total,
                stats.visible,
                if stats.clustering { "on" } else { "off" }
            );
        }
    });

    client.on_event(|event| match event {
        ClientEvent::StateChanged { from, to } => info!("Connection {} -> {}", from, to),
        ClientEvent::ModeChanged(mode) => info!("Transport switched to {:?}", mode),
        ClientEvent::Status(status) => info!(
            "Simulation {} at t={:.1}s ({} platforms)",
            if status.running { "running" } else { "stopped" },
            status.time,
            status.platform_count
        ),
        ClientEvent::Latency(ms) => info!("Latency {:.1} ms", ms),
        ClientEvent::Error(e) => warn!("{}", e),
    });

    let (mut driver, handle) = ClientDriver::new(client, events);

    // Viewport updates need an open duplex connection; resend after every reconnect
    if let Some(bounds) = args.viewport {
        let zoom = args.zoom;
        let mut mode = driver.client().mode();
        let commands = handle.clone();
        driver.client_mut().on_event(move |event| match event {
            ClientEvent::ModeChanged(switched) => mode = *switched,
            ClientEvent::StateChanged {
                to: ConnectionState::Connected,
                ..
            } => {
                if mode != TransportMode::Duplex {
                    info!("Viewport filtering unavailable over the event stream");
                    return;
                }
                let command = ClientCommand::Viewport {
                    bounds,
                    zoom: Some(zoom),
                };
                if let Err(e) = commands.try_send(command) {
                    warn!("Could not send viewport: {}", e);
                }
            }
            _ => {}
        });
    }

    let control = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutting down");
        let _ = handle.shutdown().await;
    };

    let (client, _) = tokio::join!(driver.run(), control);
    let stats = visibility.borrow().stats();
    info!(
        "Final state {}: {} platforms tracked, {} visible, latency {:.1} ms",
        client.state(),
        stats.total,
        stats.visible,
        client.latency_ms()
    );
    Ok(())
}
