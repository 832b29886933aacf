//! Room relay signaling server binary
//!
//! # Usage
//!
//! ```bash
//! # Listen on all interfaces, port 8080
//! cargo run -p clive-signaling-server
//!
//! # Custom address with debug logging
//! RUST_LOG=debug cargo run -p clive-signaling-server -- --addr 127.0.0.1:9000
//! ```

use anyhow::Context;
use clap::Parser;
use clive_signaling_server::SignalingServer;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// clive room relay
///
/// Relays text frames between websocket clients that share a room.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0:8080", env = "CLIVE_SIGNALING_ADDR")]
    addr: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_handler = shutdown_tx.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCtrl+C received, shutting down...");
        if shutdown_handler.send(()).is_err() {
            std::process::exit(130);
        }
    })
    .context("Failed to set Ctrl+C handler")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("relay-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args, shutdown_tx))
}

async fn async_main(args: Args, shutdown_tx: broadcast::Sender<()>) -> anyhow::Result<()> {
    init_tracing();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        "clive signaling relay starting"
    );

    let server = SignalingServer::bind(&args.addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.addr))?;
    server.run(shutdown_tx.subscribe()).await;

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
