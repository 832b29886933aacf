//! Signaling client binary entry point
//!
//! Joins a room on the relay and negotiates a WebRTC session with the other
//! peer in it.
//!
//! # Usage
//!
//! ```bash
//! # Callee (waits for an offer)
//! cargo run --bin clive -- --room demo
//!
//! # Caller (offers once the other peer joined)
//! cargo run --bin clive -- --room demo --caller --server relay.local:8080
//!
//! # Audio only, with a TURN relay
//! cargo run --bin clive -- --room demo --no-video \
//!   --turn-servers turn:turn.example.com:3478:user:secret
//! ```

use anyhow::Context;
use clap::Parser;
use clive_webrtc::{
    IncomingTrack, MediaConfig, MediaDirection, Role, SessionConfig, SessionController,
    TurnServerConfig,
};
use std::process::ExitCode;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// WebRTC signaling client
///
/// Connects to ws://<server>/ws?room=<room> and runs one offer/answer session.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Room id shared with the remote peer
    #[arg(long, default_value = "default-room", env = "CLIVE_ROOM")]
    room: String,

    /// Signaling server host:port
    #[arg(long, default_value = "localhost:8080", env = "CLIVE_SERVER")]
    server: String,

    /// Create the offer (default: wait for one)
    #[arg(long, default_value_t = false)]
    caller: bool,

    /// STUN servers (comma-separated)
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "stun:stun.l.google.com:19302",
        env = "CLIVE_STUN_SERVERS"
    )]
    stun_servers: Vec<String>,

    /// TURN servers (format: turn:host:port:username:password, comma-separated)
    #[arg(long, value_delimiter = ',', env = "CLIVE_TURN_SERVERS")]
    turn_servers: Vec<String>,

    /// Do not negotiate audio
    #[arg(long, default_value_t = false)]
    no_audio: bool,

    /// Do not negotiate video
    #[arg(long, default_value_t = false)]
    no_video: bool,

    /// Offer sendrecv transceivers instead of recvonly
    ///
    /// Only the negotiated direction changes; no local track is attached, so
    /// nothing is sent.
    #[arg(long, default_value_t = false)]
    send_media: bool,

    /// Signaling connect timeout in seconds
    #[arg(long, default_value_t = 10, env = "CLIVE_CONNECT_TIMEOUT")]
    connect_timeout_secs: u64,

    /// Negotiation timeout per round in seconds (0 disables)
    #[arg(long, default_value_t = 30, env = "CLIVE_NEGOTIATION_TIMEOUT")]
    negotiation_timeout_secs: u64,
}

/// Parse TURN server string (format: turn:host:port:username:password or turns:host:port:username:password)
fn parse_turn_server(s: &str) -> Result<TurnServerConfig, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() < 5 {
        return Err(format!(
            "Invalid TURN server format: '{}'. Expected: turn:host:port:username:password",
            s
        ));
    }

    let protocol = parts[0];
    if protocol != "turn" && protocol != "turns" {
        return Err(format!(
            "Invalid TURN protocol: '{}'. Expected 'turn' or 'turns'",
            protocol
        ));
    }

    // Password may contain colons
    Ok(TurnServerConfig {
        url: format!("{}:{}:{}", protocol, parts[1], parts[2]),
        username: parts[3].to_string(),
        credential: parts[4..].join(":"),
    })
}

/// Build SessionConfig from CLI arguments
fn build_config_from_args(args: &Args) -> anyhow::Result<SessionConfig> {
    let turn_servers = args
        .turn_servers
        .iter()
        .map(|s| parse_turn_server(s).map_err(anyhow::Error::msg))
        .collect::<anyhow::Result<Vec<_>>>()
        .context("Failed to parse TURN server")?;

    let config = SessionConfig {
        server: args.server.clone(),
        room: args.room.clone(),
        role: if args.caller { Role::Caller } else { Role::Callee },
        stun_servers: args.stun_servers.clone(),
        turn_servers,
        media: MediaConfig {
            audio: !args.no_audio,
            video: !args.no_video,
            direction: if args.send_media {
                MediaDirection::SendRecv
            } else {
                MediaDirection::RecvOnly
            },
        },
        connect_timeout_secs: args.connect_timeout_secs,
        negotiation_timeout_secs: args.negotiation_timeout_secs,
    };

    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_handler = shutdown_tx.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCtrl+C received, shutting down...");
        if shutdown_handler.send(()).is_err() {
            // No session listening any more
            std::process::exit(130);
        }
    })
    .context("Failed to set Ctrl+C handler")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("clive-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args, shutdown_tx))
}

async fn async_main(args: Args, shutdown_tx: broadcast::Sender<()>) -> anyhow::Result<ExitCode> {
    init_tracing();

    let config = build_config_from_args(&args)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        role = %config.role,
        room = %config.room,
        server = %config.server,
        stun_servers = config.stun_servers.len(),
        turn_servers = config.turn_servers.len(),
        audio = config.media.audio,
        video = config.media.video,
        direction = ?config.media.direction,
        "clive starting"
    );

    let track_tx = spawn_track_logger();

    let controller = SessionController::from_config(&config)
        .await?
        .with_track_sink(track_tx)
        .with_shutdown(shutdown_tx.subscribe());

    let end = controller.run().await;
    if end.is_clean() {
        info!("Session ended: {}", end);
        Ok(ExitCode::SUCCESS)
    } else {
        error!("Session ended: {}", end);
        Ok(ExitCode::FAILURE)
    }
}

/// Log remote tracks as they are reported; media attach happens elsewhere
fn spawn_track_logger() -> mpsc::UnboundedSender<IncomingTrack> {
    let (track_tx, mut track_rx) = mpsc::unbounded_channel::<IncomingTrack>();
    tokio::spawn(async move {
        while let Some(track) = track_rx.recv().await {
            info!(
                kind = %track.kind,
                track_id = %track.track_id,
                stream_id = %track.stream_id,
                mime_type = %track.mime_type,
                "Remote media attached"
            );
        }
    });
    track_tx
}

/// Initialize tracing subscriber with env filter
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
