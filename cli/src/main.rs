#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

use std::path::PathBuf;

use canvas::normalize::{Dims, Point};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;
use tutorboard::net::{self, HttpStorage, NetError};
use tutorboard::storage::{RoomStorage, StorageError};
use tutorboard::sync::{Inbox, Incoming};
use tutorboard::session::Routed;
use tutorboard::{Command as SessionCommand, Participant, Role, Runtime, SessionConfig, SessionError, VoiceRole};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Net(#[from] NetError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("health check failed with HTTP {0}")]
    Unhealthy(u16),
    #[error("room `{0}` has no snapshot")]
    NoSnapshot(String),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("event encode failed: {0}")]
    Event(#[from] frames::EventError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Parser, Debug)]
#[command(name = "tutorboard", about = "Tutoring session relay CLI")]
struct Cli {
    #[arg(long, env = "TUTORBOARD_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "TUTORBOARD_NAME", default_value = "cli")]
    name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the relay's health endpoint.
    Ping,
    Snapshot(SnapshotCommand),
    /// Join a room and print every event as one JSON line, optionally
    /// rendering the board to a PNG on exit.
    Watch(WatchArgs),
    /// Draw one stroke as the room's tutor.
    Draw(DrawArgs),
    /// Clear the board as the room's tutor.
    Clear(CanvasArgs),
    /// Post a question as a student.
    Ask { room: String, text: String },
}

#[derive(Args, Debug)]
struct SnapshotCommand {
    #[command(subcommand)]
    command: SnapshotSubcommand,
}

#[derive(Subcommand, Debug)]
enum SnapshotSubcommand {
    /// Download a room's snapshot PNG.
    Get {
        room: String,
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Upload a PNG as a room's snapshot.
    Put { room: String, file: PathBuf },
}

#[derive(Args, Debug)]
struct WatchArgs {
    room: String,

    #[arg(long, default_value = "student", value_parser = parse_role)]
    role: Role,

    #[arg(long, help = "Exit after this many events")]
    count: Option<usize>,

    #[arg(long, help = "Render the board here on exit")]
    out: Option<PathBuf>,

    #[arg(long, default_value = "1280x720", value_parser = parse_dims)]
    canvas: Dims,
}

#[derive(Args, Debug)]
struct CanvasArgs {
    room: String,

    #[arg(long, default_value = "1920x1080", value_parser = parse_dims)]
    canvas: Dims,
}

#[derive(Args, Debug)]
struct DrawArgs {
    #[command(flatten)]
    target: CanvasArgs,

    #[arg(long, value_parser = parse_point)]
    from: Point,

    #[arg(long, value_parser = parse_point)]
    to: Point,

    #[arg(long, default_value = "#000000")]
    color: String,

    #[arg(long, default_value_t = 2.0)]
    width: f64,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Ping => run_ping(&cli.base_url).await,
        Command::Snapshot(snapshot) => run_snapshot(&cli.base_url, snapshot).await,
        Command::Watch(args) => run_watch(&cli.base_url, &cli.name, args).await,
        Command::Draw(args) => {
            let commands = vec![
                SessionCommand::Resize(args.target.canvas),
                SessionCommand::Draw { from: args.from, to: args.to, color: args.color, width_px: args.width },
            ];
            run_session(&cli.base_url, &args.target.room, Role::Tutor, &cli.name, commands).await
        }
        Command::Clear(args) => {
            let commands = vec![SessionCommand::Resize(args.canvas), SessionCommand::Clear];
            run_session(&cli.base_url, &args.room, Role::Tutor, &cli.name, commands).await
        }
        Command::Ask { room, text } => {
            run_session(&cli.base_url, &room, Role::Student, &cli.name, vec![SessionCommand::Ask(text)]).await
        }
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let status = reqwest::get(url).await?.status();
    if !status.is_success() {
        return Err(CliError::Unhealthy(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

async fn run_snapshot(base_url: &str, snapshot: SnapshotCommand) -> Result<(), CliError> {
    let storage = HttpStorage::new(base_url)?;
    match snapshot.command {
        SnapshotSubcommand::Get { room, out } => {
            let png = storage.load(&room).await?.ok_or_else(|| CliError::NoSnapshot(room.clone()))?;
            tokio::fs::write(&out, &png).await.map_err(|source| CliError::Io { path: out.clone(), source })?;
            eprintln!("wrote {} bytes to {}", png.len(), out.display());
        }
        SnapshotSubcommand::Put { room, file } => {
            let png = tokio::fs::read(&file).await.map_err(|source| CliError::Io { path: file.clone(), source })?;
            let size = png.len();
            storage.save(&room, png).await?;
            eprintln!("stored {size} bytes for room {room}");
        }
    }
    Ok(())
}

async fn run_watch(base_url: &str, name: &str, args: WatchArgs) -> Result<(), CliError> {
    let link = net::connect(base_url, &args.room, args.role, name).await?;
    eprintln!("joined {} as {} ({})", args.room, args.role, link.id);
    let mut board = match args.out {
        Some(_) => Some(local_board(base_url, &link.id, name, &args).await?),
        None => None,
    };
    let mut inbox = link.inbox;
    let mut seen = 0_usize;

    loop {
        let incoming = tokio::select! {
            incoming = inbox.recv() => incoming,
            _ = tokio::signal::ctrl_c() => break,
        };
        let line = match incoming {
            Some(Incoming::Event(inbound)) => {
                let mut frame = inbound.event.clone().into_frame(&args.room)?;
                frame.from.clone_from(&inbound.from);
                if let Some(participant) = board.as_mut() {
                    if let Routed::Ignored = participant.apply_remote(inbound, Instant::now()) {
                        tracing::debug!(event = %frame.event, "event ignored by local board");
                    }
                }
                serde_json::to_string(&frame)?
            }
            Some(Incoming::PeerLeft(peer)) => {
                if let Some(participant) = board.as_mut() {
                    participant.on_peer_left(&peer);
                }
                serde_json::json!({ "event": frames::ROOM_PART, "from": peer }).to_string()
            }
            None => break,
        };
        println!("{line}");
        seen += 1;
        if args.count.is_some_and(|limit| seen >= limit) {
            break;
        }
    }

    if let Err(e) = link.out.close().await {
        tracing::debug!(error = %e, "close failed");
    }
    if let (Some(participant), Some(out)) = (board, args.out) {
        if let Some(png) = participant.snapshot()? {
            tokio::fs::write(&out, &png).await.map_err(|source| CliError::Io { path: out.clone(), source })?;
            eprintln!("wrote board ({} bytes) to {}", png.len(), out.display());
        }
    }
    Ok(())
}

/// A laid-out participant seeded with the room's saved board.
async fn local_board(base_url: &str, id: &str, name: &str, args: &WatchArgs) -> Result<Participant, CliError> {
    let config = SessionConfig::from_env();
    let mut participant = Participant::new(id, name, args.role, config.load_fonts(), &config);
    match HttpStorage::new(base_url)?.load(&args.room).await {
        Ok(Some(png)) => participant.restore_board(png)?,
        Ok(None) => {}
        Err(e) => tracing::warn!(room = %args.room, error = %e, "snapshot load failed; starting blank"),
    }
    participant.set_dims(args.canvas)?;
    Ok(participant)
}

/// Join `room`, run `commands` through a session runtime, then leave. The
/// runtime saves the tutor's board on the way out.
async fn run_session(
    base_url: &str,
    room: &str,
    role: Role,
    name: &str,
    commands: Vec<SessionCommand>,
) -> Result<(), CliError> {
    let config = SessionConfig::from_env();
    let storage = HttpStorage::new(base_url)?;
    let link = net::connect(base_url, room, role, name).await?;
    let participant = Participant::new(link.id, name, role, config.load_fonts(), &config);
    let closer = link.out.clone();

    let (tx, rx) = mpsc::channel(commands.len().max(1));
    for command in commands {
        if tx.send(command).await.is_err() {
            break;
        }
    }
    drop(tx);

    let runtime = Runtime::new(participant, VoiceRole::Disabled, link.inbox, link.out, storage, room, config);
    let participant = runtime.run(rx, std::future::pending()).await;
    if let Some(entry) = participant.qa().iter().last() {
        eprintln!("posted question {}", entry.id);
    }
    if let Err(e) = closer.close().await {
        tracing::debug!(error = %e, "close failed");
    }
    Ok(())
}

// =============================================================================
// ARGUMENT PARSING
// =============================================================================

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse::<Role>().map_err(|e| e.to_string())
}

fn parse_point(raw: &str) -> Result<Point, String> {
    let (x, y) = raw.split_once(',').ok_or_else(|| format!("expected `x,y`, got `{raw}`"))?;
    let x = x.trim().parse::<f64>().map_err(|e| format!("bad x: {e}"))?;
    let y = y.trim().parse::<f64>().map_err(|e| format!("bad y: {e}"))?;
    if !x.is_finite() || !y.is_finite() {
        return Err(format!("non-finite point `{raw}`"));
    }
    Ok(Point::new(x, y))
}

fn parse_dims(raw: &str) -> Result<Dims, String> {
    let (w, h) = raw.split_once(['x', 'X']).ok_or_else(|| format!("expected `WIDTHxHEIGHT`, got `{raw}`"))?;
    let width = w.trim().parse::<u32>().map_err(|e| format!("bad width: {e}"))?;
    let height = h.trim().parse::<u32>().map_err(|e| format!("bad height: {e}"))?;
    let dims = Dims::new(width, height);
    if !dims.is_measured() {
        return Err("canvas sides must be positive".to_owned());
    }
    Ok(dims)
}
