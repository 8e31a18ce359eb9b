//! Command-line front-end.
//!
//! `remora <torrent-file>` downloads the payload described by the
//! metainfo file and writes it next to the working directory when the
//! download completes. Logs go to `./app.log`; warnings and fatal
//! errors also reach stderr. `DEBUG=1` raises the log level.

use anyhow::{Context, Result};
use clap::Parser;
use remora::constants::{DEFAULT_PORT, MAX_CONCURRENT_PEERS};
use remora::{Metainfo, PeerId, PieceManager, Swarm, SwarmConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(author, version, about = "A leech-only BitTorrent client")]
struct Args {
    /// Path to the .torrent file
    torrent: PathBuf,

    /// Listen port reported to trackers
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum concurrent peer sessions
    #[arg(long, default_value_t = MAX_CONCURRENT_PEERS)]
    max_peers: usize,

    /// Output filename (defaults to the name from the torrent)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let appender = tracing_appender::rolling::never(".", "app.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let verbose = std::env::var("DEBUG").map(|v| v == "1").unwrap_or(false);
    let file_filter = if verbose { "remora=debug" } else { "remora=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new(file_filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::filter::LevelFilter::WARN),
        )
        .init();

    guard
}

/// Replaces path separators so a hostile torrent name cannot escape
/// the working directory.
fn sanitize_filename(name: &str) -> String {
    let safe = name.replace(['/', '\\'], "_");
    if safe.trim().is_empty() {
        "download".to_string()
    } else {
        safe
    }
}

fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(_) => {
                    let _ = ctrl_c.await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        info!("shutdown signal received");
        token.cancel();
    });
}

async fn run(args: Args) -> Result<bool> {
    let metainfo = Metainfo::from_file(&args.torrent)
        .with_context(|| format!("could not load torrent file {}", args.torrent.display()))?;

    info!(
        name = %metainfo.info.name,
        pieces = metainfo.info.piece_count(),
        bytes = metainfo.info.total_length,
        info_hash = %metainfo.info_hash,
        "torrent loaded"
    );

    let manager = PieceManager::from_metainfo(&metainfo);
    let peer_id = PeerId::generate();
    let token = CancellationToken::new();
    spawn_signal_handler(token.clone());

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(sanitize_filename(&metainfo.info.name)));

    let config = SwarmConfig {
        port: args.port,
        max_peers: args.max_peers,
        ..Default::default()
    };

    let swarm = Swarm::new(metainfo, peer_id, Arc::clone(&manager), config, token);
    let complete = swarm.run().await?;

    if complete {
        let payload = manager.assemble().context("assembling payload")?;
        std::fs::write(&output, &payload)
            .with_context(|| format!("could not write {}", output.display()))?;
        println!("Saved \"{}\".", output.display());
    }

    Ok(complete)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let _guard = init_logging();

    match run(args).await {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("download did not complete");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "fatal");
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
