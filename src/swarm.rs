//! Swarm supervision.
//!
//! Announces to the torrent's trackers, fans out one session task per
//! peer endpoint under a concurrency bound, and watches the piece
//! manager for completion. Cancellation of the root token (by the
//! completion watcher, a signal, or the caller) unwinds every
//! session.

use crate::constants::{COMPLETION_POLL_INTERVAL, DEFAULT_PORT, MAX_CONCURRENT_PEERS};
use crate::metainfo::{InfoHash, Metainfo};
use crate::peer::{PeerError, PeerId, PeerSession};
use crate::piece::PieceManager;
use crate::tracker::{Peer, TrackerError, TrackerEvent, TrackerSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("no peers available")]
    NoPeers,
}

/// Tuning knobs for a swarm run.
#[derive(Debug, Clone)]
pub struct SwarmConfig {
    /// Listen port reported to trackers.
    pub port: u16,
    /// Maximum peer sessions running at once.
    pub max_peers: usize,
    /// How often the completion watcher polls the piece manager.
    pub poll_interval: Duration,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_peers: MAX_CONCURRENT_PEERS,
            poll_interval: COMPLETION_POLL_INTERVAL,
        }
    }
}

/// Orchestrates one download: tracker announces, peer sessions, and
/// completion detection.
pub struct Swarm {
    metainfo: Metainfo,
    peer_id: PeerId,
    manager: Arc<PieceManager>,
    config: SwarmConfig,
    token: CancellationToken,
}

impl Swarm {
    /// Creates a swarm rooted in the given cancellation token.
    ///
    /// Cancelling the token (e.g. from a signal handler) shuts the
    /// swarm down gracefully.
    pub fn new(
        metainfo: Metainfo,
        peer_id: PeerId,
        manager: Arc<PieceManager>,
        config: SwarmConfig,
        token: CancellationToken,
    ) -> Self {
        Self {
            metainfo,
            peer_id,
            manager,
            config,
            token,
        }
    }

    /// Runs the swarm to completion or cancellation.
    ///
    /// Returns `Ok(true)` when every piece verified, `Ok(false)` when
    /// the run was cancelled first. Tracker exhaustion and an empty
    /// peer set are the only fatal errors.
    pub async fn run(self) -> Result<bool, SwarmError> {
        let info_hash = *self.metainfo.info_hash.as_bytes();
        let our_id = *self.peer_id.as_bytes();

        let mut trackers = TrackerSet::new(&self.metainfo.trackers());
        let left = self.manager.bytes_left();
        let peers = trackers
            .announce(&info_hash, &our_id, self.config.port, 0, 0, left)
            .await?;

        if peers.is_empty() {
            return Err(SwarmError::NoPeers);
        }

        info!(
            name = %self.metainfo.info.name,
            peers = peers.len(),
            pieces = self.manager.piece_count(),
            "starting swarm"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_peers));
        let (have_tx, _) = broadcast::channel(256);

        let mut handles = Vec::with_capacity(peers.len());
        for peer in peers {
            handles.push(tokio::spawn(session_task(
                peer,
                self.metainfo.info_hash,
                self.peer_id,
                Arc::clone(&self.manager),
                Arc::clone(&semaphore),
                self.token.child_token(),
                have_tx.clone(),
            )));
        }

        let watcher = tokio::spawn(watch_completion(
            Arc::clone(&self.manager),
            self.token.clone(),
            self.config.poll_interval,
        ));

        for handle in handles {
            let _ = handle.await;
        }

        // Every session has returned; stop the watcher even if the
        // payload is incomplete (peer exhaustion).
        self.token.cancel();
        let _ = watcher.await;

        let complete = self.manager.is_complete();
        let event = if complete {
            TrackerEvent::Completed
        } else {
            TrackerEvent::Stopped
        };

        let left = self.manager.bytes_left();
        let downloaded = self.metainfo.info.total_length.saturating_sub(left);
        trackers
            .announce_event(
                event,
                &info_hash,
                &our_id,
                self.config.port,
                0,
                downloaded,
                left,
            )
            .await;

        if complete {
            info!(name = %self.metainfo.info.name, "download complete");
        } else {
            warn!(name = %self.metainfo.info.name, left, "stopped before completion");
        }

        Ok(complete)
    }
}

/// Runs one peer session once a concurrency slot is free.
async fn session_task(
    peer: Peer,
    info_hash: InfoHash,
    our_id: PeerId,
    manager: Arc<PieceManager>,
    semaphore: Arc<Semaphore>,
    token: CancellationToken,
    have_tx: broadcast::Sender<u32>,
) {
    let _permit = tokio::select! {
        _ = token.cancelled() => return,
        permit = semaphore.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return,
        },
    };

    if token.is_cancelled() {
        return;
    }

    debug!(peer = %peer.addr, "session starting");

    match PeerSession::connect(&peer, info_hash, our_id, manager, token, have_tx).await {
        Ok(session) => match session.run().await {
            Ok(()) => debug!(peer = %peer.addr, "session finished"),
            Err(e) => debug!(peer = %peer.addr, error = %e, "session ended"),
        },
        Err(PeerError::Cancelled) => {}
        Err(e) => debug!(peer = %peer.addr, error = %e, "connect failed"),
    }
}

/// Polls the piece manager and cancels the root token once the
/// payload is whole.
async fn watch_completion(
    manager: Arc<PieceManager>,
    token: CancellationToken,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {
                let verified = manager.verified_count();
                let total = manager.piece_count();
                debug!(verified, total, "completion check");

                if manager.is_complete() {
                    token.cancel();
                    return;
                }
            }
        }
    }
}
