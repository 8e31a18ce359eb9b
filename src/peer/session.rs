use super::bitfield::Bitfield;
use super::error::PeerError;
use super::message::{Handshake, Message};
use super::peer_id::PeerId;
use super::state::ChokingState;
use super::transport::PeerTransport;
use crate::constants::{
    BLOCK_SIZE, CONNECT_TIMEOUT, HANDSHAKE_TIMEOUT, KEEP_ALIVE_INTERVAL, MAX_HASH_FAILURES,
    MAX_PIPELINE,
};
use crate::metainfo::InfoHash;
use crate::piece::{PieceError, PieceManager, PieceState};
use crate::tracker::Peer;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::{interval_at, timeout, Instant, Interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// One thing the session loop reacted to.
enum Event {
    Cancelled,
    Tick,
    Broadcast(u32),
    BroadcastLagged,
    Incoming(Message),
}

/// A download session with a single peer.
///
/// The session owns its TCP stream and peer state exclusively; the
/// piece manager is the only shared state it touches. It claims one
/// piece at a time from the set the peer advertises, pipelines block
/// requests, and hands completed pieces to the manager for
/// verification. On any exit path the session's live claim is
/// released.
pub struct PeerSession {
    addr: SocketAddr,
    remote_id: PeerId,
    flags: ChokingState,
    peer_bitfield: Bitfield,
    manager: Arc<PieceManager>,
    transport: PeerTransport,
    token: CancellationToken,
    have_tx: broadcast::Sender<u32>,
    have_rx: broadcast::Receiver<u32>,
    hash_failures: u32,
}

impl PeerSession {
    /// Connects to a peer and exchanges handshakes.
    ///
    /// The TCP connect is bounded by the connect timeout and the
    /// cancellation token; the handshake exchange by its own timeout.
    /// A handshake whose info hash names a different payload is
    /// rejected and the connection dropped. The peer ID the tracker
    /// reported is informational and never validated.
    pub async fn connect(
        peer: &Peer,
        info_hash: InfoHash,
        our_id: PeerId,
        manager: Arc<PieceManager>,
        token: CancellationToken,
        have_tx: broadcast::Sender<u32>,
    ) -> Result<Self, PeerError> {
        let connect = timeout(CONNECT_TIMEOUT, TcpStream::connect(peer.addr));
        let stream = tokio::select! {
            _ = token.cancelled() => return Err(PeerError::Cancelled),
            result = connect => result.map_err(|_| PeerError::Timeout)??,
        };

        let mut transport = PeerTransport::new(stream);

        let handshake = Handshake::new(*info_hash.as_bytes(), *our_id.as_bytes());
        transport.send_handshake(&handshake).await?;

        let exchange = timeout(HANDSHAKE_TIMEOUT, transport.read_handshake());
        let theirs = tokio::select! {
            _ = token.cancelled() => return Err(PeerError::Cancelled),
            result = exchange => result.map_err(|_| PeerError::Timeout)??,
        };

        if theirs.info_hash != *info_hash.as_bytes() {
            return Err(PeerError::HandshakeRejected("info hash mismatch"));
        }

        let remote_id = PeerId(theirs.peer_id);
        debug!(peer = %peer.addr, id = %remote_id, "handshake complete");

        let piece_count = manager.piece_count();
        let have_rx = have_tx.subscribe();

        Ok(Self {
            addr: peer.addr,
            remote_id,
            flags: ChokingState::default(),
            peer_bitfield: Bitfield::new(piece_count),
            manager,
            transport,
            token,
            have_tx,
            have_rx,
            hash_failures: 0,
        })
    }

    /// Returns the peer ID the peer presented in its handshake.
    pub fn remote_id(&self) -> &PeerId {
        &self.remote_id
    }

    /// Drives the session until the payload completes, the peer
    /// fails, or the supervisor cancels.
    ///
    /// Cancellation is not an error: the stream is closed, any claim
    /// is released, and `Ok(())` is returned.
    pub async fn run(mut self) -> Result<(), PeerError> {
        let mut keepalive = interval_at(
            Instant::now() + KEEP_ALIVE_INTERVAL,
            KEEP_ALIVE_INTERVAL,
        );

        loop {
            if self.manager.is_complete() {
                return Ok(());
            }

            if self.flags.can_request() {
                if let Some(index) = self.claim_from_peer() {
                    match self.download_piece(index, &mut keepalive).await {
                        Ok(()) => continue,
                        Err(PeerError::Cancelled) => {
                            self.manager.requeue(index);
                            return Ok(());
                        }
                        Err(e) => {
                            self.manager.requeue(index);
                            return Err(e);
                        }
                    }
                }
            }

            match self.next_event(&mut keepalive).await? {
                Event::Cancelled => return Ok(()),
                Event::Tick => self.transport.send_message(&Message::KeepAlive).await?,
                Event::Broadcast(piece) => {
                    self.transport.send_message(&Message::Have { piece }).await?
                }
                Event::BroadcastLagged => {}
                Event::Incoming(message) => self.handle_control(message).await?,
            }
        }
    }

    /// Waits for the next thing the session must react to.
    async fn next_event(&mut self, keepalive: &mut Interval) -> Result<Event, PeerError> {
        tokio::select! {
            _ = self.token.cancelled() => Ok(Event::Cancelled),
            _ = keepalive.tick() => Ok(Event::Tick),
            result = self.have_rx.recv() => match result {
                Ok(piece) => Ok(Event::Broadcast(piece)),
                Err(broadcast::error::RecvError::Lagged(_)) => Ok(Event::BroadcastLagged),
                // The swarm holds the sender for the session's
                // lifetime; a closed channel means shutdown.
                Err(broadcast::error::RecvError::Closed) => Ok(Event::Cancelled),
            },
            result = self.transport.read_message() => result.map(Event::Incoming),
        }
    }

    /// Applies a message received outside a piece download.
    async fn handle_control(&mut self, message: Message) -> Result<(), PeerError> {
        match message {
            Message::KeepAlive => {}
            Message::Choke => self.flags.peer_choking = true,
            Message::Unchoke => self.flags.peer_choking = false,
            Message::Interested => self.flags.peer_interested = true,
            Message::NotInterested => self.flags.peer_interested = false,
            Message::Have { piece } => {
                self.peer_bitfield.set_piece(piece as usize);
            }
            Message::Bitfield(bits) => {
                self.peer_bitfield = Bitfield::from_bytes(bits, self.manager.piece_count());
                trace!(
                    peer = %self.addr,
                    pieces = self.peer_bitfield.count(),
                    "bitfield received"
                );
            }
            // A block with no request outstanding is a protocol
            // violation.
            Message::Piece { index, begin, .. } => {
                return Err(PeerError::UnexpectedBlock { index, begin });
            }
            Message::Request { .. } => {
                trace!(peer = %self.addr, "ignoring request while choking");
            }
            Message::Cancel { .. } | Message::Port(_) => {}
        }

        self.update_interest().await
    }

    /// Sends `Interested` once the peer advertises anything we still
    /// need.
    async fn update_interest(&mut self) -> Result<(), PeerError> {
        if !self.flags.am_interested && self.wants_from_peer() {
            self.transport.send_message(&Message::Interested).await?;
            self.flags.am_interested = true;
            debug!(peer = %self.addr, "interested");
        }
        Ok(())
    }

    fn wants_from_peer(&self) -> bool {
        self.peer_bitfield
            .available_pieces()
            .any(|i| self.manager.piece_state(i as u32) == Some(PieceState::Unclaimed))
    }

    /// Claims the first unclaimed piece this peer advertises.
    fn claim_from_peer(&self) -> Option<u32> {
        self.peer_bitfield
            .available_pieces()
            .map(|i| i as u32)
            .find(|&i| self.manager.claim(i))
    }

    /// Downloads one claimed piece block by block.
    ///
    /// Up to `MAX_PIPELINE` requests stay in flight. A `Choke` voids
    /// the outstanding requests; they are re-issued after `Unchoke`.
    /// Any block that does not match an outstanding request ends the
    /// session.
    async fn download_piece(
        &mut self,
        index: u32,
        keepalive: &mut Interval,
    ) -> Result<(), PeerError> {
        let piece_size = self.manager.piece_size(index) as u32;
        let mut buffer = vec![0u8; piece_size as usize];

        let mut pending: VecDeque<(u32, u32)> = VecDeque::new();
        let mut offset = 0;
        while offset < piece_size {
            let length = BLOCK_SIZE.min(piece_size - offset);
            pending.push_back((offset, length));
            offset += length;
        }

        let mut in_flight: HashMap<u32, u32> = HashMap::new();
        let mut remaining = pending.len();

        trace!(peer = %self.addr, piece = index, blocks = remaining, "downloading piece");

        while remaining > 0 {
            if !self.flags.peer_choking {
                while in_flight.len() < MAX_PIPELINE {
                    let Some((begin, length)) = pending.pop_front() else {
                        break;
                    };
                    self.transport
                        .send_message(&Message::Request {
                            index,
                            begin,
                            length,
                        })
                        .await?;
                    in_flight.insert(begin, length);
                }
            }

            match self.next_event(keepalive).await? {
                Event::Cancelled => return Err(PeerError::Cancelled),
                Event::Tick => self.transport.send_message(&Message::KeepAlive).await?,
                Event::Broadcast(piece) => {
                    self.transport.send_message(&Message::Have { piece }).await?
                }
                Event::BroadcastLagged => {}
                Event::Incoming(message) => match message {
                    Message::Choke => {
                        self.flags.peer_choking = true;
                        // Outstanding requests are void once choked;
                        // queue them again in offset order.
                        let mut voided: Vec<(u32, u32)> = in_flight.drain().collect();
                        voided.sort_unstable();
                        for block in voided.into_iter().rev() {
                            pending.push_front(block);
                        }
                        debug!(peer = %self.addr, piece = index, "choked mid-piece");
                    }
                    Message::Unchoke => self.flags.peer_choking = false,
                    Message::Piece {
                        index: piece_index,
                        begin,
                        data,
                    } => {
                        if piece_index != index {
                            return Err(PeerError::UnexpectedBlock {
                                index: piece_index,
                                begin,
                            });
                        }
                        match in_flight.remove(&begin) {
                            Some(length) if length as usize == data.len() => {
                                let start = begin as usize;
                                buffer[start..start + data.len()].copy_from_slice(&data);
                                remaining -= 1;
                            }
                            _ => {
                                return Err(PeerError::UnexpectedBlock {
                                    index: piece_index,
                                    begin,
                                });
                            }
                        }
                    }
                    Message::Have { piece } => {
                        self.peer_bitfield.set_piece(piece as usize);
                    }
                    Message::Bitfield(bits) => {
                        self.peer_bitfield =
                            Bitfield::from_bytes(bits, self.manager.piece_count());
                    }
                    Message::Interested => self.flags.peer_interested = true,
                    Message::NotInterested => self.flags.peer_interested = false,
                    Message::Request { .. } => {
                        trace!(peer = %self.addr, "ignoring request while choking");
                    }
                    Message::KeepAlive | Message::Cancel { .. } | Message::Port(_) => {}
                },
            }
        }

        self.manager.mark_downloaded(index, &buffer);

        match self.manager.verify(index) {
            Ok(()) => {
                debug!(peer = %self.addr, piece = index, "piece verified");
                let _ = self.have_tx.send(index);
                Ok(())
            }
            Err(PieceError::HashMismatch(_)) => {
                self.hash_failures += 1;
                warn!(
                    peer = %self.addr,
                    piece = index,
                    strikes = self.hash_failures,
                    "piece failed verification"
                );
                // Free the piece for another peer; the manager keeps
                // the per-piece failure count.
                self.manager.requeue(index);
                if self.hash_failures >= MAX_HASH_FAILURES {
                    Err(PeerError::TooManyHashFailures)
                } else {
                    Ok(())
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
