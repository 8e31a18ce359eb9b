//! remora - a leech-only BitTorrent client
//!
//! Given a metainfo file, remora contacts the torrent's trackers,
//! connects to peers over the wire protocol, and downloads and
//! verifies every piece of the payload.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 bencode encoding/decoding
//! - [`metainfo`] - Torrent metainfo parsing and the info hash
//! - [`tracker`] - HTTP tracker announces and peer discovery
//! - [`piece`] - Piece lifecycle registry shared across sessions
//! - [`peer`] - Peer wire protocol and download sessions
//! - [`swarm`] - Bounded-concurrency session supervision

pub mod bencode;
pub mod constants;
pub mod metainfo;
pub mod peer;
pub mod piece;
pub mod swarm;
pub mod tracker;

pub use bencode::{decode, encode, BencodeError, Value};
pub use metainfo::{File, Info, InfoHash, Metainfo, MetainfoError};
pub use peer::{
    Bitfield, ChokingState, Handshake, Message, PeerError, PeerId, PeerSession, PeerTransport,
};
pub use piece::{PieceError, PieceManager, PieceState};
pub use swarm::{Swarm, SwarmConfig, SwarmError};
pub use tracker::{AnnounceResponse, HttpTracker, Peer, TrackerError, TrackerEvent, TrackerSet};
