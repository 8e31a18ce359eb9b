use super::error::TrackerError;
use crate::bencode::Value;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// A peer endpoint returned from a tracker.
///
/// Compact responses carry only an address; dictionary responses may
/// also carry the peer's self-reported 20-byte ID, which is retained
/// as informational metadata (the handshake never checks it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// The peer's socket address (IP and port).
    pub addr: SocketAddr,
    /// The peer's 20-byte ID, when the tracker reported one.
    pub peer_id: Option<[u8; 20]>,
}

impl Peer {
    /// Creates a new peer with just an address.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            peer_id: None,
        }
    }

    /// Creates a new peer with address and peer ID.
    pub fn with_id(addr: SocketAddr, peer_id: [u8; 20]) -> Self {
        Self {
            addr,
            peer_id: Some(peer_id),
        }
    }

    /// Parses a peer from one compact IPv4 group (6 bytes).
    ///
    /// Format: 4 bytes IP followed by 2 bytes big-endian port.
    pub fn from_compact(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 6 {
            return None;
        }
        let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
        let port = u16::from_be_bytes([bytes[4], bytes[5]]);
        Some(Self {
            addr: SocketAddr::new(IpAddr::V4(ip), port),
            peer_id: None,
        })
    }
}

/// The event reported with an announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEvent {
    None,
    Started,
    Stopped,
    Completed,
}

impl TrackerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerEvent::None => "",
            TrackerEvent::Started => "started",
            TrackerEvent::Stopped => "stopped",
            TrackerEvent::Completed => "completed",
        }
    }
}

/// A parsed announce response.
#[derive(Debug, Clone)]
pub struct AnnounceResponse {
    /// Seconds the tracker asks us to wait between announces.
    pub interval: Duration,
    /// Hard lower bound on the announce interval, when given.
    pub min_interval: Option<Duration>,
    /// Number of seeders, when given.
    pub complete: Option<u32>,
    /// Number of leechers, when given.
    pub incomplete: Option<u32>,
    /// Non-fatal warning from the tracker.
    pub warning_message: Option<String>,
    /// The peer set.
    pub peers: Vec<Peer>,
}

/// Parses a compact peer list: 6 bytes per peer, IPv4 plus big-endian
/// port.
///
/// An empty byte string parses to an empty list. A length that is not
/// a multiple of 6 is malformed.
///
/// # Examples
///
/// ```
/// use remora::tracker::parse_compact_peers;
///
/// let peers = parse_compact_peers(b"\x7f\x00\x00\x01\x1a\xe1").unwrap();
/// assert_eq!(peers[0].addr.to_string(), "127.0.0.1:6881");
/// ```
pub fn parse_compact_peers(data: &[u8]) -> Result<Vec<Peer>, TrackerError> {
    if data.len() % 6 != 0 {
        return Err(TrackerError::Malformed("compact peers length"));
    }

    Ok(data.chunks_exact(6).filter_map(Peer::from_compact).collect())
}

/// Parses a dictionary-form peer list: entries `{ip, port, peer id?}`.
///
/// Entries with a missing or unparsable address are dropped; a
/// `peer id` is kept only when it is exactly 20 bytes.
pub(crate) fn parse_peer_dicts(list: &[Value]) -> Vec<Peer> {
    let mut peers = Vec::new();

    for entry in list {
        let Some(dict) = entry.as_dict() else {
            continue;
        };

        let ip: Option<IpAddr> = dict
            .get(b"ip".as_slice())
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok());

        let port = dict
            .get(b"port".as_slice())
            .and_then(|v| v.as_integer())
            .filter(|&p| (1..=u16::MAX as i64).contains(&p))
            .map(|p| p as u16);

        let (Some(ip), Some(port)) = (ip, port) else {
            continue;
        };

        let peer_id = dict
            .get(b"peer id".as_slice())
            .and_then(|v| v.as_bytes())
            .filter(|b| b.len() == 20)
            .map(|b| {
                let mut id = [0u8; 20];
                id.copy_from_slice(b);
                id
            });

        let addr = SocketAddr::new(ip, port);
        peers.push(match peer_id {
            Some(id) => Peer::with_id(addr, id),
            None => Peer::new(addr),
        });
    }

    peers
}
