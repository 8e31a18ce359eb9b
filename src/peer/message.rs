use super::error::PeerError;
use crate::constants::{PROTOCOL_STRING, RESERVED_BYTES};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Length of the handshake message in bytes.
pub const HANDSHAKE_LEN: usize = 68;

/// Message type identifiers in the peer wire protocol.
///
/// Each message (except keep-alive) has a one-byte ID following the
/// length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    /// Stop sending data to the peer.
    Choke = 0,
    /// Ready to send data to the peer.
    Unchoke = 1,
    /// Want data from the peer.
    Interested = 2,
    /// Don't want data from the peer.
    NotInterested = 3,
    /// Announce a newly-acquired piece.
    Have = 4,
    /// Announce all available pieces.
    Bitfield = 5,
    /// Request a data block.
    Request = 6,
    /// Send piece data.
    Piece = 7,
    /// Cancel a pending request.
    Cancel = 8,
    /// DHT port announcement.
    Port = 9,
}

impl TryFrom<u8> for MessageId {
    type Error = PeerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageId::Choke),
            1 => Ok(MessageId::Unchoke),
            2 => Ok(MessageId::Interested),
            3 => Ok(MessageId::NotInterested),
            4 => Ok(MessageId::Have),
            5 => Ok(MessageId::Bitfield),
            6 => Ok(MessageId::Request),
            7 => Ok(MessageId::Piece),
            8 => Ok(MessageId::Cancel),
            9 => Ok(MessageId::Port),
            _ => Err(PeerError::InvalidMessageId(value)),
        }
    }
}

/// The BitTorrent handshake message.
///
/// The handshake is the first exchange between peers: a fixed 68-byte
/// layout of protocol string length (19), the ASCII protocol string,
/// 8 reserved bytes (all zero here, no extensions), the info hash,
/// and the sender's peer ID.
#[derive(Debug, Clone)]
pub struct Handshake {
    /// The torrent's info hash.
    pub info_hash: [u8; 20],
    /// The sender's peer ID.
    pub peer_id: [u8; 20],
}

impl Handshake {
    /// Creates a new handshake for the given payload identity.
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self { info_hash, peer_id }
    }

    /// Encodes the handshake to its 68-byte wire form.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL_STRING.len() as u8);
        buf.put_slice(PROTOCOL_STRING.as_bytes());
        buf.put_slice(&RESERVED_BYTES);
        buf.put_slice(&self.info_hash);
        buf.put_slice(&self.peer_id);
        buf.freeze()
    }

    /// Decodes and validates a 68-byte handshake.
    ///
    /// The length byte and protocol string are checked here; the info
    /// hash is checked by the session against the expected payload
    /// identity. Reserved bits are accepted as-is since a peer may
    /// advertise extensions we ignore.
    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        if data.len() < HANDSHAKE_LEN {
            return Err(PeerError::HandshakeRejected("short handshake"));
        }

        if data[0] as usize != PROTOCOL_STRING.len() {
            return Err(PeerError::HandshakeRejected("bad protocol length"));
        }

        if &data[1..20] != PROTOCOL_STRING.as_bytes() {
            return Err(PeerError::HandshakeRejected("unknown protocol"));
        }

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&data[28..48]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);

        Ok(Self { info_hash, peer_id })
    }
}

/// A peer wire protocol message.
///
/// Messages are length-prefixed: a 4-byte big-endian length followed
/// by a 1-byte message ID (except keep-alive, which has length 0) and
/// the message body.
///
/// # Examples
///
/// ```
/// use remora::peer::Message;
///
/// // Request the first 16 KiB of piece 0
/// let request = Message::Request {
///     index: 0,
///     begin: 0,
///     length: 16384,
/// };
///
/// let bytes = request.encode();
/// assert_eq!(bytes.len(), 17); // 4-byte length + 1-byte ID + 12-byte body
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Empty message to keep the connection alive.
    KeepAlive,
    /// We are choking the peer (not sending data).
    Choke,
    /// We are unchoking the peer (ready to send data).
    Unchoke,
    /// We are interested in the peer's data.
    Interested,
    /// We are not interested in the peer's data.
    NotInterested,
    /// Announce that we have a piece.
    Have { piece: u32 },
    /// Bitfield of all pieces the sender has, MSB first.
    Bitfield(Bytes),
    /// Request a block of data.
    Request { index: u32, begin: u32, length: u32 },
    /// A block of piece data.
    Piece { index: u32, begin: u32, data: Bytes },
    /// Cancel a pending request.
    Cancel { index: u32, begin: u32, length: u32 },
    /// DHT port announcement.
    Port(u16),
}

impl Message {
    /// Encodes the message for transmission, including the 4-byte
    /// length prefix.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        match self {
            Message::KeepAlive => {
                buf.put_u32(0);
            }
            Message::Choke => {
                buf.put_u32(1);
                buf.put_u8(MessageId::Choke as u8);
            }
            Message::Unchoke => {
                buf.put_u32(1);
                buf.put_u8(MessageId::Unchoke as u8);
            }
            Message::Interested => {
                buf.put_u32(1);
                buf.put_u8(MessageId::Interested as u8);
            }
            Message::NotInterested => {
                buf.put_u32(1);
                buf.put_u8(MessageId::NotInterested as u8);
            }
            Message::Have { piece } => {
                buf.put_u32(5);
                buf.put_u8(MessageId::Have as u8);
                buf.put_u32(*piece);
            }
            Message::Bitfield(bits) => {
                buf.put_u32(1 + bits.len() as u32);
                buf.put_u8(MessageId::Bitfield as u8);
                buf.put_slice(bits);
            }
            Message::Request {
                index,
                begin,
                length,
            } => {
                buf.put_u32(13);
                buf.put_u8(MessageId::Request as u8);
                buf.put_u32(*index);
                buf.put_u32(*begin);
                buf.put_u32(*length);
            }
            Message::Piece { index, begin, data } => {
                buf.put_u32(9 + data.len() as u32);
                buf.put_u8(MessageId::Piece as u8);
                buf.put_u32(*index);
                buf.put_u32(*begin);
                buf.put_slice(data);
            }
            Message::Cancel {
                index,
                begin,
                length,
            } => {
                buf.put_u32(13);
                buf.put_u8(MessageId::Cancel as u8);
                buf.put_u32(*index);
                buf.put_u32(*begin);
                buf.put_u32(*length);
            }
            Message::Port(port) => {
                buf.put_u32(3);
                buf.put_u8(MessageId::Port as u8);
                buf.put_u16(*port);
            }
        }

        buf.freeze()
    }

    /// Decodes one length-prefixed frame.
    ///
    /// The body length must match the message ID exactly; a `Have`
    /// with anything but a 4-byte body, or a `Request` with anything
    /// but 12, is rejected rather than truncated.
    pub fn decode(mut data: Bytes) -> Result<Self, PeerError> {
        if data.len() < 4 {
            return Err(PeerError::InvalidMessage("frame shorter than prefix"));
        }

        let length = data.get_u32() as usize;

        if length == 0 {
            if data.has_remaining() {
                return Err(PeerError::InvalidMessage("keep-alive with body"));
            }
            return Ok(Message::KeepAlive);
        }

        if data.remaining() != length {
            return Err(PeerError::InvalidMessage("length prefix mismatch"));
        }

        let id = MessageId::try_from(data.get_u8())?;
        let body_len = length - 1;

        match id {
            MessageId::Choke => expect_len(body_len, 0).map(|_| Message::Choke),
            MessageId::Unchoke => expect_len(body_len, 0).map(|_| Message::Unchoke),
            MessageId::Interested => expect_len(body_len, 0).map(|_| Message::Interested),
            MessageId::NotInterested => expect_len(body_len, 0).map(|_| Message::NotInterested),
            MessageId::Have => {
                expect_len(body_len, 4)?;
                Ok(Message::Have {
                    piece: data.get_u32(),
                })
            }
            MessageId::Bitfield => Ok(Message::Bitfield(data.copy_to_bytes(body_len))),
            MessageId::Request => {
                expect_len(body_len, 12)?;
                Ok(Message::Request {
                    index: data.get_u32(),
                    begin: data.get_u32(),
                    length: data.get_u32(),
                })
            }
            MessageId::Piece => {
                if body_len < 8 {
                    return Err(PeerError::InvalidMessage("piece body too short"));
                }
                let index = data.get_u32();
                let begin = data.get_u32();
                let block = data.copy_to_bytes(body_len - 8);
                Ok(Message::Piece {
                    index,
                    begin,
                    data: block,
                })
            }
            MessageId::Cancel => {
                expect_len(body_len, 12)?;
                Ok(Message::Cancel {
                    index: data.get_u32(),
                    begin: data.get_u32(),
                    length: data.get_u32(),
                })
            }
            MessageId::Port => {
                expect_len(body_len, 2)?;
                Ok(Message::Port(data.get_u16()))
            }
        }
    }
}

fn expect_len(actual: usize, expected: usize) -> Result<(), PeerError> {
    if actual != expected {
        return Err(PeerError::InvalidMessage("body length mismatch"));
    }
    Ok(())
}
