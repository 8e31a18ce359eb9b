use thiserror::Error;

/// Errors that can occur during peer communication.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Network I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer's handshake was malformed or named another payload.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(&'static str),

    /// Received a malformed protocol message.
    #[error("invalid message: {0}")]
    InvalidMessage(&'static str),

    /// Received an unknown message ID.
    #[error("invalid message id: {0}")]
    InvalidMessageId(u8),

    /// The connection was closed by the peer.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// No bytes arrived within the allowed window.
    #[error("peer timed out")]
    Timeout,

    /// The peer sent a block that was never requested.
    #[error("unexpected block for piece {index} at offset {begin}")]
    UnexpectedBlock { index: u32, begin: u32 },

    /// The peer served too many pieces that failed verification.
    #[error("too many hash failures from peer")]
    TooManyHashFailures,

    /// The supervisor cancelled the session.
    #[error("cancelled")]
    Cancelled,

    /// Piece registry error surfaced through the session.
    #[error("piece error: {0}")]
    Piece(#[from] crate::piece::PieceError),
}
