//! Peer wire protocol (BEP-3)
//!
//! Handshake and message codecs, framed TCP transport, and the
//! session loop that downloads pieces block by block from one peer.

mod bitfield;
mod error;
mod message;
mod peer_id;
mod session;
mod state;
mod transport;

pub use bitfield::Bitfield;
pub use error::PeerError;
pub use message::{Handshake, Message, MessageId, HANDSHAKE_LEN};
pub use peer_id::PeerId;
pub use session::PeerSession;
pub use state::ChokingState;
pub use transport::PeerTransport;
