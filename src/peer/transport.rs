use super::error::PeerError;
use super::message::{Handshake, Message, HANDSHAKE_LEN};
use crate::constants::{MAX_MESSAGE_SIZE, PEER_TIMEOUT, PEER_WRITE_TIMEOUT, READ_BUFFER_SIZE};
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// A framed peer connection.
///
/// Owns the TCP stream and an accumulation buffer; reassembles the
/// length-prefixed message stream into whole frames. Every read is
/// bounded by the peer inactivity timeout, every write by the write
/// timeout.
pub struct PeerTransport {
    stream: TcpStream,
    read_buf: BytesMut,
}

impl PeerTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(READ_BUFFER_SIZE),
        }
    }

    pub async fn send_handshake(&mut self, handshake: &Handshake) -> Result<(), PeerError> {
        let data = handshake.encode();
        timeout(PEER_WRITE_TIMEOUT, self.stream.write_all(&data))
            .await
            .map_err(|_| PeerError::Timeout)??;
        Ok(())
    }

    /// Reads exactly one 68-byte handshake.
    pub async fn read_handshake(&mut self) -> Result<Handshake, PeerError> {
        self.fill_to(HANDSHAKE_LEN).await?;
        let data = self.read_buf.split_to(HANDSHAKE_LEN);
        Handshake::decode(&data)
    }

    pub async fn send_message(&mut self, message: &Message) -> Result<(), PeerError> {
        let data = message.encode();
        timeout(PEER_WRITE_TIMEOUT, self.stream.write_all(&data))
            .await
            .map_err(|_| PeerError::Timeout)??;
        Ok(())
    }

    /// Reads one length-prefixed frame and decodes it.
    pub async fn read_message(&mut self) -> Result<Message, PeerError> {
        self.fill_to(4).await?;

        let length = u32::from_be_bytes([
            self.read_buf[0],
            self.read_buf[1],
            self.read_buf[2],
            self.read_buf[3],
        ]) as usize;

        if length > MAX_MESSAGE_SIZE {
            return Err(PeerError::InvalidMessage("frame exceeds size limit"));
        }

        self.fill_to(4 + length).await?;
        let frame = self.read_buf.split_to(4 + length);
        Message::decode(frame.freeze())
    }

    async fn fill_to(&mut self, len: usize) -> Result<(), PeerError> {
        while self.read_buf.len() < len {
            let n = timeout(PEER_TIMEOUT, self.stream.read_buf(&mut self.read_buf))
                .await
                .map_err(|_| PeerError::Timeout)??;

            if n == 0 {
                return Err(PeerError::ConnectionClosed);
            }
        }
        Ok(())
    }
}
