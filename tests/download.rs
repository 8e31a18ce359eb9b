//! End-to-end download against a scripted tracker and peer on the
//! loopback interface.

use remora::peer::{Handshake, Message, HANDSHAKE_LEN};
use remora::piece::PieceManager;
use remora::swarm::{Swarm, SwarmConfig};
use remora::{Metainfo, PeerId};
use sha1::{Digest, Sha1};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

const PIECE_LENGTH: usize = 16384;

fn sha1_of(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Builds a single-file torrent whose announce URL points at the fake
/// tracker.
fn build_torrent(announce: &str, name: &str, payload: &[u8]) -> Vec<u8> {
    let mut pieces = Vec::new();
    for chunk in payload.chunks(PIECE_LENGTH) {
        pieces.extend_from_slice(&sha1_of(chunk));
    }

    let mut info = Vec::new();
    info.extend_from_slice(
        format!(
            "d6:lengthi{}e4:name{}:{}12:piece lengthi{}e6:pieces{}:",
            payload.len(),
            name.len(),
            name,
            PIECE_LENGTH,
            pieces.len()
        )
        .as_bytes(),
    );
    info.extend_from_slice(&pieces);
    info.push(b'e');

    let mut torrent = Vec::new();
    torrent
        .extend_from_slice(format!("d8:announce{}:{}4:info", announce.len(), announce).as_bytes());
    torrent.extend_from_slice(&info);
    torrent.push(b'e');
    torrent
}

/// Serves one announce request with a compact peer list naming the
/// fake peer.
async fn fake_tracker(listener: TcpListener, peer_addr: std::net::SocketAddr) {
    loop {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };

        // Drain the request line and headers
        let mut buf = vec![0u8; 4096];
        let mut request = Vec::new();
        loop {
            let Ok(n) = stream.read(&mut buf).await else {
                break;
            };
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }

        let ip = match peer_addr.ip() {
            std::net::IpAddr::V4(ip) => ip.octets(),
            std::net::IpAddr::V6(_) => unreachable!("loopback test uses IPv4"),
        };

        let mut body = Vec::new();
        body.extend_from_slice(b"d8:intervali1800e5:peers6:");
        body.extend_from_slice(&ip);
        body.extend_from_slice(&peer_addr.port().to_be_bytes());
        body.push(b'e');

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );

        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.write_all(&body).await;
        let _ = stream.shutdown().await;
    }
}

/// A seeder that answers the full wire protocol for one connection at
/// a time.
async fn fake_seeder(listener: TcpListener, payload: Vec<u8>, piece_count: usize) {
    loop {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        let payload = payload.clone();

        let mut handshake_buf = [0u8; HANDSHAKE_LEN];
        if stream.read_exact(&mut handshake_buf).await.is_err() {
            continue;
        }
        let theirs = Handshake::decode(&handshake_buf).unwrap();
        let reply = Handshake::new(theirs.info_hash, *b"-FS0001-seederseeder");
        if stream.write_all(&reply.encode()).await.is_err() {
            continue;
        }

        // Advertise every piece
        let mut bits = vec![0u8; piece_count.div_ceil(8)];
        for i in 0..piece_count {
            bits[i / 8] |= 1 << (7 - (i % 8));
        }
        if stream
            .write_all(&Message::Bitfield(bits.into()).encode())
            .await
            .is_err()
        {
            continue;
        }

        serve_blocks(&mut stream, &payload).await;
    }
}

async fn serve_blocks(stream: &mut TcpStream, payload: &[u8]) {
    loop {
        let mut len_buf = [0u8; 4];
        if stream.read_exact(&mut len_buf).await.is_err() {
            return;
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        if len == 0 {
            continue; // keep-alive
        }

        let mut body = vec![0u8; len];
        if stream.read_exact(&mut body).await.is_err() {
            return;
        }

        match body[0] {
            // Interested: open the pipe
            2 => {
                if stream.write_all(&Message::Unchoke.encode()).await.is_err() {
                    return;
                }
            }
            // Request: serve the block from the payload
            6 => {
                let index = u32::from_be_bytes(body[1..5].try_into().unwrap());
                let begin = u32::from_be_bytes(body[5..9].try_into().unwrap());
                let length = u32::from_be_bytes(body[9..13].try_into().unwrap());

                let start = index as usize * PIECE_LENGTH + begin as usize;
                let block = payload[start..start + length as usize].to_vec();

                let message = Message::Piece {
                    index,
                    begin,
                    data: block.into(),
                };
                if stream.write_all(&message.encode()).await.is_err() {
                    return;
                }
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_full_download_through_swarm() {
    // 2.2 pieces worth of deterministic payload
    let payload: Vec<u8> = (0..36000u32).map(|i| (i % 251) as u8).collect();
    let piece_count = payload.len().div_ceil(PIECE_LENGTH);

    let seeder_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let seeder_addr = seeder_listener.local_addr().unwrap();
    tokio::spawn(fake_seeder(seeder_listener, payload.clone(), piece_count));

    let tracker_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let tracker_addr = tracker_listener.local_addr().unwrap();
    tokio::spawn(fake_tracker(tracker_listener, seeder_addr));

    let announce = format!("http://{}/announce", tracker_addr);
    let torrent = build_torrent(&announce, "testfile", &payload);
    let metainfo = Metainfo::from_bytes(&torrent).unwrap();
    assert_eq!(metainfo.info.piece_count(), piece_count);

    let manager = PieceManager::from_metainfo(&metainfo);
    let token = CancellationToken::new();
    let config = SwarmConfig {
        port: 6881,
        max_peers: 4,
        poll_interval: Duration::from_millis(50),
    };

    let swarm = Swarm::new(
        metainfo,
        PeerId::generate(),
        Arc::clone(&manager),
        config,
        token,
    );

    let complete = tokio::time::timeout(Duration::from_secs(30), swarm.run())
        .await
        .expect("swarm timed out")
        .expect("swarm failed");

    assert!(complete);
    assert!(manager.is_complete());
    assert_eq!(manager.assemble().unwrap(), payload);
}

#[tokio::test]
async fn test_swarm_fails_without_trackers() {
    let payload = vec![0u8; PIECE_LENGTH];
    let torrent = build_torrent("udp://only.example:6969/announce", "x", &payload);
    let metainfo = Metainfo::from_bytes(&torrent).unwrap();

    let manager = PieceManager::from_metainfo(&metainfo);
    let swarm = Swarm::new(
        metainfo,
        PeerId::generate(),
        Arc::clone(&manager),
        SwarmConfig::default(),
        CancellationToken::new(),
    );

    assert!(swarm.run().await.is_err());
}
