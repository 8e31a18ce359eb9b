use super::http::parse_announce_response;
use super::*;
use std::time::Duration;

#[test]
fn test_tracker_event_strings() {
    assert_eq!(TrackerEvent::Started.as_str(), "started");
    assert_eq!(TrackerEvent::Stopped.as_str(), "stopped");
    assert_eq!(TrackerEvent::Completed.as_str(), "completed");
    assert_eq!(TrackerEvent::None.as_str(), "");
}

#[test]
fn test_parse_compact_peer() {
    let peers = parse_compact_peers(b"\x7f\x00\x00\x01\x1a\xe1").unwrap();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].addr.to_string(), "127.0.0.1:6881");
    assert_eq!(peers[0].peer_id, None);
}

#[test]
fn test_parse_compact_peers_multiple() {
    let data = [
        192, 168, 1, 1, 0x1A, 0xE1, // 192.168.1.1:6881
        10, 0, 0, 1, 0x1A, 0xE2, // 10.0.0.1:6882
    ];

    let peers = parse_compact_peers(&data).unwrap();
    assert_eq!(peers.len(), 2);
    assert_eq!(peers[0].addr.to_string(), "192.168.1.1:6881");
    assert_eq!(peers[1].addr.to_string(), "10.0.0.1:6882");
}

#[test]
fn test_parse_compact_peers_empty() {
    let peers = parse_compact_peers(b"").unwrap();
    assert!(peers.is_empty());
}

#[test]
fn test_parse_compact_peers_bad_length() {
    assert!(matches!(
        parse_compact_peers(b"\x7f\x00\x00\x01\x1a"),
        Err(TrackerError::Malformed(_))
    ));
}

#[test]
fn test_parse_response_compact() {
    let mut body = Vec::new();
    body.extend_from_slice(b"d8:completei10e10:incompletei5e8:intervali900e5:peers6:");
    body.extend_from_slice(&[127, 0, 0, 1, 0x1A, 0xE1]);
    body.push(b'e');

    let response = parse_announce_response(&body).unwrap();
    assert_eq!(response.interval, Duration::from_secs(900));
    assert_eq!(response.complete, Some(10));
    assert_eq!(response.incomplete, Some(5));
    assert_eq!(response.peers.len(), 1);
    assert_eq!(response.peers[0].addr.to_string(), "127.0.0.1:6881");
}

#[test]
fn test_parse_response_dictionary_peers() {
    let mut body = Vec::new();
    body.extend_from_slice(b"d8:intervali1800e5:peersl");
    body.extend_from_slice(b"d2:ip9:127.0.0.17:peer id20:");
    body.extend_from_slice(&[0x2Du8; 20]);
    body.extend_from_slice(b"4:porti6881ee");
    body.extend_from_slice(b"d2:ip8:10.0.0.24:porti6882ee");
    body.extend_from_slice(b"ee");

    let response = parse_announce_response(&body).unwrap();
    assert_eq!(response.peers.len(), 2);
    assert_eq!(response.peers[0].addr.to_string(), "127.0.0.1:6881");
    assert_eq!(response.peers[0].peer_id, Some([0x2D; 20]));
    assert_eq!(response.peers[1].addr.to_string(), "10.0.0.2:6882");
    assert_eq!(response.peers[1].peer_id, None);
}

#[test]
fn test_parse_response_failure_reason() {
    let body = b"d14:failure reason15:torrent unknowne";
    assert!(matches!(
        parse_announce_response(body),
        Err(TrackerError::Failure(reason)) if reason == "torrent unknown"
    ));
}

#[test]
fn test_parse_response_not_a_dict() {
    assert!(matches!(
        parse_announce_response(b"li1ee"),
        Err(TrackerError::Malformed(_))
    ));
    assert!(matches!(
        parse_announce_response(b"not bencode"),
        Err(TrackerError::Bencode(_))
    ));
}

#[test]
fn test_parse_response_missing_peers() {
    assert!(matches!(
        parse_announce_response(b"d8:intervali1800ee"),
        Err(TrackerError::Malformed("missing peers"))
    ));
}

#[test]
fn test_parse_response_default_interval() {
    let mut body = Vec::new();
    body.extend_from_slice(b"d5:peers6:");
    body.extend_from_slice(&[127, 0, 0, 1, 0x1A, 0xE1]);
    body.push(b'e');

    let response = parse_announce_response(&body).unwrap();
    assert_eq!(response.interval, Duration::from_secs(1800));
}

#[test]
fn test_build_announce_url() {
    let info_hash = [0xABu8; 20];
    let peer_id = *b"-RM0001-abcdefghijkl";

    let url = build_announce_url(
        "http://t.example/announce",
        &info_hash,
        &peer_id,
        6881,
        0,
        0,
        1000,
        TrackerEvent::Started,
    );

    assert!(url.starts_with("http://t.example/announce?"));
    assert!(url.contains(&format!("info_hash={}", "%AB".repeat(20))));
    // Unreserved bytes of the peer id stay literal
    assert!(url.contains("peer_id=-RM0001-abcdefghijkl"));
    assert!(url.contains("port=6881"));
    assert!(url.contains("uploaded=0"));
    assert!(url.contains("downloaded=0"));
    assert!(url.contains("left=1000"));
    assert!(url.contains("compact=1"));
    assert!(url.ends_with("&event=started"));
}

#[test]
fn test_build_announce_url_no_event() {
    let url = build_announce_url(
        "http://t.example/announce",
        &[0u8; 20],
        &[0u8; 20],
        6881,
        10,
        20,
        30,
        TrackerEvent::None,
    );
    assert!(!url.contains("event="));
}

#[test]
fn test_build_announce_url_existing_query() {
    let url = build_announce_url(
        "http://t.example/announce?key=abc",
        &[0u8; 20],
        &[0u8; 20],
        6881,
        0,
        0,
        0,
        TrackerEvent::None,
    );
    assert!(url.starts_with("http://t.example/announce?key=abc&info_hash="));
}

#[test]
fn test_http_tracker_rejects_non_http() {
    assert!(matches!(
        HttpTracker::new("udp://tracker.example.com:80"),
        Err(TrackerError::InvalidUrl(_))
    ));
    assert!(matches!(
        HttpTracker::new("ftp://tracker.example.com"),
        Err(TrackerError::InvalidUrl(_))
    ));
}

#[test]
fn test_tracker_set_skips_unsupported_schemes() {
    let urls = vec![
        "udp://tracker.example.com:80/announce".to_string(),
        "http://tracker.example.com/announce".to_string(),
        "udp://other.example.com:80/announce".to_string(),
    ];

    let set = TrackerSet::new(&urls);
    assert_eq!(set.len(), 1);

    let set = TrackerSet::new(&["udp://only.example.com:80".to_string()]);
    assert!(set.is_empty());
}
