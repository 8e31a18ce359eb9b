//! Protocol constants and tuning parameters.
//!
//! Timeouts and intervals follow common client defaults; the pipeline
//! and concurrency bounds are deliberately conservative for a
//! single-payload leech client.

use std::time::Duration;

// ============================================================================
// Client identification
// ============================================================================

/// Client ID prefix for peer ID generation (Azureus-style)
pub const CLIENT_PREFIX: &str = "-RM0001-";

/// User agent string for HTTP requests
pub const USER_AGENT: &str = "remora/0.1.0";

// ============================================================================
// Ports
// ============================================================================

/// Default BitTorrent listen port reported to trackers
pub const DEFAULT_PORT: u16 = 6881;

// ============================================================================
// Block and piece sizes
// ============================================================================

/// Standard block size for piece requests (16 KiB)
pub const BLOCK_SIZE: u32 = 16384;

/// Minimum accepted piece length (16 KiB)
pub const MIN_PIECE_LENGTH: u64 = 16 * 1024;

/// Maximum accepted piece length (1 MiB)
pub const MAX_PIECE_LENGTH: u64 = 1024 * 1024;

// ============================================================================
// Pipelining and retry bounds
// ============================================================================

/// Maximum outstanding block requests per peer
pub const MAX_PIPELINE: usize = 5;

/// Verification failures before a piece is force-requeued
pub const MAX_FAILED_ATTEMPTS: u32 = 3;

/// Hash failures tolerated from a single peer before disconnecting it
pub const MAX_HASH_FAILURES: u32 = 3;

// ============================================================================
// Concurrency
// ============================================================================

/// Maximum peer sessions running at once
pub const MAX_CONCURRENT_PEERS: usize = 8;

// ============================================================================
// Timeouts
// ============================================================================

/// TCP connection timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Handshake exchange timeout after TCP connect
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Inbound silence tolerated on a peer stream before the session ends
pub const PEER_TIMEOUT: Duration = Duration::from_secs(120);

/// Write timeout on a peer stream
pub const PEER_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP tracker request timeout
pub const HTTP_TRACKER_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Intervals
// ============================================================================

/// Outbound keep-alive interval on an idle peer stream
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Completion watcher poll interval
pub const COMPLETION_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default tracker announce interval when the response omits one
pub const TRACKER_DEFAULT_INTERVAL: Duration = Duration::from_secs(1800);

// ============================================================================
// Buffer sizes
// ============================================================================

/// Read buffer reserve for peer connections (32 KiB)
pub const READ_BUFFER_SIZE: usize = 32 * 1024;

/// Maximum accepted wire message size (16 MiB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

// ============================================================================
// Protocol constants
// ============================================================================

/// BitTorrent protocol string
pub const PROTOCOL_STRING: &str = "BitTorrent protocol";

/// Reserved bytes in the handshake (no extensions advertised)
pub const RESERVED_BYTES: [u8; 8] = [0, 0, 0, 0, 0, 0, 0, 0];
