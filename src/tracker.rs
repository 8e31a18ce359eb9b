//! HTTP tracker protocol (BEP-3)
//!
//! Trackers map an info hash to the set of peers currently serving
//! the payload. This module builds announce requests, parses compact
//! and dictionary peer lists, and fails over across the metainfo's
//! tracker list.

mod error;
mod http;
mod response;

pub use error::TrackerError;
pub use http::{build_announce_url, HttpTracker, TrackerSet};
pub use response::{parse_compact_peers, AnnounceResponse, Peer, TrackerEvent};

#[cfg(test)]
mod tests;
