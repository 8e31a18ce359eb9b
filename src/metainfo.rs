//! Torrent metainfo handling (BEP-3)
//!
//! This module parses `.torrent` files into typed metadata and
//! computes the info hash that identifies the payload.

mod error;
mod info_hash;
mod torrent;

pub use error::MetainfoError;
pub use info_hash::InfoHash;
pub use torrent::{File, Info, Metainfo};
