use super::error::MetainfoError;
use super::info_hash::InfoHash;
use crate::bencode::{decode, encode, Value};
use crate::constants::{MAX_PIECE_LENGTH, MIN_PIECE_LENGTH};
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// A parsed torrent file.
///
/// Contains all metadata from a `.torrent` file, including file
/// information, piece hashes, and tracker URLs.
///
/// # Examples
///
/// ```no_run
/// use remora::metainfo::Metainfo;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let metainfo = Metainfo::from_file("example.torrent")?;
///
/// println!("Torrent: {}", metainfo.info.name);
/// println!("Size: {} bytes", metainfo.info.total_length);
/// println!("Info hash: {}", metainfo.info_hash);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Metainfo {
    /// The info dictionary containing file and piece information.
    pub info: Info,
    /// The unique identifier for this torrent (hash of the info dictionary).
    pub info_hash: InfoHash,
    /// Primary tracker URL.
    pub announce: String,
    /// Multi-tier tracker list ([BEP-12](http://bittorrent.org/beps/bep_0012.html)).
    pub announce_list: Vec<Vec<String>>,
    /// Unix timestamp when the torrent was created.
    pub creation_date: Option<i64>,
    /// Optional comment about the torrent.
    pub comment: Option<String>,
    /// Name/version of the program that created the torrent.
    pub created_by: Option<String>,
    /// Character encoding of string fields, if declared.
    pub encoding: Option<String>,
    raw_info: Bytes,
}

/// The info dictionary from a torrent file.
///
/// The SHA-1 hash of this dictionary (in bencode form) is the info
/// hash.
#[derive(Debug, Clone)]
pub struct Info {
    /// Suggested name for the file or directory.
    pub name: String,
    /// Number of bytes per piece.
    pub piece_length: u64,
    /// SHA-1 hash of each piece (20 bytes each).
    pub pieces: Vec<[u8; 20]>,
    /// List of files in the torrent.
    pub files: Vec<File>,
    /// Total size of all files combined.
    pub total_length: u64,
    /// If true, clients should only use trackers in the metainfo.
    pub private: bool,
}

/// A file within a torrent.
///
/// For single-file torrents, there is one file with the torrent name.
/// For multi-file torrents, paths are relative to the torrent's root
/// directory.
#[derive(Debug, Clone)]
pub struct File {
    /// Path to the file (relative to torrent root).
    pub path: PathBuf,
    /// Size of the file in bytes.
    pub length: u64,
    /// Byte offset within the torrent's piece data.
    pub offset: u64,
}

impl Metainfo {
    /// Parses a torrent file from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The data is not valid bencode
    /// - Required fields are missing (announce, info, name, pieces, ...)
    /// - `piece length` is outside the accepted 16 KiB to 1 MiB range
    /// - The pieces field length is not a multiple of 20
    /// - Both or neither of `length` and `files` are present
    pub fn from_bytes(data: &[u8]) -> Result<Self, MetainfoError> {
        let value = decode(data)?;
        let dict = value.as_dict().ok_or(MetainfoError::InvalidField("root"))?;

        let info_value = dict
            .get(b"info".as_slice())
            .ok_or(MetainfoError::MissingField("info"))?;

        // The decoder enforces sorted unique keys, so re-encoding the
        // info value reproduces the exact source bytes.
        let raw_info = Bytes::from(encode(info_value));
        let info_hash = InfoHash::from_info_bytes(&raw_info);

        let info = parse_info(info_value)?;

        let announce = dict
            .get(b"announce".as_slice())
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or(MetainfoError::MissingField("announce"))?;

        let announce_list = dict
            .get(b"announce-list".as_slice())
            .and_then(|v| v.as_list())
            .map(|list| {
                list.iter()
                    .filter_map(|tier| {
                        tier.as_list().map(|urls| {
                            urls.iter()
                                .filter_map(|u| u.as_str().map(String::from))
                                .collect()
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let creation_date = dict
            .get(b"creation date".as_slice())
            .and_then(|v| v.as_integer());

        let comment = dict
            .get(b"comment".as_slice())
            .and_then(|v| v.as_str())
            .map(String::from);

        let created_by = dict
            .get(b"created by".as_slice())
            .and_then(|v| v.as_str())
            .map(String::from);

        let encoding = dict
            .get(b"encoding".as_slice())
            .and_then(|v| v.as_str())
            .map(String::from);

        Ok(Self {
            info,
            info_hash,
            announce,
            announce_list,
            creation_date,
            comment,
            created_by,
            encoding,
            raw_info,
        })
    }

    /// Reads and parses a torrent file from disk.
    ///
    /// The file is opened read-only; nothing is ever written back.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MetainfoError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Returns the raw bencoded info dictionary.
    pub fn raw_info(&self) -> &Bytes {
        &self.raw_info
    }

    /// Returns all tracker URLs: the primary `announce` URL followed
    /// by the flattened `announce-list` tiers in order.
    ///
    /// Duplicates are retained; failover walks the list as given.
    pub fn trackers(&self) -> Vec<String> {
        let mut trackers = vec![self.announce.clone()];

        for tier in &self.announce_list {
            for tracker in tier {
                trackers.push(tracker.clone());
            }
        }

        trackers
    }
}

impl Info {
    /// Returns the number of pieces in the payload.
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Returns the size of the piece at `index` in bytes.
    ///
    /// All pieces are `piece_length` long except possibly the last,
    /// which holds the remainder of the payload.
    pub fn piece_size(&self, index: u32) -> u64 {
        if self.pieces.is_empty() {
            return 0;
        }
        if (index as usize) < self.pieces.len() - 1 {
            self.piece_length
        } else {
            let remainder = self.total_length % self.piece_length;
            if remainder == 0 {
                self.piece_length
            } else {
                remainder
            }
        }
    }
}

fn parse_info(value: &Value) -> Result<Info, MetainfoError> {
    let dict = value.as_dict().ok_or(MetainfoError::InvalidField("info"))?;

    let name = dict
        .get(b"name".as_slice())
        .and_then(|v| v.as_str())
        .ok_or(MetainfoError::MissingField("name"))?
        .to_string();

    let piece_length = dict
        .get(b"piece length".as_slice())
        .and_then(|v| v.as_integer())
        .ok_or(MetainfoError::MissingField("piece length"))?;

    if piece_length < MIN_PIECE_LENGTH as i64 || piece_length > MAX_PIECE_LENGTH as i64 {
        return Err(MetainfoError::PieceLengthOutOfBounds(piece_length.max(0) as u64));
    }
    let piece_length = piece_length as u64;

    let pieces_bytes = dict
        .get(b"pieces".as_slice())
        .and_then(|v| v.as_bytes())
        .ok_or(MetainfoError::MissingField("pieces"))?;

    if pieces_bytes.len() % 20 != 0 {
        return Err(MetainfoError::InvalidPiecesLength(pieces_bytes.len()));
    }

    let pieces: Vec<[u8; 20]> = pieces_bytes
        .chunks_exact(20)
        .map(|chunk| {
            let mut arr = [0u8; 20];
            arr.copy_from_slice(chunk);
            arr
        })
        .collect();

    let private = dict
        .get(b"private".as_slice())
        .and_then(|v| v.as_integer())
        .map(|v| v == 1)
        .unwrap_or(false);

    let length = dict.get(b"length".as_slice());
    let files_list = dict.get(b"files".as_slice());

    let (files, total_length) = match (length, files_list) {
        (Some(_), Some(_)) | (None, None) => return Err(MetainfoError::AmbiguousFileMode),
        (Some(length), None) => {
            let length = length
                .as_integer()
                .filter(|&l| l >= 0)
                .ok_or(MetainfoError::InvalidField("length"))? as u64;
            let file = File {
                path: PathBuf::from(&name),
                length,
                offset: 0,
            };
            (vec![file], length)
        }
        (None, Some(files_value)) => {
            let files_list = files_value
                .as_list()
                .ok_or(MetainfoError::InvalidField("files"))?;

            let mut files = Vec::new();
            let mut offset = 0u64;

            for file_value in files_list {
                let file_dict = file_value
                    .as_dict()
                    .ok_or(MetainfoError::InvalidField("files"))?;

                let length = file_dict
                    .get(b"length".as_slice())
                    .and_then(|v| v.as_integer())
                    .filter(|&l| l >= 0)
                    .ok_or(MetainfoError::MissingField("file length"))?
                    as u64;

                let path_list = file_dict
                    .get(b"path".as_slice())
                    .and_then(|v| v.as_list())
                    .ok_or(MetainfoError::MissingField("file path"))?;

                let path: PathBuf = std::iter::once(name.clone())
                    .chain(
                        path_list
                            .iter()
                            .filter_map(|p| p.as_str().map(String::from)),
                    )
                    .collect();

                files.push(File {
                    path,
                    length,
                    offset,
                });

                offset += length;
            }

            (files, offset)
        }
    };

    Ok(Info {
        name,
        piece_length,
        pieces,
        files,
        total_length,
        private,
    })
}
