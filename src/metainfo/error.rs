use crate::bencode::BencodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetainfoError {
    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    #[error("piece length {0} out of bounds (16 KiB to 1 MiB)")]
    PieceLengthOutOfBounds(u64),

    #[error("pieces length {0} is not a multiple of 20")]
    InvalidPiecesLength(usize),

    #[error("exactly one of length or files is required")]
    AmbiguousFileMode,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
