use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    #[error("tracker returned status {0}")]
    Status(u16),

    #[error("tracker returned failure: {0}")]
    Failure(String),

    #[error("malformed tracker response: {0}")]
    Malformed(&'static str),

    #[error("invalid tracker url: {0}")]
    InvalidUrl(String),

    #[error("all trackers failed")]
    AllTrackersFailed,
}
