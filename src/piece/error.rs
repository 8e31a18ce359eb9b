use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PieceError {
    #[error("piece {0} does not exist")]
    UnknownPiece(u32),

    #[error("piece {0} has no downloaded data")]
    NotReady(u32),

    #[error("piece {0} failed hash verification")]
    HashMismatch(u32),
}
