use super::error::PieceError;
use crate::constants::MAX_FAILED_ATTEMPTS;
use crate::metainfo::Metainfo;
use bytes::Bytes;
use parking_lot::Mutex;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Lifecycle state of a single piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceState {
    /// Nobody is working on the piece.
    Unclaimed,
    /// A session owns the piece and is downloading its blocks.
    Claimed,
    /// All blocks arrived; the data awaits verification.
    Downloaded,
    /// The data matched its SHA-1 fingerprint.
    Verified,
}

#[derive(Debug)]
struct Piece {
    hash: [u8; 20],
    state: PieceState,
    data: Option<Bytes>,
    failed_attempts: u32,
}

impl Piece {
    fn new(hash: [u8; 20]) -> Self {
        Self {
            hash,
            state: PieceState::Unclaimed,
            data: None,
            failed_attempts: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    pieces: HashMap<u32, Piece>,
    downloaded_count: usize,
    verified_count: usize,
}

/// Tracks the lifecycle of every piece in the payload.
///
/// The manager is shared across peer sessions behind an [`Arc`]; a
/// single mutex admits one operation at a time, so each method is
/// atomic with respect to the others. Piece data enters and leaves by
/// copy, never by reference into the registry.
///
/// # Examples
///
/// ```
/// use remora::piece::PieceManager;
///
/// let manager = PieceManager::new(16384, 16384);
/// manager.add_piece(0, [0u8; 20]);
///
/// let (index, _hash) = manager.claim_any().unwrap();
/// assert_eq!(index, 0);
/// assert!(!manager.is_complete());
/// ```
pub struct PieceManager {
    inner: Mutex<Registry>,
    piece_length: u64,
    total_length: u64,
}

impl PieceManager {
    /// Creates an empty manager; pieces are registered with
    /// [`add_piece`](Self::add_piece).
    pub fn new(piece_length: u64, total_length: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Registry::default()),
            piece_length,
            total_length,
        })
    }

    /// Creates a manager seeded with one unclaimed entry per piece
    /// fingerprint in the metainfo.
    pub fn from_metainfo(metainfo: &Metainfo) -> Arc<Self> {
        let manager = Self::new(metainfo.info.piece_length, metainfo.info.total_length);
        for (index, hash) in metainfo.info.pieces.iter().enumerate() {
            manager.add_piece(index as u32, *hash);
        }
        manager
    }

    /// Registers a piece in the `Unclaimed` state.
    pub fn add_piece(&self, index: u32, hash: [u8; 20]) {
        let mut inner = self.inner.lock();
        inner.pieces.insert(index, Piece::new(hash));
    }

    /// Claims the piece at `index` for download.
    ///
    /// Returns `true` only if the piece was `Unclaimed`; a piece is
    /// never claimed by two sessions at once.
    pub fn claim(&self, index: u32) -> bool {
        let mut inner = self.inner.lock();
        match inner.pieces.get_mut(&index) {
            Some(piece) if piece.state == PieceState::Unclaimed => {
                piece.state = PieceState::Claimed;
                trace!(piece = index, "claimed");
                true
            }
            _ => false,
        }
    }

    /// Claims any unclaimed piece and returns its index and expected
    /// hash.
    ///
    /// Which piece is picked is unspecified.
    pub fn claim_any(&self) -> Option<(u32, [u8; 20])> {
        let mut inner = self.inner.lock();
        let (&index, piece) = inner
            .pieces
            .iter_mut()
            .find(|(_, piece)| piece.state == PieceState::Unclaimed)?;

        piece.state = PieceState::Claimed;
        trace!(piece = index, "claimed");
        Some((index, piece.hash))
    }

    /// Stores downloaded data for a claimed piece.
    ///
    /// The input buffer is copied, so the caller can reuse it. The
    /// call is a no-op unless the piece is currently `Claimed`.
    pub fn mark_downloaded(&self, index: u32, data: &[u8]) {
        let mut inner = self.inner.lock();
        let Some(piece) = inner.pieces.get_mut(&index) else {
            warn!(piece = index, "mark_downloaded on unknown piece");
            return;
        };

        if piece.state != PieceState::Claimed {
            warn!(piece = index, state = ?piece.state, "mark_downloaded out of order");
            return;
        }

        piece.data = Some(Bytes::copy_from_slice(data));
        piece.state = PieceState::Downloaded;
        inner.downloaded_count += 1;
        debug!(piece = index, bytes = data.len(), "downloaded");
    }

    /// Verifies downloaded data against the piece's expected hash.
    ///
    /// On a match the piece becomes `Verified` and will never be
    /// downloaded again. On a mismatch the failure counter is
    /// incremented and the piece stays `Downloaded`; once the counter
    /// reaches the failure threshold the piece is force-requeued and
    /// the counter reset, so a run of bad peers cannot wedge it.
    pub fn verify(&self, index: u32) -> Result<(), PieceError> {
        let mut inner = self.inner.lock();
        let piece = inner
            .pieces
            .get_mut(&index)
            .ok_or(PieceError::UnknownPiece(index))?;

        let data = match (&piece.state, &piece.data) {
            (PieceState::Verified, _) => return Ok(()),
            (PieceState::Downloaded, Some(data)) => data,
            _ => return Err(PieceError::NotReady(index)),
        };

        let mut hasher = Sha1::new();
        hasher.update(data);
        let computed: [u8; 20] = hasher.finalize().into();

        if computed == piece.hash {
            piece.state = PieceState::Verified;
            piece.failed_attempts = 0;
            inner.verified_count += 1;
            debug!(piece = index, "verified");
            return Ok(());
        }

        piece.failed_attempts += 1;
        warn!(
            piece = index,
            attempts = piece.failed_attempts,
            "hash mismatch"
        );

        if piece.failed_attempts >= MAX_FAILED_ATTEMPTS {
            piece.state = PieceState::Unclaimed;
            piece.data = None;
            piece.failed_attempts = 0;
            inner.downloaded_count -= 1;
            debug!(piece = index, "force-requeued after repeated hash failures");
        }

        Err(PieceError::HashMismatch(index))
    }

    /// Returns a piece to the `Unclaimed` state, dropping any data.
    ///
    /// Verified pieces are left untouched; the failure counter is
    /// preserved so repeated bad downloads still hit the threshold.
    pub fn requeue(&self, index: u32) {
        let mut inner = self.inner.lock();
        let Some(piece) = inner.pieces.get_mut(&index) else {
            return;
        };

        match piece.state {
            PieceState::Verified => return,
            PieceState::Downloaded => {
                piece.state = PieceState::Unclaimed;
                piece.data = None;
                inner.downloaded_count -= 1;
            }
            PieceState::Claimed | PieceState::Unclaimed => {
                piece.state = PieceState::Unclaimed;
                piece.data = None;
            }
        }
        trace!(piece = index, "requeued");
    }

    /// Returns a copy of the piece's downloaded bytes.
    pub fn piece_data(&self, index: u32) -> Result<Bytes, PieceError> {
        let inner = self.inner.lock();
        let piece = inner
            .pieces
            .get(&index)
            .ok_or(PieceError::UnknownPiece(index))?;

        piece.data.clone().ok_or(PieceError::NotReady(index))
    }

    /// Returns the state of the piece at `index`.
    pub fn piece_state(&self, index: u32) -> Option<PieceState> {
        let inner = self.inner.lock();
        inner.pieces.get(&index).map(|piece| piece.state)
    }

    /// Returns `true` once every piece has been verified.
    pub fn is_complete(&self) -> bool {
        let inner = self.inner.lock();
        inner.verified_count == inner.pieces.len()
    }

    /// Returns the number of pieces currently holding downloaded data.
    pub fn downloaded_count(&self) -> usize {
        self.inner.lock().downloaded_count
    }

    /// Returns the number of verified pieces.
    pub fn verified_count(&self) -> usize {
        self.inner.lock().verified_count
    }

    /// Returns the total number of registered pieces.
    pub fn piece_count(&self) -> usize {
        self.inner.lock().pieces.len()
    }

    /// Returns the size of the piece at `index` in bytes.
    ///
    /// All pieces are `piece_length` long except possibly the last.
    pub fn piece_size(&self, index: u32) -> u64 {
        let piece_count = self.piece_count();
        if piece_count == 0 {
            return 0;
        }
        if (index as usize) < piece_count - 1 {
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

    /// Returns the number of payload bytes not yet verified, as
    /// reported to trackers.
    pub fn bytes_left(&self) -> u64 {
        let inner = self.inner.lock();
        let piece_count = inner.pieces.len();
        inner
            .pieces
            .iter()
            .filter(|(_, piece)| piece.state != PieceState::Verified)
            .map(|(&index, _)| {
                if (index as usize) < piece_count - 1 {
                    self.piece_length
                } else {
                    let remainder = self.total_length % self.piece_length;
                    if remainder == 0 {
                        self.piece_length
                    } else {
                        remainder
                    }
                }
            })
            .sum()
    }

    /// Assembles the verified payload in piece order.
    ///
    /// Returns `NotReady` if any piece is missing its data.
    pub fn assemble(&self) -> Result<Vec<u8>, PieceError> {
        let inner = self.inner.lock();
        let mut indices: Vec<u32> = inner.pieces.keys().copied().collect();
        indices.sort_unstable();

        let mut payload = Vec::with_capacity(self.total_length as usize);
        for index in indices {
            let piece = &inner.pieces[&index];
            let data = piece.data.as_ref().ok_or(PieceError::NotReady(index))?;
            payload.extend_from_slice(data);
        }

        Ok(payload)
    }
}
