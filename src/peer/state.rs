/// The four-flag state of one peer relationship.
///
/// Both directions start choked and uninterested; messages from the
/// peer and our own sends flip the flags. Downloading is allowed only
/// while `am_interested && !peer_choking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChokingState {
    pub am_choking: bool,
    pub am_interested: bool,
    pub peer_choking: bool,
    pub peer_interested: bool,
}

impl Default for ChokingState {
    fn default() -> Self {
        Self {
            am_choking: true,
            am_interested: false,
            peer_choking: true,
            peer_interested: false,
        }
    }
}

impl ChokingState {
    /// Returns true when block requests may be sent to the peer.
    pub fn can_request(&self) -> bool {
        self.am_interested && !self.peer_choking
    }
}
