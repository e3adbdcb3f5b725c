/// Resumable position over the ordered contact list.
///
/// `position` is the index of the next contact to process. It only moves
/// forward, one contact at a time, and only after that contact's outcome is
/// recorded, so resuming at `position` never re-sends or skips anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CampaignCursor {
    position: usize,
    len: usize,
}

impl CampaignCursor {
    /// `start_from` is clamped to the list length.
    pub fn new(start_from: usize, len: usize) -> Self {
        Self {
            position: start_from.min(len),
            len,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.len
    }

    /// The current contact's outcome is recorded; move past it.
    pub fn commit(&mut self) {
        if self.position < self.len {
            self.position += 1;
        }
    }
}
