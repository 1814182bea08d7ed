//! Export pagination cursor.

/// Cursor over the two record sources of one export run.
///
/// Owned by a single generator instance; the offset only moves forward.
/// Located and unlocated records are paged with the same offset, and a
/// source is marked exhausted once it returns an empty page. The run
/// terminates when both are exhausted.
#[derive(Debug)]
pub struct ExportCursor {
    offset: u64,
    batch_size: u64,
    located_exhausted: bool,
    unlocated_exhausted: bool,
}

impl ExportCursor {
    pub fn new(batch_size: u64) -> Self {
        Self {
            offset: 0,
            batch_size: batch_size.max(1),
            located_exhausted: false,
            unlocated_exhausted: false,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    pub fn located_exhausted(&self) -> bool {
        self.located_exhausted
    }

    pub fn unlocated_exhausted(&self) -> bool {
        self.unlocated_exhausted
    }

    pub fn mark_located_exhausted(&mut self) {
        self.located_exhausted = true;
    }

    pub fn mark_unlocated_exhausted(&mut self) {
        self.unlocated_exhausted = true;
    }

    /// Whether both sources have run dry.
    pub fn is_done(&self) -> bool {
        self.located_exhausted && self.unlocated_exhausted
    }

    /// Moves to the next batch.
    pub fn advance(&mut self) {
        self.offset += self.batch_size;
    }
}
