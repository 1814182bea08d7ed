//! Chunk planning.

use serde::{Deserialize, Serialize};

/// Index reserved for the intro chunk (title page, summary).
pub const INTRO_CHUNK_INDEX: u32 = 0;

/// A page of records rendered into one data chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub offset: u64,
    pub limit: u64,
}

/// One chunk of the document to render.
///
/// `batch` is `None` for the intro chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpec {
    pub index: u32,
    pub batch: Option<RecordBatch>,
}

/// Result of rendering or stamping one chunk.
///
/// Carried as the JSON result of the producing job; the `index` field is
/// what downstream stages sort by, since child results are unordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkArtifact {
    pub index: u32,
    pub locator: String,
    pub page_count: u32,
}

/// Plans the chunk set for a request: the intro chunk at index 0 followed
/// by `ceil(total_records / batch_size)` data chunks.
pub fn plan_chunks(total_records: u64, batch_size: u64) -> Vec<ChunkSpec> {
    let batch_size = batch_size.max(1);
    let data_chunks = total_records.div_ceil(batch_size);

    let mut chunks = Vec::with_capacity(data_chunks as usize + 1);
    chunks.push(ChunkSpec {
        index: INTRO_CHUNK_INDEX,
        batch: None,
    });
    for i in 0..data_chunks {
        chunks.push(ChunkSpec {
            index: i as u32 + 1,
            batch: Some(RecordBatch {
                offset: i * batch_size,
                limit: batch_size,
            }),
        });
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_multiple() {
        let chunks = plan_chunks(50, 25);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].index, INTRO_CHUNK_INDEX);
        assert!(chunks[0].batch.is_none());
        assert_eq!(chunks[1].batch, Some(RecordBatch { offset: 0, limit: 25 }));
        assert_eq!(chunks[2].batch, Some(RecordBatch { offset: 25, limit: 25 }));
    }

    #[test]
    fn test_remainder_gets_own_chunk() {
        let chunks = plan_chunks(51, 25);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[3].batch, Some(RecordBatch { offset: 50, limit: 25 }));
    }

    #[test]
    fn test_zero_records_is_intro_only() {
        let chunks = plan_chunks(0, 25);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].batch.is_none());
    }

    #[test]
    fn test_single_record() {
        let chunks = plan_chunks(1, 25);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].index, 1);
    }
}
