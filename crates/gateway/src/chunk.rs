//! Chunk planning for sequential uploads.

use serde::Serialize;

/// One planned chunk of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferChunk {
    pub offset: u64,
    pub len: u64,
    pub index: u32,
    pub total: u32,
}

/// Plans fixed-size chunks covering `total_len` bytes.
///
/// Chunks come in strictly increasing index order, never overlap, and
/// their ranges concatenate to exactly the payload length. A zero
/// `chunk_size` is treated as one.
pub fn plan_chunks(total_len: u64, chunk_size: u64) -> impl Iterator<Item = TransferChunk> {
    let chunk_size = chunk_size.max(1);
    let total = total_len.div_ceil(chunk_size) as u32;
    (0..total).map(move |index| {
        let offset = index as u64 * chunk_size;
        TransferChunk {
            offset,
            len: chunk_size.min(total_len - offset),
            index,
            total,
        }
    })
}
