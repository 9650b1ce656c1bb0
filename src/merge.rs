use crate::error::{Error, Result};
use crate::transcribe::{RawSegment, Segment, Transcript};

/// Raw segments produced by one chunk, with that chunk's global offset.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSegments {
    pub index: usize,
    pub offset: f64,
    pub segments: Vec<RawSegment>,
}

/// Shifts each chunk's segments onto the global timeline and concatenates
/// them in chunk order.
///
/// Fails with [`Error::MalformedSegment`] if any segment has non-finite or
/// negative timing, `start >= end`, or would break non-decreasing start order.
pub fn merge(per_chunk: Vec<ChunkSegments>) -> Result<Transcript> {
    let total = per_chunk.iter().map(|c| c.segments.len()).sum();
    let mut merged: Vec<Segment> = Vec::with_capacity(total);

    for chunk in per_chunk {
        for raw in chunk.segments {
            if !raw.start.is_finite() || !raw.end.is_finite() || raw.start < 0.0 {
                return Err(Error::MalformedSegment {
                    chunk: chunk.index,
                    reason: format!("invalid timing {} -> {}", raw.start, raw.end),
                });
            }

            let start = raw.start + chunk.offset;
            let end = raw.end + chunk.offset;
            if start >= end {
                return Err(Error::MalformedSegment {
                    chunk: chunk.index,
                    reason: format!("start {:.3}s is not before end {:.3}s", start, end),
                });
            }

            if let Some(prev) = merged.last() {
                if start < prev.start {
                    return Err(Error::MalformedSegment {
                        chunk: chunk.index,
                        reason: format!(
                            "start {:.3}s precedes previous start {:.3}s",
                            start, prev.start
                        ),
                    });
                }
            }

            merged.push(Segment {
                start,
                end,
                text: raw.text,
            });
        }
    }

    Ok(Transcript::from_validated(merged))
}
