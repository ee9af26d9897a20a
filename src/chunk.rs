//! Chunk planning for the replicate-parallel reconstruction stage.
//!
//! Centralizing the range math keeps the submission side (sizing the array
//! job) and the execution side (recomputing a task's replica range from its
//! array index) in agreement about chunk boundaries.

/// A contiguous sub-range of replicate indices grouped into one schedulable
/// array task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position of this chunk in the plan (the array task index).
    pub index: u32,
    /// First replicate index covered (one-based, inclusive).
    pub start: u32,
    /// Last replicate index covered (one-based, inclusive).
    pub end: u32,
}

impl Chunk {
    /// Iterate the replicate indices covered by this chunk.
    pub fn replicates(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }

    /// Number of replicates covered by this chunk.
    pub fn replicate_count(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// Number of chunks needed to cover `1..=n` with chunks of at most `size`.
pub fn chunk_count(n: u32, size: u32) -> u32 {
    n.div_ceil(size.max(1))
}

/// Partition `1..=n` into contiguous chunks of at most `size` replicates.
///
/// `n == 0` yields no chunks; callers treat that as a no-op, not an error.
pub fn plan(n: u32, size: u32) -> Vec<Chunk> {
    let mut chunks = Vec::with_capacity(chunk_count(n, size) as usize);
    let mut index = 0;
    while let Some(chunk) = chunk_at(n, size, index) {
        chunks.push(chunk);
        index += 1;
    }
    chunks
}

/// Recompute one chunk of the plan from its array task index.
///
/// Returns `None` when `index` is at or past the end of the plan, so a
/// mis-sized array submission surfaces instead of computing a bogus range.
pub fn chunk_at(n: u32, size: u32, index: u32) -> Option<Chunk> {
    let size = size.max(1);
    let start = index.checked_mul(size)?.checked_add(1)?;
    if start > n {
        return None;
    }
    let end = (start + size - 1).min(n);
    Some(Chunk { index, start, end })
}
