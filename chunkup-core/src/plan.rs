//! Splitting a source length into numbered parts

use serde::{Deserialize, Serialize};

use crate::{ChunkupError, Result, MAX_PARTS};

/// One contiguous byte range of the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRange {
    /// 1-based part number
    pub number: u32,
    pub offset: u64,
    pub len: u64,
}

impl PartRange {
    /// Exclusive end offset
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// Part layout for a source of `total_len` bytes.
///
/// Every part is exactly `part_size` bytes except possibly the last, which
/// holds the remainder. A zero-length source has no parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPlan {
    total_len: u64,
    part_size: u64,
}

impl PartPlan {
    pub fn new(total_len: u64, part_size: u64) -> Result<Self> {
        if part_size == 0 {
            return Err(ChunkupError::InvalidPartSize(part_size));
        }

        let plan = PartPlan {
            total_len,
            part_size,
        };
        let parts = plan.part_count();
        if parts > MAX_PARTS {
            return Err(ChunkupError::TooManyParts {
                parts,
                max: MAX_PARTS,
            });
        }

        Ok(plan)
    }

    pub fn total_len(&self) -> u64 {
        self.total_len
    }

    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    /// ceil(total_len / part_size)
    pub fn part_count(&self) -> u64 {
        self.total_len.div_ceil(self.part_size)
    }

    pub fn is_empty(&self) -> bool {
        self.total_len == 0
    }

    pub fn iter(&self) -> PartIter {
        PartIter {
            plan: *self,
            position: 0,
            next_number: 1,
        }
    }
}

impl IntoIterator for &PartPlan {
    type Item = PartRange;
    type IntoIter = PartIter;

    fn into_iter(self) -> PartIter {
        self.iter()
    }
}

/// Walks the plan from offset zero
#[derive(Debug, Clone)]
pub struct PartIter {
    plan: PartPlan,
    position: u64,
    next_number: u32,
}

impl Iterator for PartIter {
    type Item = PartRange;

    fn next(&mut self) -> Option<PartRange> {
        if self.position >= self.plan.total_len {
            return None;
        }

        let remaining = self.plan.total_len - self.position;
        let range = PartRange {
            number: self.next_number,
            offset: self.position,
            len: remaining.min(self.plan.part_size),
        };

        // Only the final part can be short, so stepping by the configured size
        // lands exactly on the next part or at/after the end.
        self.position = self.position.saturating_add(self.plan.part_size);
        self.next_number += 1;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .plan
            .total_len
            .saturating_sub(self.position)
            .div_ceil(self.plan.part_size);
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PartIter {}
