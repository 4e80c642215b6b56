//! # Partition Planner
//!
//! Computes the local slice length from the global vector length and the
//! group size, enforcing the divisibility invariant the whole protocol
//! rests on: every scatter, gather, and buffer size downstream assumes
//! `global_len == size * local_len` exactly.
//!
//! A plan is only trustworthy after its validity has been confirmed through
//! the collective validator; the planner itself checks locally, but
//! partitioning decisions must be group-wide.

use crate::group::GroupContext;
use std::ops::Range;

/// Error type for partition planning.
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
  /// The global length must be strictly positive.
  #[error("vector length must be > 0, got {0}")]
  NonPositive(i64),
  /// The global length must divide evenly across the group.
  #[error("vector length {len} is not evenly divisible by group size {size}")]
  NotDivisible {
    /// The rejected global length.
    len: i64,
    /// Size of the group.
    size: usize,
  },
}

/// An agreed split of a global vector across the group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionPlan {
  global_len: usize,
  local_len: usize,
}

impl PartitionPlan {
  /// Plans the even split of `global_len` elements across the group.
  ///
  /// Valid only when `global_len > 0` and `global_len % size == 0`. The
  /// length arrives as `i64` because it is read from the console and must
  /// be rejected, not wrapped, when negative.
  pub fn plan(global_len: i64, group: GroupContext) -> Result<Self, PartitionError> {
    if global_len <= 0 {
      return Err(PartitionError::NonPositive(global_len));
    }
    let len = global_len as usize;
    if len % group.size() != 0 {
      return Err(PartitionError::NotDivisible {
        len: global_len,
        size: group.size(),
      });
    }
    Ok(Self {
      global_len: len,
      local_len: len / group.size(),
    })
  }

  /// Total number of elements in the global vector.
  pub fn global_len(&self) -> usize {
    self.global_len
  }

  /// Number of elements each rank owns.
  pub fn local_len(&self) -> usize {
    self.local_len
  }

  /// Global index range owned by `rank`: `[rank * local_len, (rank + 1) * local_len)`.
  ///
  /// Depends only on the plan and the rank, never on value contents.
  pub fn slice_bounds(&self, rank: usize) -> Range<usize> {
    rank * self.local_len..(rank + 1) * self.local_len
  }
}
