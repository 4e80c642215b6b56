//! # Vector Distributor
//!
//! The vector-level layer over the collectives: replicate the announced
//! length, scatter a coordinator-held vector into equal contiguous slices
//! in rank order, and gather slices back into the coordinator's vector.
//!
//! Chunk `r` always covers global indices `[r * local_len, (r + 1) * local_len)`
//! (see [`PartitionPlan::slice_bounds`]). Slice buffers are reserved through
//! a fallible path so "allocation succeeded" is a real flag the collective
//! validator can combine across the group.

use crate::collective::Communicator;
use crate::partition::PartitionPlan;
use crate::protocol::ProtocolError;
use std::collections::TryReserveError;

/// Replicates the coordinator's announced vector length to every rank.
///
/// `len_at_coordinator` must be `Some` only at the coordinator. Runs before
/// partition planning so that every rank plans from the identical length.
pub async fn broadcast_len(
  comm: &mut Communicator,
  len_at_coordinator: Option<i64>,
) -> Result<i64, ProtocolError> {
  comm.broadcast(len_at_coordinator).await
}

/// Scatters the coordinator's full vector; every rank returns its own slice.
///
/// `full` must be `Some` only at the coordinator, with length exactly
/// `plan.global_len()`.
pub async fn scatter_vector(
  comm: &mut Communicator,
  full: Option<&[f64]>,
  plan: PartitionPlan,
) -> Result<Vec<f64>, ProtocolError> {
  comm.scatter(full, plan.local_len()).await
}

/// Gathers every rank's slice back into the coordinator's full vector.
///
/// Returns `Some` (slices concatenated in rank order) at the coordinator and
/// `None` everywhere else; all ranks must call it.
pub async fn gather_vector(
  comm: &mut Communicator,
  local: Vec<f64>,
) -> Result<Option<Vec<f64>>, ProtocolError> {
  comm.gather(local).await
}

/// Reserves an empty slice buffer with capacity for `local_len` elements.
///
/// Uses fallible reservation so an out-of-memory worker reports a lowered
/// validity flag instead of crashing out of the group.
pub fn allocate_slice(local_len: usize) -> Result<Vec<f64>, TryReserveError> {
  let mut values = Vec::new();
  values.try_reserve_exact(local_len)?;
  Ok(values)
}
