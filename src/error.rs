//! # Crate-Level Error Type
//!
//! [`KernelError`] is what a worker's run surfaces to the orchestrator.
//! The interesting variant is [`KernelError::Aborted`]: a group-validated
//! precondition failed, every rank holds the identical abort, and the
//! orchestrator (not any helper deep in a call chain) performs the single
//! diagnostic and teardown. Everything else wraps a module error via
//! `#[from]` and means the protocol itself broke down.

use crate::console::ConsoleError;
use crate::group::GroupError;
use crate::protocol::ProtocolError;

/// Error type for a worker's run of the kernel.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
  /// A group-validated precondition failed; every rank aborts identically.
  #[error("in {context}, {message}")]
  Aborted {
    /// Name of the failing stage, e.g. `read_len`.
    context: String,
    /// Group-wide reason, identical at every rank.
    message: String,
  },
  /// A collective completed with a result that contradicts this rank's own
  /// flag. Can only happen if the mesh delivered inconsistent frames.
  #[error("collective validation passed despite a locally invalid flag")]
  InconsistentValidation,
  /// Console endpoints were attached to a rank other than the coordinator.
  #[error("console endpoints must be attached at the coordinator rank only")]
  ConsoleAtWrongRank,
  /// Rank-to-rank messaging failed.
  #[error(transparent)]
  Protocol(#[from] ProtocolError),
  /// The group could not be constructed.
  #[error(transparent)]
  Group(#[from] GroupError),
  /// Console output failed at the coordinator.
  #[error(transparent)]
  Console(#[from] ConsoleError),
  /// A worker task panicked or was cancelled before finishing.
  #[error("worker task failed: {0}")]
  Worker(#[from] tokio::task::JoinError),
}
