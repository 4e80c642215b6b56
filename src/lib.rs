//! # Sliceweave
//!
//! A distributed data-parallel vector-sum kernel in pure Rust.
//!
//! A fixed-size vector held by a coordinating worker is partitioned evenly
//! across a group of cooperating worker tasks, each worker sums its local
//! slice element-wise, and the results are gathered back in rank order for
//! display. The computation is deliberately small; the substance is the
//! distribution protocol around it:
//!
//! - **Consistent partitioning**: worker `r` always owns global indices
//!   `[r * local_len, (r + 1) * local_len)`, independent of the values.
//! - **True collectives**: broadcast, scatter, and gather complete at a rank
//!   only once every rank has issued the matching call, in the same order.
//! - **Coordinated abort**: every precondition (divisible vector length,
//!   successful local allocation) is AND-combined across the group before
//!   any rank acts on it, so either all workers proceed or all abort with
//!   one diagnostic and a non-zero exit.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sliceweave::console::{ConsoleSink, ConsoleSource};
//! use sliceweave::orchestrator::{RunnerConfig, run_group};
//!
//! # async fn example() -> Result<(), sliceweave::error::KernelError> {
//! let outcome = run_group(
//!   RunnerConfig::new(4),
//!   Box::new(ConsoleSource::new()),
//!   Box::new(ConsoleSink::new()),
//! )
//! .await?;
//! assert!(outcome.is_success());
//! # Ok(())
//! # }
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Collective operations over the rank-to-rank mesh.
pub mod collective;
/// Element-wise sum on local slices.
pub mod compute;
/// Console input/output seams and their shipped implementations.
pub mod console;
/// Vector-level scatter, gather, and slice allocation.
pub mod distributor;
/// Crate-level error type.
pub mod error;
/// Group context and mesh wiring.
pub mod group;
/// The per-rank stage sequence and the group runner.
pub mod orchestrator;
/// Partition planning and slice bounds.
pub mod partition;
/// Tagged, type-erased frames between ranks.
pub mod protocol;
/// Group-wide validity checks and coordinated abort.
pub mod validator;

#[cfg(test)]
mod collective_test;
