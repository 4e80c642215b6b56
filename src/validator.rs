//! # Collective Validator
//!
//! The single choke point through which every local failure must pass
//! before it has any group-wide effect. A worker never acts on a purely
//! local validity flag for anything that touches protocol state: the flag is
//! AND-combined across the group first, so either every rank proceeds or
//! every rank aborts with the identical stage and message.
//!
//! Acting locally instead would leave the other ranks parked forever in
//! their next collective call, which is why no helper here (or anywhere
//! below the orchestrator) terminates the process: failure is a
//! distinguished [`KernelError::Aborted`] value that travels up.

use crate::collective::Communicator;
use crate::error::KernelError;
use std::fmt;
use tracing::debug;

/// Runs `local_ok` through the group-wide AND reduction and aborts every
/// rank identically when any rank reported failure.
///
/// Must be called by every rank of the group, in the same program order;
/// it blocks until all ranks have contributed.
pub async fn check_or_abort(
  comm: &mut Communicator,
  local_ok: bool,
  context: &str,
  message: &str,
) -> Result<(), KernelError> {
  if comm.all_ok(local_ok).await? {
    Ok(())
  } else {
    Err(KernelError::Aborted {
      context: context.to_string(),
      message: message.to_string(),
    })
  }
}

/// Validates a locally produced value across the group and unwraps it.
///
/// Each rank passes its own `Result`; the group proceeds only if every rank
/// produced `Ok`. On group-wide success the local value is returned, and the
/// caller may then rely on it for protocol state (sizing, buffers), because
/// every other rank is doing the same.
pub async fn validated<T, E: fmt::Display>(
  comm: &mut Communicator,
  local: Result<T, E>,
  context: &str,
  message: &str,
) -> Result<T, KernelError> {
  if let Err(err) = &local {
    debug!(rank = comm.rank(), context, error = %err, "local check failed");
  }
  check_or_abort(comm, local.is_ok(), context, message).await?;
  // The reduction is an AND: it cannot pass while this rank's flag is false.
  local.map_err(|_| KernelError::InconsistentValidation)
}
