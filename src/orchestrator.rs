//! # Orchestrator
//!
//! Runs the fixed stage sequence of the vector-sum kernel identically at
//! every rank:
//!
//! `Init → ReadSize → ValidateSize → Allocate → ValidateAlloc → ScatterX →
//! ScatterY → ComputeSum → GatherZ → Done`
//!
//! with `Aborted` as the terminal stage whenever a validator checkpoint
//! fails. The sequence is the ordering guarantee for the whole protocol:
//! collectives are indistinguishable on the wire apart from their tags, so
//! every rank must issue them in this exact order. No stage is ever skipped.
//!
//! [`run_group`] is the top level: it wires the mesh, spawns one worker task
//! per rank, joins them all, and performs teardown exactly once, abort
//! included; no worker terminates the process from inside the run.

use crate::collective::Communicator;
use crate::compute;
use crate::console::{ReportSink, VectorSource};
use crate::distributor;
use crate::error::KernelError;
use crate::group::{self, COORDINATOR, DEFAULT_CHANNEL_CAPACITY};
use crate::partition::PartitionPlan;
use crate::validator::{check_or_abort, validated};
use futures::future::join_all;
use std::fmt;
use tracing::{debug, error, info, warn};

const SIZE_CONTEXT: &str = "read_len";
const SIZE_MESSAGE: &str = "n should be > 0 and evenly divisible by the group size";
const ALLOC_CONTEXT: &str = "allocate_vectors";
const ALLOC_MESSAGE: &str = "can't allocate local vector(s)";
const READ_CONTEXT: &str = "read_vector";

/// The stages of a run, in their one legal order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
  /// Group established, nothing exchanged yet.
  Init,
  /// Coordinator reads `n`; the length is replicated to every rank.
  ReadSize,
  /// Group-wide check that `n` partitions evenly.
  ValidateSize,
  /// Local slice buffers are reserved.
  Allocate,
  /// Group-wide check that every rank's reservation succeeded.
  ValidateAlloc,
  /// `x` is read at the coordinator and scattered.
  ScatterX,
  /// `y` is read at the coordinator and scattered.
  ScatterY,
  /// Each rank sums its local slices.
  ComputeSum,
  /// `z` is gathered back and echoed at the coordinator.
  GatherZ,
  /// Terminal: the run completed.
  Done,
  /// Terminal: a validator checkpoint failed and the group tore down.
  Aborted,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Stage::Init => "init",
      Stage::ReadSize => "read_size",
      Stage::ValidateSize => "validate_size",
      Stage::Allocate => "allocate",
      Stage::ValidateAlloc => "validate_alloc",
      Stage::ScatterX => "scatter_x",
      Stage::ScatterY => "scatter_y",
      Stage::ComputeSum => "compute_sum",
      Stage::GatherZ => "gather_z",
      Stage::Done => "done",
      Stage::Aborted => "aborted",
    };
    f.write_str(name)
  }
}

/// How a run ended; identical at every rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
  /// All stages ran; the gathered sum was echoed.
  Completed,
  /// A validator checkpoint failed; the group aborted together.
  Aborted {
    /// Name of the failing stage.
    context: String,
    /// Group-wide reason.
    message: String,
  },
}

impl RunOutcome {
  /// True when the run completed normally.
  pub fn is_success(&self) -> bool {
    matches!(self, RunOutcome::Completed)
  }
}

/// The coordinator's console endpoints.
pub struct CoordinatorIo {
  source: Box<dyn VectorSource>,
  sink: Box<dyn ReportSink>,
}

impl CoordinatorIo {
  /// Bundles the coordinator's input source and output sink.
  pub fn new(source: Box<dyn VectorSource>, sink: Box<dyn ReportSink>) -> Self {
    Self { source, sink }
  }
}

/// Group-size and channel configuration for a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunnerConfig {
  /// Number of cooperating workers.
  pub group_size: usize,
  /// Capacity of each rank-to-rank channel.
  pub channel_capacity: usize,
}

impl RunnerConfig {
  /// A config for `group_size` workers with the default channel capacity.
  pub fn new(group_size: usize) -> Self {
    Self {
      group_size,
      ..Self::default()
    }
  }

  /// Builds a config from `SLICEWEAVE_GROUP_SIZE` and `--group-size N`
  /// command-line arguments, the flag winning over the environment.
  pub fn from_cli(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
    let mut config = Self::default();
    if let Ok(value) = std::env::var("SLICEWEAVE_GROUP_SIZE") {
      config.group_size = value
        .parse()
        .map_err(|_| format!("invalid SLICEWEAVE_GROUP_SIZE {value:?}"))?;
    }
    while let Some(arg) = args.next() {
      match arg.as_str() {
        "--group-size" => {
          let value = args
            .next()
            .ok_or_else(|| "--group-size requires a value".to_string())?;
          config.group_size = value
            .parse()
            .map_err(|_| format!("invalid group size {value:?}"))?;
        }
        other => return Err(format!("unknown argument {other:?}")),
      }
    }
    if config.group_size == 0 {
      return Err("group size must be >= 1".to_string());
    }
    Ok(config)
  }
}

impl Default for RunnerConfig {
  fn default() -> Self {
    Self {
      group_size: 4,
      channel_capacity: DEFAULT_CHANNEL_CAPACITY,
    }
  }
}

/// One rank's pass through the kernel's stage sequence.
pub struct VectorSumRun {
  comm: Communicator,
  io: Option<CoordinatorIo>,
  stage: Stage,
}

impl VectorSumRun {
  /// Prepares a run for one rank.
  ///
  /// `io` must be `Some` at the coordinator and `None` at every other rank.
  pub fn new(comm: Communicator, io: Option<CoordinatorIo>) -> Result<Self, KernelError> {
    if comm.is_coordinator() != io.is_some() {
      return Err(KernelError::ConsoleAtWrongRank);
    }
    Ok(Self {
      comm,
      io,
      stage: Stage::Init,
    })
  }

  /// The stage this run is currently in.
  pub fn stage(&self) -> Stage {
    self.stage
  }

  /// Drives the stage sequence to a terminal stage.
  ///
  /// A group-validated precondition failure ends in
  /// [`RunOutcome::Aborted`], with the coordinator emitting the single
  /// diagnostic line first. Any other error means the protocol itself broke down and
  /// is returned as-is.
  pub async fn run(mut self) -> Result<RunOutcome, KernelError> {
    match self.drive().await {
      Ok(()) => {
        self.enter(Stage::Done);
        if self.comm.is_coordinator() {
          info!(size = self.comm.size(), "vector sum completed");
        }
        Ok(RunOutcome::Completed)
      }
      Err(KernelError::Aborted { context, message }) => {
        self.enter(Stage::Aborted);
        let rank = self.comm.rank();
        if let Some(io) = self.io.as_mut() {
          error!(context = %context, message = %message, "aborting group");
          io.sink.diagnostic(rank, &context, &message).await?;
        }
        Ok(RunOutcome::Aborted { context, message })
      }
      Err(other) => Err(other),
    }
  }

  async fn drive(&mut self) -> Result<(), KernelError> {
    self.enter(Stage::ReadSize);
    let announced = self.read_len().await?;

    self.enter(Stage::ValidateSize);
    let plan = PartitionPlan::plan(announced, self.comm.context());
    let plan = validated(&mut self.comm, plan, SIZE_CONTEXT, SIZE_MESSAGE).await?;

    self.enter(Stage::Allocate);
    let reserved = distributor::allocate_slice(plan.local_len());

    self.enter(Stage::ValidateAlloc);
    let mut local_z = validated(&mut self.comm, reserved, ALLOC_CONTEXT, ALLOC_MESSAGE).await?;

    self.enter(Stage::ScatterX);
    let local_x = self.read_and_scatter("x", plan).await?;

    self.enter(Stage::ScatterY);
    let local_y = self.read_and_scatter("y", plan).await?;

    self.enter(Stage::ComputeSum);
    compute::elementwise_sum_into(&local_x, &local_y, &mut local_z);

    self.enter(Stage::GatherZ);
    let gathered = distributor::gather_vector(&mut self.comm, local_z).await?;
    if let Some(full) = gathered {
      if let Some(io) = self.io.as_mut() {
        io.sink.vector("The sum is", &full).await?;
      }
    }
    Ok(())
  }

  /// Reads `n` at the coordinator and replicates it to every rank.
  ///
  /// A failed read is folded into an invalid length so that the group
  /// rejects it at the next validator checkpoint instead of diverging.
  async fn read_len(&mut self) -> Result<i64, KernelError> {
    let announced = match self.io.as_mut() {
      Some(io) => {
        let n = match io.source.read_len().await {
          Ok(n) => n,
          Err(err) => {
            warn!(error = %err, "could not read vector length");
            -1
          }
        };
        distributor::broadcast_len(&mut self.comm, Some(n)).await?
      }
      None => distributor::broadcast_len(&mut self.comm, None).await?,
    };
    Ok(announced)
  }

  /// Reads a named vector at the coordinator, validates the read across the
  /// group, and scatters it.
  async fn read_and_scatter(
    &mut self,
    name: &str,
    plan: PartitionPlan,
  ) -> Result<Vec<f64>, KernelError> {
    let staged = match self.io.as_mut() {
      Some(io) => Some(io.source.read_values(name, plan.global_len()).await),
      None => None,
    };
    let local_ok = match &staged {
      Some(Ok(_)) | None => true,
      Some(Err(err)) => {
        warn!(error = %err, vector = name, "could not read vector");
        false
      }
    };
    check_or_abort(
      &mut self.comm,
      local_ok,
      READ_CONTEXT,
      &format!("can't read vector {name}"),
    )
    .await?;

    let full = match staged {
      Some(Ok(values)) => Some(values),
      _ => None,
    };
    let local = distributor::scatter_vector(&mut self.comm, full.as_deref(), plan).await?;
    Ok(local)
  }

  fn enter(&mut self, stage: Stage) {
    self.stage = stage;
    debug!(rank = self.comm.rank(), %stage, "entering stage");
  }
}

/// Runs the whole kernel: wires the mesh, spawns one worker per rank,
/// joins them, and returns the group's outcome.
///
/// The console endpoints are handed to the coordinator; every other rank
/// runs without them. Teardown (dropping the mesh) happens here exactly
/// once, for completions and aborts alike.
pub async fn run_group(
  config: RunnerConfig,
  source: Box<dyn VectorSource>,
  sink: Box<dyn ReportSink>,
) -> Result<RunOutcome, KernelError> {
  let endpoints = group::build_group(config.group_size, config.channel_capacity)?;
  let mut io = Some(CoordinatorIo::new(source, sink));

  let mut handles = Vec::with_capacity(endpoints.len());
  for endpoint in endpoints {
    let rank_io = if endpoint.context().is_coordinator() {
      io.take()
    } else {
      None
    };
    let run = VectorSumRun::new(Communicator::new(endpoint), rank_io)?;
    handles.push(tokio::spawn(run.run()));
  }

  let mut outcomes = Vec::with_capacity(handles.len());
  for joined in join_all(handles).await {
    outcomes.push(joined??);
  }
  // Validator checkpoints guarantee the outcomes agree; report rank 0's.
  Ok(outcomes.swap_remove(COORDINATOR))
}
