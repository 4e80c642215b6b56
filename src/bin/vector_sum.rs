//! Interactive entry point for the distributed vector-sum kernel.
//!
//! Reads the vector order and two vectors at the coordinator, scatters them
//! across the worker group, sums element-wise, and echoes the gathered sum.
//! Exits non-zero when the group aborts on a failed precondition.

use sliceweave::console::{ConsoleSink, ConsoleSource};
use sliceweave::orchestrator::{RunOutcome, RunnerConfig, run_group};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
  tracing_subscriber::fmt::init();

  let config = match RunnerConfig::from_cli(std::env::args().skip(1)) {
    Ok(config) => config,
    Err(err) => {
      eprintln!("vector_sum: {err}");
      eprintln!("usage: vector_sum [--group-size N]");
      return ExitCode::FAILURE;
    }
  };

  match run_group(
    config,
    Box::new(ConsoleSource::new()),
    Box::new(ConsoleSink::new()),
  )
  .await
  {
    Ok(RunOutcome::Completed) => ExitCode::SUCCESS,
    Ok(RunOutcome::Aborted { .. }) => ExitCode::FAILURE,
    Err(err) => {
      eprintln!("vector_sum: {err}");
      ExitCode::FAILURE
    }
  }
}
