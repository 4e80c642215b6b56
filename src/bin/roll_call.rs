//! Roll call over the point-to-point layer: every worker reports to the
//! coordinator, which prints its own line and then the reports in rank
//! order.

use futures::future::join_all;
use sliceweave::collective::Communicator;
use sliceweave::group::{COORDINATOR, build_group};
use sliceweave::orchestrator::RunnerConfig;
use sliceweave::protocol::ProtocolError;
use std::process::ExitCode;

async fn report(mut comm: Communicator) -> Result<(), ProtocolError> {
  if comm.is_coordinator() {
    println!("Process 0 of {} > calling the roll.", comm.size());
    for peer in 1..comm.size() {
      let line: String = comm.recv(peer).await?;
      println!("{line}");
    }
  } else {
    let line = format!("Process {} of {} > present.", comm.rank(), comm.size());
    comm.send(COORDINATOR, line).await?;
  }
  Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
  tracing_subscriber::fmt::init();

  let config = match RunnerConfig::from_cli(std::env::args().skip(1)) {
    Ok(config) => config,
    Err(err) => {
      eprintln!("roll_call: {err}");
      eprintln!("usage: roll_call [--group-size N]");
      return ExitCode::FAILURE;
    }
  };

  let endpoints = match build_group(config.group_size, config.channel_capacity) {
    Ok(endpoints) => endpoints,
    Err(err) => {
      eprintln!("roll_call: {err}");
      return ExitCode::FAILURE;
    }
  };

  let mut tasks = Vec::with_capacity(endpoints.len());
  for endpoint in endpoints {
    tasks.push(tokio::spawn(report(Communicator::new(endpoint))));
  }
  for joined in join_all(tasks).await {
    let result = match joined {
      Ok(result) => result,
      Err(err) => {
        eprintln!("roll_call: {err}");
        return ExitCode::FAILURE;
      }
    };
    if let Err(err) = result {
      eprintln!("roll_call: {err}");
      return ExitCode::FAILURE;
    }
  }
  ExitCode::SUCCESS
}
