//! Tests for the collective layer and the group-wide validator.

use crate::collective::Communicator;
use crate::error::KernelError;
use crate::group::build_group;
use crate::protocol::ProtocolError;
use crate::validator::{check_or_abort, validated};

fn communicators(size: usize) -> Vec<Communicator> {
  build_group(size, 8)
    .unwrap()
    .into_iter()
    .map(Communicator::new)
    .collect()
}

#[tokio::test]
async fn test_broadcast_delivers_identical_value() {
  let mut tasks = Vec::new();
  for (rank, mut comm) in communicators(3).into_iter().enumerate() {
    tasks.push(tokio::spawn(async move {
      let root = if rank == 0 { Some(42i64) } else { None };
      comm.broadcast(root).await.unwrap()
    }));
  }
  for task in tasks {
    assert_eq!(task.await.unwrap(), 42);
  }
}

#[tokio::test]
async fn test_scatter_delivers_chunks_in_rank_order() {
  let mut tasks = Vec::new();
  for (rank, mut comm) in communicators(3).into_iter().enumerate() {
    tasks.push(tokio::spawn(async move {
      let full = (rank == 0).then(|| vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
      let chunk = comm.scatter(full.as_deref(), 2).await.unwrap();
      (rank, chunk)
    }));
  }
  for task in tasks {
    let (rank, chunk) = task.await.unwrap();
    let base = 2.0 * rank as f64;
    assert_eq!(chunk, vec![base, base + 1.0]);
  }
}

#[tokio::test]
async fn test_gather_concatenates_in_rank_order() {
  let mut tasks = Vec::new();
  for (rank, mut comm) in communicators(3).into_iter().enumerate() {
    tasks.push(tokio::spawn(async move {
      let local = vec![rank as f64; 2];
      (rank, comm.gather(local).await.unwrap())
    }));
  }
  for task in tasks {
    let (rank, gathered) = task.await.unwrap();
    if rank == 0 {
      assert_eq!(gathered, Some(vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0]));
    } else {
      assert_eq!(gathered, None);
    }
  }
}

#[tokio::test]
async fn test_scatter_then_gather_is_identity() {
  let original: Vec<f64> = (0..12).map(f64::from).collect();
  let mut tasks = Vec::new();
  for (rank, mut comm) in communicators(4).into_iter().enumerate() {
    let original = original.clone();
    tasks.push(tokio::spawn(async move {
      let full = (rank == 0).then_some(original);
      let chunk = comm.scatter(full.as_deref(), 3).await.unwrap();
      comm.gather(chunk).await.unwrap()
    }));
  }
  for (rank, task) in tasks.into_iter().enumerate() {
    let gathered = task.await.unwrap();
    if rank == 0 {
      assert_eq!(gathered, Some(original.clone()));
    }
  }
}

#[tokio::test]
async fn test_all_ok_requires_every_flag() {
  for failing_rank in 0..3 {
    let mut tasks = Vec::new();
    for (rank, mut comm) in communicators(3).into_iter().enumerate() {
      tasks.push(tokio::spawn(async move {
        comm.all_ok(rank != failing_rank).await.unwrap()
      }));
    }
    for task in tasks {
      assert!(!task.await.unwrap(), "rank {failing_rank} was ignored");
    }
  }
}

#[tokio::test]
async fn test_all_ok_passes_when_unanimous() {
  let mut tasks = Vec::new();
  for mut comm in communicators(3) {
    tasks.push(tokio::spawn(async move { comm.all_ok(true).await.unwrap() }));
  }
  for task in tasks {
    assert!(task.await.unwrap());
  }
}

#[tokio::test]
async fn test_barrier_completes_for_all_ranks() {
  let mut tasks = Vec::new();
  for mut comm in communicators(4) {
    tasks.push(tokio::spawn(async move { comm.barrier().await }));
  }
  for task in tasks {
    task.await.unwrap().unwrap();
  }
}

#[tokio::test]
async fn test_point_to_point_is_rank_addressed() {
  let mut tasks = Vec::new();
  for (rank, mut comm) in communicators(3).into_iter().enumerate() {
    tasks.push(tokio::spawn(async move {
      if rank == 0 {
        let mut greetings = Vec::new();
        for peer in 1..comm.size() {
          greetings.push(comm.recv::<String>(peer).await.unwrap());
        }
        Some(greetings)
      } else {
        comm
          .send(0, format!("hello from {rank}"))
          .await
          .unwrap();
        None
      }
    }));
  }
  let mut results = Vec::new();
  for task in tasks {
    results.push(task.await.unwrap());
  }
  assert_eq!(
    results[0],
    Some(vec!["hello from 1".to_string(), "hello from 2".to_string()])
  );
}

#[tokio::test]
async fn test_mismatched_collectives_are_detected() {
  let mut comms = communicators(2);
  let mut worker = comms.pop().unwrap();
  let mut coordinator = comms.pop().unwrap();

  // Coordinator broadcasts, the worker wrongly expects a scatter.
  let coordinator_task =
    tokio::spawn(async move { coordinator.broadcast(Some(7i64)).await.unwrap() });
  let err = worker.scatter::<i64>(None, 1).await.unwrap_err();
  assert!(matches!(err, ProtocolError::TagMismatch { .. }));
  coordinator_task.await.unwrap();
}

#[tokio::test]
async fn test_scatter_rejects_wrong_total_length() {
  let mut comm = communicators(1).pop().unwrap();
  let err = comm
    .scatter(Some(&[1.0, 2.0, 3.0][..]), 2)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    ProtocolError::ShapeMismatch {
      expected: 2,
      actual: 3
    }
  ));
}

#[tokio::test]
async fn test_rooted_collectives_check_root_value_placement() {
  let mut comm = communicators(1).pop().unwrap();
  let err = comm.broadcast::<i64>(None).await.unwrap_err();
  assert!(matches!(err, ProtocolError::MissingRootValue { .. }));

  let mut comms = communicators(2);
  let mut worker = comms.pop().unwrap();
  let mut coordinator = comms.pop().unwrap();
  let coordinator_task =
    tokio::spawn(async move { coordinator.broadcast(Some(5i64)).await.unwrap() });
  let err = worker.broadcast(Some(5i64)).await.unwrap_err();
  assert!(matches!(
    err,
    ProtocolError::UnexpectedRootValue { rank: 1, .. }
  ));
  coordinator_task.await.unwrap();
}

#[tokio::test]
async fn test_check_or_abort_passes_unanimous_group() {
  let mut tasks = Vec::new();
  for mut comm in communicators(3) {
    tasks.push(tokio::spawn(async move {
      check_or_abort(&mut comm, true, "stage", "never shown").await
    }));
  }
  for task in tasks {
    task.await.unwrap().unwrap();
  }
}

#[tokio::test]
async fn test_check_or_abort_aborts_every_rank_identically() {
  let mut tasks = Vec::new();
  for (rank, mut comm) in communicators(3).into_iter().enumerate() {
    tasks.push(tokio::spawn(async move {
      // Only rank 2 detects the failure locally.
      check_or_abort(&mut comm, rank != 2, "read_len", "bad n").await
    }));
  }
  for task in tasks {
    let err = task.await.unwrap().unwrap_err();
    match err {
      KernelError::Aborted { context, message } => {
        assert_eq!(context, "read_len");
        assert_eq!(message, "bad n");
      }
      other => panic!("expected abort, got {other}"),
    }
  }
}

#[tokio::test]
async fn test_validated_unwraps_group_wide_success() {
  let mut tasks = Vec::new();
  for (rank, mut comm) in communicators(2).into_iter().enumerate() {
    tasks.push(tokio::spawn(async move {
      let local: Result<usize, &str> = Ok(rank * 10);
      validated(&mut comm, local, "stage", "never shown").await
    }));
  }
  for (rank, task) in tasks.into_iter().enumerate() {
    assert_eq!(task.await.unwrap().unwrap(), rank * 10);
  }
}

#[tokio::test]
async fn test_validated_aborts_when_any_rank_fails() {
  let mut tasks = Vec::new();
  for (rank, mut comm) in communicators(2).into_iter().enumerate() {
    tasks.push(tokio::spawn(async move {
      let local: Result<usize, &str> = if rank == 1 { Err("no memory") } else { Ok(1) };
      validated(&mut comm, local, "allocate_vectors", "can't allocate").await
    }));
  }
  for task in tasks {
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, KernelError::Aborted { .. }));
  }
}
