//! # Group Context and Mesh Wiring
//!
//! A run consists of `size` worker tasks, each identified by a stable rank
//! in `0..size`. [`GroupContext`] carries that identity; [`build_group`]
//! wires the full mesh of rank-to-rank channels and hands each rank its
//! [`GroupEndpoint`], the in-process flavor of process-group bootstrap.
//!
//! Once built, the context never changes for the lifetime of the run. There
//! is no ambient global: every component that needs the rank or group size
//! receives the context by value.

use crate::protocol::{Frame, ProtocolError};
use tokio::sync::mpsc;
use tracing::debug;

/// Rank of the coordinating worker. Owns full vectors and all console I/O.
pub const COORDINATOR: usize = 0;

/// Default per-link channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Error type for group construction.
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
  /// A group must have at least one member.
  #[error("group size must be >= 1")]
  EmptyGroup,
  /// A context was requested for a rank outside the group.
  #[error("rank {rank} out of range for a group of {size}")]
  RankOutOfRange {
    /// The offending rank.
    rank: usize,
    /// Size of the group.
    size: usize,
  },
}

/// A worker's identity within the group: its rank and the group size.
///
/// Immutable after creation; exists for the lifetime of the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupContext {
  rank: usize,
  size: usize,
}

impl GroupContext {
  /// Creates a context for `rank` within a group of `size`.
  pub fn new(rank: usize, size: usize) -> Result<Self, GroupError> {
    if size == 0 {
      return Err(GroupError::EmptyGroup);
    }
    if rank >= size {
      return Err(GroupError::RankOutOfRange { rank, size });
    }
    Ok(Self { rank, size })
  }

  /// This worker's rank, unique within `0..size`.
  pub fn rank(&self) -> usize {
    self.rank
  }

  /// Number of cooperating workers; identical at every rank.
  pub fn size(&self) -> usize {
    self.size
  }

  /// True at the coordinating worker (rank 0).
  pub fn is_coordinator(&self) -> bool {
    self.rank == COORDINATOR
  }
}

/// One rank's set of mesh endpoints: a sender toward every rank and a
/// receiver from every rank, both indexed by peer rank.
///
/// Rank-addressed receivers are what make rank-ordered gather deterministic:
/// frames from distinct peers never share a queue.
pub struct GroupEndpoint {
  ctx: GroupContext,
  to_peer: Vec<mpsc::Sender<Frame>>,
  from_peer: Vec<mpsc::Receiver<Frame>>,
}

impl GroupEndpoint {
  /// The context this endpoint belongs to.
  pub fn context(&self) -> GroupContext {
    self.ctx
  }

  /// Delivers a frame to `peer`, waiting for channel capacity if needed.
  pub async fn send(&self, peer: usize, frame: Frame) -> Result<(), ProtocolError> {
    let link = self
      .to_peer
      .get(peer)
      .ok_or(ProtocolError::PeerOutOfRange {
        peer,
        size: self.ctx.size(),
      })?;
    link
      .send(frame)
      .await
      .map_err(|_| ProtocolError::Disconnected { peer })
  }

  /// Receives the next frame sent by `peer`, waiting until one arrives.
  pub async fn recv(&mut self, peer: usize) -> Result<Frame, ProtocolError> {
    let size = self.ctx.size();
    let link = self
      .from_peer
      .get_mut(peer)
      .ok_or(ProtocolError::PeerOutOfRange { peer, size })?;
    link
      .recv()
      .await
      .ok_or(ProtocolError::Disconnected { peer })
  }
}

/// Wires the full rank-to-rank mesh for a group of `size` workers.
///
/// Returns one endpoint per rank, in rank order. Each ordered pair of ranks
/// gets its own buffered channel, so sends to distinct peers never contend
/// and receives are addressable by source rank.
pub fn build_group(
  size: usize,
  channel_capacity: usize,
) -> Result<Vec<GroupEndpoint>, GroupError> {
  if size == 0 {
    return Err(GroupError::EmptyGroup);
  }
  let capacity = channel_capacity.max(1);

  let mut senders: Vec<Vec<mpsc::Sender<Frame>>> =
    (0..size).map(|_| Vec::with_capacity(size)).collect();
  let mut receivers: Vec<Vec<mpsc::Receiver<Frame>>> =
    (0..size).map(|_| Vec::with_capacity(size)).collect();

  for from in 0..size {
    for to in 0..size {
      let (tx, rx) = mpsc::channel(capacity);
      senders[from].push(tx);
      receivers[to].push(rx);
    }
  }

  let mut endpoints = Vec::with_capacity(size);
  for (rank, (to_peer, from_peer)) in senders.into_iter().zip(receivers).enumerate() {
    let ctx = GroupContext::new(rank, size)?;
    endpoints.push(GroupEndpoint {
      ctx,
      to_peer,
      from_peer,
    });
  }

  debug!(size, capacity, "wired process group mesh");
  Ok(endpoints)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::protocol::CollectiveTag;

  #[test]
  fn test_context_accessors() {
    let ctx = GroupContext::new(2, 4).unwrap();
    assert_eq!(ctx.rank(), 2);
    assert_eq!(ctx.size(), 4);
    assert!(!ctx.is_coordinator());
    assert!(GroupContext::new(0, 4).unwrap().is_coordinator());
  }

  #[test]
  fn test_context_rejects_bad_shapes() {
    assert!(matches!(
      GroupContext::new(0, 0),
      Err(GroupError::EmptyGroup)
    ));
    assert!(matches!(
      GroupContext::new(3, 3),
      Err(GroupError::RankOutOfRange { rank: 3, size: 3 })
    ));
  }

  #[test]
  fn test_build_group_rejects_empty() {
    assert!(matches!(build_group(0, 8), Err(GroupError::EmptyGroup)));
  }

  #[test]
  fn test_build_group_rank_order() {
    let endpoints = build_group(3, 8).unwrap();
    assert_eq!(endpoints.len(), 3);
    for (rank, endpoint) in endpoints.iter().enumerate() {
      assert_eq!(endpoint.context().rank(), rank);
      assert_eq!(endpoint.context().size(), 3);
    }
  }

  #[tokio::test]
  async fn test_mesh_routes_by_rank() {
    let mut endpoints = build_group(2, 8).unwrap();
    let mut b = endpoints.pop().unwrap();
    let a = endpoints.pop().unwrap();

    a.send(1, Frame::new(CollectiveTag::PointToPoint, 7i64))
      .await
      .unwrap();
    let frame = b.recv(0).await.unwrap();
    assert_eq!(frame.open::<i64>(CollectiveTag::PointToPoint).unwrap(), 7);
  }

  #[tokio::test]
  async fn test_send_to_unknown_rank_errors() {
    let endpoints = build_group(2, 8).unwrap();
    let err = endpoints[0]
      .send(5, Frame::new(CollectiveTag::PointToPoint, ()))
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      ProtocolError::PeerOutOfRange { peer: 5, size: 2 }
    ));
  }

  #[tokio::test]
  async fn test_recv_from_dropped_peer_errors() {
    let mut endpoints = build_group(2, 8).unwrap();
    let mut b = endpoints.pop().unwrap();
    drop(endpoints); // rank 0 endpoint gone
    let err = b.recv(0).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Disconnected { peer: 0 }));
  }
}
