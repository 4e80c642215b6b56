//! # Collective Operations
//!
//! [`Communicator`] is a rank's handle on the group: coordinator-rooted
//! broadcast / scatter / gather, the group-wide validity reduction
//! [`Communicator::all_ok`], a barrier, and rank-addressed point-to-point
//! messaging underneath them all.
//!
//! Every collective here is a true collective: it completes at a rank only
//! once every rank has issued the matching call, and every rank must issue
//! collectives in the same program order. A rank that skips a call parks the
//! whole group (a documented precondition, not a detected error), while a
//! rank that issues a *different* call is caught by the frame tag
//! check and surfaces as a [`ProtocolError`].

use crate::group::{COORDINATOR, GroupContext, GroupEndpoint};
use crate::protocol::{CollectiveTag, Frame, ProtocolError};
use tracing::trace;

/// A rank's handle for communicating with the rest of the group.
///
/// Owned exclusively by that rank's task; all methods take the handle
/// mutably, mirroring the fact that a rank participates in at most one
/// collective at a time.
pub struct Communicator {
  endpoint: GroupEndpoint,
}

impl Communicator {
  /// Wraps a mesh endpoint.
  pub fn new(endpoint: GroupEndpoint) -> Self {
    Self { endpoint }
  }

  /// The group context this communicator belongs to.
  pub fn context(&self) -> GroupContext {
    self.endpoint.context()
  }

  /// This worker's rank.
  pub fn rank(&self) -> usize {
    self.context().rank()
  }

  /// Number of workers in the group.
  pub fn size(&self) -> usize {
    self.context().size()
  }

  /// True at rank 0.
  pub fn is_coordinator(&self) -> bool {
    self.context().is_coordinator()
  }

  /// Sends `value` to `peer` outside any collective.
  pub async fn send<T: Send + 'static>(&self, peer: usize, value: T) -> Result<(), ProtocolError> {
    self
      .send_tagged(peer, CollectiveTag::PointToPoint, value)
      .await
  }

  /// Receives the next point-to-point value sent by `peer`.
  pub async fn recv<T: 'static>(&mut self, peer: usize) -> Result<T, ProtocolError> {
    self.recv_tagged(peer, CollectiveTag::PointToPoint).await
  }

  /// Delivers the coordinator's value identically to every rank.
  ///
  /// `root_value` must be `Some` at the coordinator and `None` everywhere
  /// else. Every rank returns the coordinator's value.
  pub async fn broadcast<T>(&mut self, root_value: Option<T>) -> Result<T, ProtocolError>
  where
    T: Clone + Send + 'static,
  {
    let tag = CollectiveTag::Broadcast;
    if self.is_coordinator() {
      let value = root_value.ok_or(ProtocolError::MissingRootValue { tag })?;
      for peer in 1..self.size() {
        self.send_tagged(peer, tag, value.clone()).await?;
      }
      Ok(value)
    } else {
      self.reject_root_value(root_value, tag)?;
      self.recv_tagged(COORDINATOR, tag).await
    }
  }

  /// Splits the coordinator's sequence into `size` contiguous chunks of
  /// `chunk_len` elements, in rank order, and delivers chunk `r` to rank `r`.
  ///
  /// `full` must be `Some` (with length exactly `size * chunk_len`) at the
  /// coordinator and `None` everywhere else. Every rank, the coordinator
  /// included, returns exactly its own chunk.
  pub async fn scatter<T>(
    &mut self,
    full: Option<&[T]>,
    chunk_len: usize,
  ) -> Result<Vec<T>, ProtocolError>
  where
    T: Clone + Send + 'static,
  {
    let tag = CollectiveTag::Scatter;
    if self.is_coordinator() {
      let full = full.ok_or(ProtocolError::MissingRootValue { tag })?;
      let expected = chunk_len * self.size();
      if full.len() != expected {
        return Err(ProtocolError::ShapeMismatch {
          expected,
          actual: full.len(),
        });
      }
      for peer in 1..self.size() {
        let chunk = full[peer * chunk_len..(peer + 1) * chunk_len].to_vec();
        self.send_tagged(peer, tag, chunk).await?;
      }
      Ok(full[..chunk_len].to_vec())
    } else {
      self.reject_root_value(full, tag)?;
      self.recv_tagged(COORDINATOR, tag).await
    }
  }

  /// Reassembles per-rank chunks into the coordinator's sequence, in rank
  /// order; the inverse of [`scatter`](Self::scatter).
  ///
  /// Returns `Some` concatenation at the coordinator and `None` everywhere
  /// else; every rank must still call it.
  pub async fn gather<T>(&mut self, local: Vec<T>) -> Result<Option<Vec<T>>, ProtocolError>
  where
    T: Send + 'static,
  {
    let tag = CollectiveTag::Gather;
    if self.is_coordinator() {
      let mut full = local;
      full.reserve((self.size() - 1) * full.len());
      for peer in 1..self.size() {
        let chunk: Vec<T> = self.recv_tagged(peer, tag).await?;
        full.extend(chunk);
      }
      Ok(Some(full))
    } else {
      self.send_tagged(COORDINATOR, tag, local).await?;
      Ok(None)
    }
  }

  /// Combines every rank's validity flag with logical AND.
  ///
  /// The result is identical at every rank. Realized as a reduction to the
  /// coordinator followed by a broadcast of the combined flag.
  pub async fn all_ok(&mut self, local_flag: bool) -> Result<bool, ProtocolError> {
    let combined = if self.is_coordinator() {
      let mut ok = local_flag;
      for peer in 1..self.size() {
        let flag: bool = self.recv_tagged(peer, CollectiveTag::ReduceFlags).await?;
        ok &= flag;
      }
      Some(ok)
    } else {
      self
        .send_tagged(COORDINATOR, CollectiveTag::ReduceFlags, local_flag)
        .await?;
      None
    };
    self.broadcast(combined).await
  }

  /// Blocks until every rank has arrived.
  pub async fn barrier(&mut self) -> Result<(), ProtocolError> {
    self.all_ok(true).await.map(|_| ())
  }

  async fn send_tagged<T: Send + 'static>(
    &self,
    peer: usize,
    tag: CollectiveTag,
    value: T,
  ) -> Result<(), ProtocolError> {
    trace!(rank = self.rank(), peer, %tag, "send");
    self.endpoint.send(peer, Frame::new(tag, value)).await
  }

  async fn recv_tagged<T: 'static>(
    &mut self,
    peer: usize,
    tag: CollectiveTag,
  ) -> Result<T, ProtocolError> {
    trace!(rank = self.rank(), peer, %tag, "recv");
    self.endpoint.recv(peer).await?.open(tag)
  }

  fn reject_root_value<T>(
    &self,
    root_value: Option<T>,
    tag: CollectiveTag,
  ) -> Result<(), ProtocolError> {
    match root_value {
      Some(_) => Err(ProtocolError::UnexpectedRootValue {
        rank: self.rank(),
        tag,
      }),
      None => Ok(()),
    }
  }
}
