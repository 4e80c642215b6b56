//! # Frame Protocol for Rank-to-Rank Channels
//!
//! Everything crossing a rank boundary travels as a [`Frame`]: a collective
//! tag plus a type-erased payload. The sender erases the payload to
//! `Box<dyn Any + Send>`; the receiver names the tag and concrete type it
//! expects and gets a [`ProtocolError`] if either does not match.
//!
//! The tag check is the debug-time shape assertion for collective misuse:
//! two ranks issuing collectives in different program orders surface as a
//! [`ProtocolError::TagMismatch`] instead of silently mis-attributing data.
//! A missing participant is not detectable here and parks the group; callers
//! must guarantee that every rank issues every collective in the same order.

use std::any::Any;
use std::fmt;

/// Names the collective operation a frame belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectiveTag {
  /// Coordinator-rooted broadcast.
  Broadcast,
  /// Coordinator-rooted scatter of contiguous chunks.
  Scatter,
  /// Coordinator-rooted gather of contiguous chunks.
  Gather,
  /// Validity-flag reduction leg of `all_ok`.
  ReduceFlags,
  /// Explicit rank-to-rank message outside any collective.
  PointToPoint,
}

impl fmt::Display for CollectiveTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      CollectiveTag::Broadcast => "broadcast",
      CollectiveTag::Scatter => "scatter",
      CollectiveTag::Gather => "gather",
      CollectiveTag::ReduceFlags => "reduce-flags",
      CollectiveTag::PointToPoint => "point-to-point",
    };
    f.write_str(name)
  }
}

/// A tagged, type-erased message between two ranks.
pub struct Frame {
  tag: CollectiveTag,
  payload: Box<dyn Any + Send>,
}

impl Frame {
  /// Wraps a payload for transmission under the given tag.
  pub fn new<T: Send + 'static>(tag: CollectiveTag, payload: T) -> Self {
    Self {
      tag,
      payload: Box::new(payload),
    }
  }

  /// Returns the tag this frame was sent under.
  pub fn tag(&self) -> CollectiveTag {
    self.tag
  }

  /// Recovers the concrete payload, checking both tag and payload type.
  pub fn open<T: 'static>(self, expected: CollectiveTag) -> Result<T, ProtocolError> {
    if self.tag != expected {
      return Err(ProtocolError::TagMismatch {
        expected,
        received: self.tag,
      });
    }
    self
      .payload
      .downcast::<T>()
      .map(|boxed| *boxed)
      .map_err(|_| ProtocolError::TypeMismatch { tag: expected })
  }
}

impl fmt::Debug for Frame {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Frame").field("tag", &self.tag).finish()
  }
}

/// Error type for rank-to-rank messaging.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
  /// The peer's endpoint was dropped mid-collective.
  #[error("rank {peer} disconnected mid-collective")]
  Disconnected {
    /// Rank of the vanished peer.
    peer: usize,
  },
  /// A frame arrived under a different collective than the receiver expected.
  #[error("expected a {expected} frame, received {received}")]
  TagMismatch {
    /// Tag the receiving collective was waiting for.
    expected: CollectiveTag,
    /// Tag actually carried by the frame.
    received: CollectiveTag,
  },
  /// A frame's payload was not of the type the receiver expected.
  #[error("{tag} frame carried a payload of an unexpected type")]
  TypeMismatch {
    /// Tag under which the mismatched payload arrived.
    tag: CollectiveTag,
  },
  /// A rank outside `0..size` was addressed.
  #[error("rank {peer} is outside the group of {size}")]
  PeerOutOfRange {
    /// The out-of-range rank.
    peer: usize,
    /// Size of the group.
    size: usize,
  },
  /// The coordinator-side argument of a rooted collective was missing.
  #[error("rooted {tag} called at the coordinator without a root value")]
  MissingRootValue {
    /// The rooted collective.
    tag: CollectiveTag,
  },
  /// A non-coordinator rank supplied the coordinator-side argument.
  #[error("rooted {tag} called at rank {rank} with a root value")]
  UnexpectedRootValue {
    /// The offending rank.
    rank: usize,
    /// The rooted collective.
    tag: CollectiveTag,
  },
  /// A scatter source had the wrong total length.
  #[error("scatter source holds {actual} element(s), expected {expected}")]
  ShapeMismatch {
    /// Length the chunk layout requires.
    expected: usize,
    /// Length actually supplied.
    actual: usize,
  },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_open_returns_payload() {
    let frame = Frame::new(CollectiveTag::Broadcast, 41i64);
    assert_eq!(frame.tag(), CollectiveTag::Broadcast);
    let value: i64 = frame.open(CollectiveTag::Broadcast).unwrap();
    assert_eq!(value, 41);
  }

  #[test]
  fn test_open_rejects_wrong_tag() {
    let frame = Frame::new(CollectiveTag::Scatter, vec![1.0f64]);
    let err = frame.open::<Vec<f64>>(CollectiveTag::Gather).unwrap_err();
    match err {
      ProtocolError::TagMismatch { expected, received } => {
        assert_eq!(expected, CollectiveTag::Gather);
        assert_eq!(received, CollectiveTag::Scatter);
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn test_open_rejects_wrong_payload_type() {
    let frame = Frame::new(CollectiveTag::Broadcast, "nine".to_string());
    let err = frame.open::<i64>(CollectiveTag::Broadcast).unwrap_err();
    assert!(matches!(
      err,
      ProtocolError::TypeMismatch {
        tag: CollectiveTag::Broadcast
      }
    ));
  }
}
