//! Wire types shared by the client, coordinator, and worker roles.
//!
//! Every message a rank can send to another rank is represented here as a
//! plain Rust enum rather than the tagged-tuple encoding a dynamically typed
//! messaging layer would use. `serde` derives are kept on every type so a
//! real inter-process transport (out of scope for this crate) can encode
//! these onto the wire with `serde_json` or any other `Serialize` backend
//! without needing a second representation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies a single allocated block. Assigned by the coordinator,
/// monotonically increasing, never reused.
pub type BlockId = u64;

/// A client-level slice over one block: the positions
/// `start, start + step, start + 2*step, ...` strictly below `stop`.
///
/// `stop = -1` is a sentinel meaning "until the end of the block", resolved
/// by the coordinator's conformance check before splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceDescriptor {
    pub key: BlockId,
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl SliceDescriptor {
    pub fn new(key: BlockId, start: i64, stop: i64, step: i64) -> Self {
        Self {
            key,
            start,
            stop,
            step,
        }
    }

    /// Sentinel value for "until end of block".
    pub const UNBOUNDED_STOP: i64 = -1;

    /// Number of positions this descriptor visits, given a resolved `stop`
    /// (i.e. after `UNBOUNDED_STOP` has been replaced by the block's size).
    ///
    /// Panics if `step <= 0`; callers are expected to validate descriptors
    /// before computing cardinality.
    pub fn cardinality(&self) -> u64 {
        debug_assert!(self.step >= 1, "step must be >= 1");
        if self.stop <= self.start {
            return 0;
        }
        let span = (self.stop - self.start) as u64;
        span.div_ceil(self.step as u64)
    }

    pub fn is_resolved(&self) -> bool {
        self.stop != Self::UNBOUNDED_STOP
    }
}

/// The value written by a write request: either a single scalar broadcast
/// across the whole slice, or an explicit sequence that must match the
/// slice's cardinality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteValue {
    Scalar(i64),
    Sequence(Vec<i64>),
}

impl WriteValue {
    /// Expand into a concrete sequence of the given length. Errors if a
    /// `Sequence` variant's length does not match `expected_len`.
    pub fn expand(&self, expected_len: u64) -> Result<Vec<i64>, ErrorCode> {
        match self {
            WriteValue::Scalar(v) => Ok(vec![*v; expected_len as usize]),
            WriteValue::Sequence(values) => {
                if values.len() as u64 != expected_len {
                    Err(ErrorCode::SizeMismatch)
                } else {
                    Ok(values.clone())
                }
            }
        }
    }
}

/// The three client-visible error kinds, carrying their documented negative
/// wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ErrorCode {
    #[error("out of memory / request too large")]
    OutOfMemory,
    #[error("unknown block id")]
    UnknownKey,
    #[error("value size does not match slice cardinality")]
    SizeMismatch,
}

impl ErrorCode {
    pub fn wire_code(self) -> i64 {
        match self {
            ErrorCode::OutOfMemory => -1,
            ErrorCode::UnknownKey => -2,
            ErrorCode::SizeMismatch => -3,
        }
    }
}

/// A request sent from the client to the coordinator (rank 0 -> rank 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientRequest {
    Allocate { size: u64 },
    Read { descriptors: Vec<SliceDescriptor> },
    Write { descriptors: Vec<SliceDescriptor>, value: WriteValue },
    Delete { descriptors: Vec<SliceDescriptor> },
    Close,
}

/// The coordinator's reply to a `ClientRequest` (rank 1 -> rank 0).
///
/// Each variant echoes the tag of the request it answers: a client that gets
/// back the wrong variant knows the session is desynchronized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientResponse {
    Allocate(Result<BlockId, ErrorCode>),
    Read(Result<Vec<Vec<i64>>, ErrorCode>),
    Write(Result<(), ErrorCode>),
    Delete(Result<(), ErrorCode>),
}

/// A single worker-subrequest: a descriptor rewritten into one worker's
/// local coordinate system, produced by the coordinator's split algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSubrequest {
    pub rank: usize,
    pub key: BlockId,
    pub local_start: i64,
    pub local_stop: i64,
    pub step: i64,
}

impl WorkerSubrequest {
    pub fn cardinality(&self) -> u64 {
        if self.local_stop <= self.local_start {
            return 0;
        }
        ((self.local_stop - self.local_start) as u64).div_ceil(self.step as u64)
    }
}

/// A directive sent from the coordinator to a worker (rank 1 -> rank r).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoordinatorMessage {
    Allocate {
        key: BlockId,
        length: u64,
    },
    Read {
        key: BlockId,
        start: i64,
        stop: i64,
        step: i64,
    },
    Write {
        key: BlockId,
        start: i64,
        stop: i64,
        step: i64,
        values: Vec<i64>,
    },
    Delete {
        key: BlockId,
    },
    Close,
}

/// The only message a worker ever originates: the reply to a `Read`
/// directive (rank r -> rank 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReadResult {
    pub key: BlockId,
    pub values: Vec<i64>,
}
