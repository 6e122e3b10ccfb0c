//! Internal coordinator errors.
//!
//! `ErrorCode` (from `core-protocol`) is the client-visible, wire-encoded
//! error surface. `CoordinatorError` adds the purely internal failure mode —
//! a peer rank's channel closed — which never reaches the client; it
//! terminates the coordinator's own run loop instead. Unknown-tag and
//! protocol-desync conditions are programming errors, not recoverable ones,
//! and a dead transport link is treated the same way.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("link to rank {rank} closed unexpectedly")]
    LinkClosed { rank: usize },
}
