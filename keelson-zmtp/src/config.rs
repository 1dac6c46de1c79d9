//! ZMTP engine sizing
//!
//! Batch sizes are per-socket options; the constants here are their
//! defaults plus engine internals that are not worth exposing.

use keelson_core::options::DEFAULT_BATCH_SIZE;

/// Default input batch (8KB)
///
/// Bytes read per readiness event. Bodies at least this large are read
/// straight into the message instead of the staging buffer.
pub const IN_BATCH_SIZE: usize = DEFAULT_BATCH_SIZE;

/// Default output batch (8KB)
///
/// Encoded bytes gathered before a write.
pub const OUT_BATCH_SIZE: usize = DEFAULT_BATCH_SIZE;

/// Encoded chunks up to this size are copied into one contiguous buffer
/// instead of being queued as separate slices.
pub const COALESCE_THRESHOLD: usize = 256;

/// Upper bound on slices handed to one vectored write.
pub const MAX_IOVECS: usize = 16;
