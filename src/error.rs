//! ColoringError: unified error type for mesh-coloring public APIs.
//!
//! Communication and partitioner failures are surfaced as errors so that
//! callers can abort with a diagnostic; they are never recoverable (the
//! coloring pass is one-shot). Programming errors such as out-of-range
//! lookups are asserted, not returned.

use thiserror::Error;

/// Unified error type for mesh-coloring operations.
#[derive(Debug, Error)]
pub enum ColoringError {
    /// A transport-level send/receive with a peer failed.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    SerializationError(#[from] bincode::Error),
    /// The external k-way partitioner returned a non-success status.
    #[error("k-way partitioner failed with status {status}")]
    PartitionerFailure { status: i32 },
    /// A vertex or cell key was expected in the local connectivity maps.
    #[error("missing connectivity for global id {0}")]
    MissingConnectivity(usize),
}

impl ColoringError {
    /// Wrap a transport failure for `neighbor` with a text diagnostic.
    pub fn comm(neighbor: usize, msg: impl Into<String>) -> Self {
        ColoringError::CommError {
            neighbor,
            source: msg.into().into(),
        }
    }
}
