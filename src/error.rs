use thiserror::Error;

/// Reasons a queue operation refused to run.
///
/// Every variant leaves the queue exactly as it was before the call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is empty")]
    Empty,

    /// Removal refuses to discard the head without somewhere to copy it.
    #[error("no output buffer supplied")]
    MissingBuffer,

    #[error("output buffer has no room for the terminator")]
    ZeroCapacity,

    /// The element count would overflow `u32`.
    #[error("queue is full")]
    Full,

    #[error("allocation of {size} bytes failed")]
    AllocFailed { size: usize },
}

pub type Result<T> = std::result::Result<T, QueueError>;
