//! Error types for queueing and delivery.

/// Returned by [`CommandQueue`](crate::CommandQueue) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Enqueue rejected under the `reject` overflow policy.
    #[error("queue full: {depth} commands queued (max {max_depth})")]
    Full { depth: usize, max_depth: usize },

    /// Pop on an empty queue.
    #[error("queue empty")]
    Empty,
}

/// Returned by a [`Sender`](crate::Sender) when a command could not be written.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("connection is down")]
    Disconnected,
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("command rejected: {0}")]
    Rejected(String),
}
