use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The dispatcher has shut down and dropped its receiver.
    #[error("Command queue closed")]
    Closed,
}
