//! Command queue parameters.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// How a public engine call places its command on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    /// Enqueue on the caller's thread; a full queue spills into a FIFO
    /// overflow lane so commands from one caller keep their order.
    #[default]
    Ordered,
    /// Hand every command to its own spawned task. Commands from a single
    /// caller may reach the dispatcher in any order.
    Detached,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct QueueConfig {
    /// Bounded capacity of the command queue.
    #[serde(default = "default_capacity")]
    #[validate(range(min = 16, max = 1048576))]
    pub capacity: usize,

    #[serde(default)]
    pub submission: SubmissionMode,
}

fn default_capacity() -> usize {
    1024
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            submission: SubmissionMode::default(),
        }
    }
}
