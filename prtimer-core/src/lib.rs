//! # prtimer-core
//!
//! Building blocks for the pausable timer engine.
//!
//! ### Key Submodules:
//! - `command`: timer ids, id allocation and the command records
//! - `queue`: bounded multi-producer command queue with non-blocking submission
//! - `platform`: the one-shot timer primitive (tokio-backed and manual)
//! - `time`: nanosecond deadline arithmetic and a virtual clock

pub mod command;
pub mod error;
pub mod platform;
pub mod queue;
pub mod time;

pub mod prelude {
    pub use crate::command::*;
    pub use crate::error::*;
    pub use crate::platform::*;
    pub use crate::queue::*;
}

pub use error::QueueError;
