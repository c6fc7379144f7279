mod api;
mod dispatcher;
mod error;

pub use self::{api::TimerEngine, error::EngineError};

pub mod prelude {
    pub use super::{EngineError, TimerEngine};
}
