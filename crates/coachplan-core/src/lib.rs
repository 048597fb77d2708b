pub mod completion;
pub mod engine;
pub mod error;
pub mod grouping;
pub mod plan;
pub mod store;
pub mod template;
pub mod week;

pub use engine::{EngineConfig, ScheduleEngine};
pub use error::{ScheduleError, ScheduleResult, ValidationError};
pub use week::WeekKey;
