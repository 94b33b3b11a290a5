pub mod build_info;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod progress;
pub mod rollover;
pub mod store;
pub mod tracker;
pub mod workspace;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, TickError};
pub use model::{Priority, TaskRecord};
pub use tracker::Tracker;
