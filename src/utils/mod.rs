//! Utility modules

pub mod error;
pub mod task;

pub use error::{AppError, AppResult, ErrorResponse};
pub use task::{join_thread, ScheduledTask};
