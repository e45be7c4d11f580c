//! REST API endpoint modules.

pub mod configs;
pub mod history;
pub mod merge;
pub mod status;

pub use status::AppError;
