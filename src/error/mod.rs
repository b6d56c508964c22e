mod app;
mod client;
mod validation;

pub use app::{AppError, AppResult};
pub use client::{ClientError, HistoryError};
pub use validation::ValidationError;
