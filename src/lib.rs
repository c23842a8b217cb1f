pub mod config;
pub mod error;
pub mod migration;
pub mod models;
pub mod pagination;
pub mod services;

pub use error::{AppError, AppResult, ErrorKind};
pub use services::moderation::{FiledReport, ModerationService};
