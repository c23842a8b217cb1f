use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate report: this content has already been reported by the user")]
    DuplicateReport,

    #[error("Escalation failed for report {report_id}: {source}")]
    Escalation {
        report_id: i32,
        #[source]
        source: Box<AppError>,
    },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Coarse error classes reported to whoever sits above this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) | AppError::DuplicateReport => ErrorKind::Validation,
            AppError::NotFound => ErrorKind::NotFound,
            AppError::Database(_) | AppError::Internal(_) | AppError::Escalation { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Wrap a failure that happened after a report was already persisted.
    pub fn escalation(report_id: i32, source: AppError) -> Self {
        AppError::Escalation {
            report_id,
            source: Box::new(source),
        }
    }

    /// Map a unique-index violation on `reports` to the duplicate error,
    /// leaving every other database error untouched.
    pub fn from_insert(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::DuplicateReport,
            _ => AppError::Database(err),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
