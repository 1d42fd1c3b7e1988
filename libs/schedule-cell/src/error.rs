use thiserror::Error;

use shared_models::error::AppError;

use crate::policy::PolicyViolation;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Cannot block this slot: {0}")]
    InvalidSlot(PolicyViolation),

    #[error("{0}")]
    DuplicateBlock(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::InvalidInput(msg) => AppError::BadRequest(msg),
            ScheduleError::InvalidSlot(_) => AppError::BadRequest(err.to_string()),
            ScheduleError::DuplicateBlock(msg) => AppError::Conflict(msg),
            ScheduleError::NotFound(msg) => AppError::NotFound(msg),
            ScheduleError::Storage(e) => {
                tracing::error!("Schedule storage failure: {:#}", e);
                AppError::Internal("Database error.".to_string())
            }
        }
    }
}
