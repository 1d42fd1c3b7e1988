use thiserror::Error;

use schedule_cell::{PolicyViolation, ScheduleError};
use shared_models::error::AppError;

use crate::models::AppointmentStatus;

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("{0}")]
    InvalidInput(String),

    /// Closed day or outside working hours.
    #[error("Booking unavailable: {0}")]
    OutsidePolicy(PolicyViolation),

    #[error("Booking unavailable: The doctor is unavailable on this date.")]
    DayUnavailable,

    #[error("Booking unavailable: This specific time slot is blocked.")]
    SlotBlocked,

    #[error("Booking unavailable: This time slot is already booked.")]
    SlotTaken,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Appointment is {from} and cannot become {to}.")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<PolicyViolation> for AppointmentError {
    fn from(violation: PolicyViolation) -> Self {
        AppointmentError::OutsidePolicy(violation)
    }
}

impl From<ScheduleError> for AppointmentError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Storage(e) => AppointmentError::Storage(e),
            ScheduleError::InvalidSlot(violation) => AppointmentError::OutsidePolicy(violation),
            ScheduleError::InvalidInput(msg) => AppointmentError::InvalidInput(msg),
            other => AppointmentError::Storage(anyhow::anyhow!(other.to_string())),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::InvalidInput(msg) => AppError::BadRequest(msg),
            AppointmentError::OutsidePolicy(_)
            | AppointmentError::DayUnavailable
            | AppointmentError::SlotBlocked
            | AppointmentError::SlotTaken => AppError::BadRequest(err.to_string()),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::NotFound(msg) => AppError::NotFound(msg),
            AppointmentError::InvalidStatusTransition { .. } => AppError::Conflict(err.to_string()),
            AppointmentError::Storage(e) => {
                tracing::error!("Appointment storage failure: {:#}", e);
                AppError::Internal("An error occurred while processing the appointment.".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::{NaiveTime, Weekday};

    #[test]
    fn test_booking_rejections_are_bad_requests() {
        let closed: AppError = AppointmentError::OutsidePolicy(PolicyViolation::ClosedDay(Weekday::Sun)).into();
        assert_eq!(closed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(closed.message(), "Booking unavailable: Clinic is closed on Sundays.");

        let hours: AppError = AppointmentError::OutsidePolicy(PolicyViolation::OutsideHours {
            start: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
        })
        .into();
        assert_eq!(hours.message(), "Booking unavailable: Clinic hours are 11:00 AM to 7:00 PM.");

        let taken: AppError = AppointmentError::SlotTaken.into();
        assert_eq!(taken.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(taken.message(), "Booking unavailable: This time slot is already booked.");
    }

    #[test]
    fn test_transition_is_conflict() {
        let err: AppError = AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Confirmed,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.message(), "Appointment is completed and cannot become confirmed.");
    }

    #[test]
    fn test_storage_detail_is_hidden() {
        let err: AppError = AppointmentError::Storage(anyhow::anyhow!("connection refused")).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message().contains("connection refused"));
    }
}
