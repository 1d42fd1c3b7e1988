use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One deferred reminder for one lead time of one appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderJob {
    pub job_id: Uuid,
    pub appointment_id: Uuid,
    pub lead_minutes: i64,
    pub fire_at: DateTime<Utc>,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub status: ReminderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Scheduled,
    Dispatching,
    Dispatched,
    Failed,
    Retracted,
}

impl ReminderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReminderStatus::Dispatched | ReminderStatus::Failed | ReminderStatus::Retracted)
    }

    pub fn can_transition_to(&self, target: &ReminderStatus) -> bool {
        use ReminderStatus::*;
        matches!(
            (self, target),
            (Scheduled, Dispatching)
                | (Scheduled, Retracted)
                | (Dispatching, Dispatched)
                | (Dispatching, Failed)
        )
    }
}

/// What the booking side hands over once an appointment exists.
#[derive(Debug, Clone)]
pub struct ReminderRequest {
    pub appointment_id: Uuid,
    /// Clinic-local wall-clock time of the appointment.
    pub appointment_datetime: NaiveDateTime,
    pub recipient: String,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub batch_size: usize,
    pub poll_interval_seconds: u64,
    pub dispatch_timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("reminder-worker-{}", Uuid::new_v4()),
            batch_size: 50,
            poll_interval_seconds: 30,
            dispatch_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub claimed: usize,
    pub dispatched: usize,
    pub failed: usize,
}
