use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::services::queue::ReminderQueue;
use crate::{ReminderError, ReminderJob, ReminderStatus};

/// Process-local queue. Jobs are lost on restart, and a job leaves the map as soon
/// as it reaches a terminal status.
#[derive(Default)]
pub struct InMemoryReminderQueue {
    jobs: RwLock<HashMap<Uuid, ReminderJob>>,
}

impl InMemoryReminderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

fn apply_transition(
    job: &mut ReminderJob,
    status: ReminderStatus,
    error_message: Option<String>,
) -> Result<(), ReminderError> {
    if !job.status.can_transition_to(&status) {
        return Err(ReminderError::InvalidStatusTransition {
            from: format!("{:?}", job.status),
            to: format!("{:?}", status),
        });
    }
    job.status = status;
    job.updated_at = Utc::now();
    job.error_message = error_message;
    Ok(())
}

#[async_trait]
impl ReminderQueue for InMemoryReminderQueue {
    async fn enqueue(&self, job: &ReminderJob) -> Result<(), ReminderError> {
        self.jobs.write().await.insert(job.job_id, job.clone());
        Ok(())
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ReminderJob>, ReminderError> {
        let mut jobs = self.jobs.write().await;

        let mut due: Vec<&mut ReminderJob> = jobs
            .values_mut()
            .filter(|job| job.status == ReminderStatus::Scheduled && job.fire_at <= now)
            .collect();
        due.sort_by_key(|job| job.fire_at);

        let mut claimed = Vec::new();
        for job in due.into_iter().take(limit) {
            apply_transition(job, ReminderStatus::Dispatching, None)?;
            claimed.push(job.clone());
        }
        Ok(claimed)
    }

    async fn update_status(
        &self,
        job_id: Uuid,
        status: ReminderStatus,
        error_message: Option<String>,
    ) -> Result<(), ReminderError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| ReminderError::JobNotFound(job_id.to_string()))?;
        apply_transition(job, status, error_message)?;

        if status.is_terminal() {
            jobs.remove(&job_id);
        }
        Ok(())
    }

    async fn retract_for_appointment(&self, appointment_id: Uuid) -> Result<usize, ReminderError> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !(job.appointment_id == appointment_id && job.status == ReminderStatus::Scheduled));
        Ok(before - jobs.len())
    }

    async fn jobs_for_appointment(&self, appointment_id: Uuid) -> Result<Vec<ReminderJob>, ReminderError> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<ReminderJob> = jobs
            .values()
            .filter(|job| job.appointment_id == appointment_id)
            .cloned()
            .collect();
        matching.sort_by_key(|job| job.fire_at);
        Ok(matching)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<ReminderJob>, ReminderError> {
        Ok(self.jobs.read().await.get(&job_id).cloned())
    }
}
