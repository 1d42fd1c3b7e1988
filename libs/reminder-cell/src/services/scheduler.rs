use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::datetime::clinic_local_to_utc;

use crate::services::queue::ReminderQueue;
use crate::{ReminderError, ReminderJob, ReminderRequest, ReminderStatus};

pub struct ReminderScheduler {
    queue: Arc<dyn ReminderQueue>,
    lead_minutes: Vec<i64>,
    clinic_offset: FixedOffset,
    clinic_name: String,
}

impl ReminderScheduler {
    pub fn new(config: &AppConfig, queue: Arc<dyn ReminderQueue>) -> Self {
        Self {
            queue,
            lead_minutes: config.reminder_lead_minutes.clone(),
            clinic_offset: config.clinic_utc_offset,
            clinic_name: config.clinic_name.clone(),
        }
    }

    pub fn queue(&self) -> Arc<dyn ReminderQueue> {
        self.queue.clone()
    }

    /// One job per lead time whose fire time is still ahead of `now`.
    pub fn plan_reminders(&self, request: &ReminderRequest, now: DateTime<Utc>) -> Vec<ReminderJob> {
        let appointment_at = clinic_local_to_utc(&request.appointment_datetime, &self.clinic_offset);
        let body = reminder_body(&self.clinic_name, &request.appointment_datetime);

        self.lead_minutes
            .iter()
            .filter_map(|&lead| {
                let fire_at = appointment_at - Duration::minutes(lead);
                if fire_at <= now {
                    debug!(
                        "Skipping {}-minute reminder for appointment {}: {} already passed",
                        lead, request.appointment_id, fire_at
                    );
                    return None;
                }

                Some(ReminderJob {
                    job_id: Uuid::new_v4(),
                    appointment_id: request.appointment_id,
                    lead_minutes: lead,
                    fire_at,
                    recipient: request.recipient.clone(),
                    subject: reminder_subject(lead),
                    body: body.clone(),
                    status: ReminderStatus::Scheduled,
                    created_at: now,
                    updated_at: now,
                    error_message: None,
                })
            })
            .collect()
    }

    pub async fn schedule_for(&self, request: &ReminderRequest) -> Result<Vec<ReminderJob>, ReminderError> {
        self.schedule_at(request, Utc::now()).await
    }

    pub async fn schedule_at(
        &self,
        request: &ReminderRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReminderJob>, ReminderError> {
        let jobs = self.plan_reminders(request, now);
        for job in &jobs {
            self.queue.enqueue(job).await?;
        }

        info!(
            "Armed {} reminders for appointment {} ({} lead times configured)",
            jobs.len(),
            request.appointment_id,
            self.lead_minutes.len()
        );
        Ok(jobs)
    }

    pub async fn retract_for(&self, appointment_id: Uuid) -> Result<usize, ReminderError> {
        self.queue.retract_for_appointment(appointment_id).await
    }
}

/// `Appointment Reminder - 12 Hours Notice`, `... - 2.5 Hours Notice`.
pub fn reminder_subject(lead_minutes: i64) -> String {
    let notice = if lead_minutes % 30 == 0 {
        let hours = lead_minutes as f64 / 60.0;
        format!("{} Hour{}", hours, if hours > 1.0 { "s" } else { "" })
    } else {
        format!("{} Minute{}", lead_minutes, if lead_minutes > 1 { "s" } else { "" })
    };
    format!("Appointment Reminder - {} Notice", notice)
}

pub fn reminder_body(clinic_name: &str, appointment_datetime: &NaiveDateTime) -> String {
    format!(
        "Hi,\n\nThis is a reminder for your appointment scheduled at {} on {} at {}.\n\nSee you soon!",
        clinic_name,
        appointment_datetime.format("%A, %B %-d, %Y"),
        appointment_datetime.format("%-I:%M %p")
    )
}
