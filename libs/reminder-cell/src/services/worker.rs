use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, RwLock};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, instrument, warn};

use crate::services::notifier::Notifier;
use crate::services::queue::ReminderQueue;
use crate::{DispatchSummary, ReminderError, ReminderJob, ReminderStatus, WorkerConfig};

pub struct ReminderWorkerService {
    config: WorkerConfig,
    queue: Arc<dyn ReminderQueue>,
    notifier: Arc<dyn Notifier>,
    is_shutdown: RwLock<bool>,
    shutdown_signal: Notify,
}

impl ReminderWorkerService {
    pub fn new(config: WorkerConfig, queue: Arc<dyn ReminderQueue>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config,
            queue,
            notifier,
            is_shutdown: RwLock::new(false),
            shutdown_signal: Notify::new(),
        }
    }

    /// Polls for due reminders until `shutdown` is called.
    #[instrument(skip(self), fields(worker_id = %self.config.worker_id))]
    pub async fn start(&self) {
        info!("Starting reminder worker, polling every {}s", self.config.poll_interval_seconds);
        let poll_interval = Duration::from_secs(self.config.poll_interval_seconds);

        loop {
            if *self.is_shutdown.read().await {
                debug!("Reminder worker received shutdown signal");
                break;
            }

            match self.run_once(Utc::now()).await {
                Ok(summary) if summary.claimed > 0 => {
                    info!(
                        "Reminder batch done: {} claimed, {} sent, {} failed",
                        summary.claimed, summary.dispatched, summary.failed
                    );
                }
                Ok(_) => {}
                Err(e) => error!("Reminder worker failed to claim due jobs: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = self.shutdown_signal.notified() => {
                    debug!("Reminder worker woken for shutdown");
                }
            }
        }

        info!("Reminder worker stopped");
    }

    pub async fn shutdown(&self) {
        let mut is_shutdown = self.is_shutdown.write().await;
        *is_shutdown = true;
        // Stores a permit if the loop is not waiting yet
        self.shutdown_signal.notify_one();
    }

    /// Claims everything due at `now` and dispatches each job in its own task.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<DispatchSummary, ReminderError> {
        let jobs = self.queue.claim_due(now, self.config.batch_size).await?;
        let mut summary = DispatchSummary {
            claimed: jobs.len(),
            ..Default::default()
        };

        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let queue = self.queue.clone();
                let notifier = self.notifier.clone();
                let send_timeout = Duration::from_secs(self.config.dispatch_timeout_seconds);
                tokio::spawn(async move { dispatch_job(queue, notifier, job, send_timeout).await })
            })
            .collect();

        for outcome in futures::future::join_all(handles).await {
            match outcome {
                Ok(true) => summary.dispatched += 1,
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    error!("Reminder dispatch task panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}

#[instrument(skip(queue, notifier, job), fields(job_id = %job.job_id, appointment_id = %job.appointment_id))]
async fn dispatch_job(
    queue: Arc<dyn ReminderQueue>,
    notifier: Arc<dyn Notifier>,
    job: ReminderJob,
    send_timeout: Duration,
) -> bool {
    let outcome = match timeout(send_timeout, notifier.send(&job.recipient, &job.subject, &job.body)).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err(format!("notifier timed out after {}s", send_timeout.as_secs())),
    };

    let (status, error_message, sent) = match outcome {
        Ok(()) => {
            info!("Sent {}-minute reminder to {}", job.lead_minutes, job.recipient);
            (ReminderStatus::Dispatched, None, true)
        }
        Err(reason) => {
            error!("Failed to send {}-minute reminder to {}: {}", job.lead_minutes, job.recipient, reason);
            (ReminderStatus::Failed, Some(reason), false)
        }
    };

    if let Err(e) = queue.update_status(job.job_id, status, error_message).await {
        warn!("Could not record reminder outcome: {}", e);
    }
    sent
}
