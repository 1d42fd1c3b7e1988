use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::{ReminderError, ReminderJob, ReminderStatus};

/// Keep job hashes around for a week after they were due.
const JOB_RETENTION_SECONDS: i64 = 604_800;

/// Durable store of pending reminders, indexed by due time and by appointment.
#[async_trait]
pub trait ReminderQueue: Send + Sync {
    async fn enqueue(&self, job: &ReminderJob) -> Result<(), ReminderError>;

    /// Atomically takes up to `limit` jobs due at `now` and marks them
    /// `Dispatching`. A job is handed to at most one caller.
    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ReminderJob>, ReminderError>;

    async fn update_status(
        &self,
        job_id: Uuid,
        status: ReminderStatus,
        error_message: Option<String>,
    ) -> Result<(), ReminderError>;

    /// Removes every still-scheduled job of an appointment. Returns how many were retracted.
    async fn retract_for_appointment(&self, appointment_id: Uuid) -> Result<usize, ReminderError>;

    async fn jobs_for_appointment(&self, appointment_id: Uuid) -> Result<Vec<ReminderJob>, ReminderError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<ReminderJob>, ReminderError>;
}

pub struct RedisReminderQueue {
    pool: Pool,
    key_prefix: String,
}

impl RedisReminderQueue {
    pub async fn new(config: &AppConfig) -> Result<Self, ReminderError> {
        let redis_url = config.redis_url.clone()
            .ok_or_else(|| ReminderError::QueueError("REDIS_URL is not configured".to_string()))?;
        Self::connect(&redis_url, "reminder").await
    }

    /// `key_prefix` namespaces every key this queue touches.
    pub async fn connect(redis_url: &str, key_prefix: &str) -> Result<Self, ReminderError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            ReminderError::QueueError(format!("Failed to create Redis pool: {}", e))
        })?;

        let mut conn = pool.get().await.map_err(|e| {
            ReminderError::QueueError(format!("Failed to connect to Redis: {}", e))
        })?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis reminder queue initialized (prefix '{}')", key_prefix);

        Ok(Self {
            pool,
            key_prefix: key_prefix.to_string(),
        })
    }

    async fn get_connection(&self) -> Result<Connection, ReminderError> {
        self.pool.get().await.map_err(|e| {
            ReminderError::QueueError(format!("Failed to get Redis connection: {}", e))
        })
    }

    fn job_key(&self, job_id: &str) -> String {
        format!("{}_job:{}", self.key_prefix, job_id)
    }

    fn schedule_key(&self) -> String {
        format!("{}_queue:scheduled", self.key_prefix)
    }

    fn appointment_key(&self, appointment_id: Uuid) -> String {
        format!("{}_appointment:{}", self.key_prefix, appointment_id)
    }

    async fn load_job(&self, conn: &mut Connection, job_id: &str) -> Result<Option<ReminderJob>, ReminderError> {
        let data: Option<String> = conn.hget(self.job_key(job_id), "data").await?;
        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn store_job(&self, conn: &mut Connection, job: &ReminderJob) -> Result<(), ReminderError> {
        let job_key = self.job_key(&job.job_id.to_string());
        let data = serde_json::to_string(job)?;
        let status = serde_json::to_string(&job.status)?;
        let _: () = conn.hset_multiple(&job_key, &[
            ("data", data.as_str()),
            ("status", status.as_str()),
        ]).await?;
        Ok(())
    }

    /// Moves a claimed or retracted job to `status`.
    async fn transition(
        &self,
        conn: &mut Connection,
        job_id: &str,
        status: ReminderStatus,
        error_message: Option<String>,
    ) -> Result<Option<ReminderJob>, ReminderError> {
        let Some(mut job) = self.load_job(conn, job_id).await? else {
            warn!("Reminder job {} vanished before it could be updated", job_id);
            return Ok(None);
        };

        if !job.status.can_transition_to(&status) {
            return Err(ReminderError::InvalidStatusTransition {
                from: format!("{:?}", job.status),
                to: format!("{:?}", status),
            });
        }

        job.status = status;
        job.updated_at = Utc::now();
        job.error_message = error_message;
        self.store_job(conn, &job).await?;
        Ok(Some(job))
    }
}

#[async_trait]
impl ReminderQueue for RedisReminderQueue {
    async fn enqueue(&self, job: &ReminderJob) -> Result<(), ReminderError> {
        let mut conn = self.get_connection().await?;

        let job_id = job.job_id.to_string();
        let job_key = self.job_key(&job_id);
        let ttl = (job.fire_at - Utc::now()).num_seconds().max(0) + JOB_RETENTION_SECONDS;

        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(&job_key, &[
                ("data", serde_json::to_string(job)?),
                ("status", serde_json::to_string(&job.status)?),
                ("appointment_id", job.appointment_id.to_string()),
            ])
            .ignore()
            .cmd("EXPIRE").arg(&job_key).arg(ttl).ignore()
            .zadd(self.schedule_key(), &job_id, job.fire_at.timestamp())
            .ignore()
            .sadd(self.appointment_key(job.appointment_id), &job_id)
            .ignore()
            .cmd("EXPIRE").arg(self.appointment_key(job.appointment_id)).arg(ttl).ignore()
            .query_async(&mut conn)
            .await?;

        debug!("Reminder job {} enqueued for {}", job.job_id, job.fire_at);
        Ok(())
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ReminderJob>, ReminderError> {
        let mut conn = self.get_connection().await?;

        let due_ids: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(self.schedule_key())
            .arg("-inf")
            .arg(now.timestamp())
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query_async(&mut conn)
            .await?;

        let mut claimed = Vec::with_capacity(due_ids.len());
        for job_id in due_ids {
            // ZREM succeeds for exactly one claimer
            let removed: i64 = conn.zrem(self.schedule_key(), &job_id).await?;
            if removed != 1 {
                continue;
            }

            if let Some(job) = self.transition(&mut conn, &job_id, ReminderStatus::Dispatching, None).await? {
                claimed.push(job);
            }
        }

        if !claimed.is_empty() {
            debug!("Claimed {} due reminder jobs", claimed.len());
        }
        Ok(claimed)
    }

    async fn update_status(
        &self,
        job_id: Uuid,
        status: ReminderStatus,
        error_message: Option<String>,
    ) -> Result<(), ReminderError> {
        let mut conn = self.get_connection().await?;
        match self.transition(&mut conn, &job_id.to_string(), status, error_message).await? {
            Some(_) => Ok(()),
            None => Err(ReminderError::JobNotFound(job_id.to_string())),
        }
    }

    async fn retract_for_appointment(&self, appointment_id: Uuid) -> Result<usize, ReminderError> {
        let mut conn = self.get_connection().await?;
        let appointment_key = self.appointment_key(appointment_id);

        let job_ids: Vec<String> = conn.smembers(&appointment_key).await?;
        let mut retracted = 0;
        for job_id in job_ids {
            let removed: i64 = conn.zrem(self.schedule_key(), &job_id).await?;
            if removed != 1 {
                // already claimed by a worker
                continue;
            }
            if self.transition(&mut conn, &job_id, ReminderStatus::Retracted, None).await?.is_some() {
                retracted += 1;
            }
        }

        if retracted > 0 {
            info!("Retracted {} reminder jobs for appointment {}", retracted, appointment_id);
        }
        Ok(retracted)
    }

    async fn jobs_for_appointment(&self, appointment_id: Uuid) -> Result<Vec<ReminderJob>, ReminderError> {
        let mut conn = self.get_connection().await?;
        let job_ids: Vec<String> = conn.smembers(self.appointment_key(appointment_id)).await?;

        let mut jobs = Vec::with_capacity(job_ids.len());
        for job_id in job_ids {
            if let Some(job) = self.load_job(&mut conn, &job_id).await? {
                jobs.push(job);
            }
        }
        jobs.sort_by_key(|job| job.fire_at);
        Ok(jobs)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<ReminderJob>, ReminderError> {
        let mut conn = self.get_connection().await?;
        self.load_job(&mut conn, &job_id.to_string()).await
    }
}
