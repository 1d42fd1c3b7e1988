use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Queue operation failed: {0}")]
    QueueError(String),

    #[error("Reminder job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid reminder status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Redis connection error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
