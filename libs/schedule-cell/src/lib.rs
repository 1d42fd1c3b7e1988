pub mod error;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod router;
pub mod services;

pub use error::ScheduleError;
pub use models::*;
pub use policy::{PolicyViolation, SlotPolicy};
pub use services::*;
