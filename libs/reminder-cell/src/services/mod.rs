pub mod memory;
pub mod notifier;
pub mod queue;
pub mod scheduler;
pub mod worker;

pub use memory::InMemoryReminderQueue;
pub use notifier::{notifier_from_config, HttpEmailNotifier, LogNotifier, Notifier};
pub use queue::{RedisReminderQueue, ReminderQueue};
pub use scheduler::ReminderScheduler;
pub use worker::ReminderWorkerService;
