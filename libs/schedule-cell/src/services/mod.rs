pub mod availability;
pub mod settings;

pub use availability::AvailabilityService;
pub use settings::ScheduleSettingsService;
