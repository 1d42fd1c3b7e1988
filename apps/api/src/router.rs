use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use reminder_cell::ReminderScheduler;
use schedule_cell::router::{availability_routes, schedule_routes};
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>, reminders: Arc<ReminderScheduler>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduler API is running!" }))
        .nest("/appointments", appointment_routes(state.clone(), reminders))
        .nest("/availability", availability_routes(state.clone()))
        .nest("/schedule", schedule_routes(state))
}
