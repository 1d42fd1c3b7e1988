use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use reminder_cell::ReminderScheduler;
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(config: Arc<AppConfig>, reminders: Arc<ReminderScheduler>) -> Router {
    let state = Arc::new(AppointmentState::new(config.clone(), reminders));

    let protected_routes = Router::new()
        .route("/", get(handlers::get_appointments))
        .route("/book", post(handlers::book_appointment))
        .route("/available-slots", get(handlers::get_available_slots))
        .route("/cancel/{appointment_id}", delete(handlers::cancel_appointment))
        .route("/confirm/{appointment_id}", put(handlers::confirm_appointment))
        .route("/complete/{appointment_id}", post(handlers::complete_appointment))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
