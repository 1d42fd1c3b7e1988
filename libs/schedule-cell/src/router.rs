use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/blocked/days", get(handlers::get_blocked_days))
        .route("/block/day", post(handlers::block_day))
        .route("/unblock/day", delete(handlers::unblock_day))
        .route("/blocked/slots", get(handlers::get_blocked_slots))
        .route("/block/slot", post(handlers::block_slot))
        .route("/unblock/slot", delete(handlers::unblock_slot))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

pub fn schedule_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/settings", get(handlers::get_schedule_settings).put(handlers::update_schedule_settings))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
