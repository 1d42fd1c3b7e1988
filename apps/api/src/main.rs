use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use reminder_cell::{
    notifier_from_config, InMemoryReminderQueue, RedisReminderQueue, ReminderQueue,
    ReminderScheduler, ReminderWorkerService, WorkerConfig,
};
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduler API server");

    // Load configuration
    let config = AppConfig::from_env();
    if !config.is_configured() {
        warn!("Configuration is incomplete, requests touching storage will fail");
    }

    // Reminder queue: Redis when configured, process memory otherwise
    let queue: Arc<dyn ReminderQueue> = match config.redis_url {
        Some(_) => Arc::new(RedisReminderQueue::new(&config).await?),
        None => {
            warn!("REDIS_URL not set, reminders are kept in memory and lost on restart");
            Arc::new(InMemoryReminderQueue::new())
        }
    };
    let reminders = Arc::new(ReminderScheduler::new(&config, queue.clone()));

    let worker = Arc::new(ReminderWorkerService::new(
        WorkerConfig {
            poll_interval_seconds: config.reminder_poll_seconds,
            ..WorkerConfig::default()
        },
        queue,
        notifier_from_config(&config),
    ));
    let worker_handle = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.start().await })
    };

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Create shared state
    let port = config.app_port;
    let state = Arc::new(config);

    // Build the application router
    let app = router::create_router(state, reminders)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    worker.shutdown().await;
    worker_handle.await?;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
