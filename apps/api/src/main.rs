use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{LoggingNotifier, NotificationDispatcher};
use shared_config::{AppConfig, StoreBackend};
use shared_database::{InMemoryStore, SchedulingStore, SeedData, SupabaseStore};
use shared_database::supabase::SupabaseClient;

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn SchedulingStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            let store = match &config.seed_file {
                Some(path) => {
                    let seed = SeedData::from_json_file(path)
                        .with_context(|| format!("loading seed file {}", path))?;
                    info!(
                        "Seeding in-memory store with {} doctors and {} schedules",
                        seed.doctors.len(),
                        seed.schedules.len()
                    );
                    InMemoryStore::from_seed(seed).await.context("applying seed data")?
                }
                None => InMemoryStore::new(),
            };
            Ok(Arc::new(store))
        }
        StoreBackend::Supabase => {
            info!("Using Supabase store at {}", config.supabase_url);
            let client = Arc::new(SupabaseClient::new(config));
            Ok(Arc::new(SupabaseStore::new(client)))
        }
    }
}

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

    info!("Starting MediSlot scheduling API");

    let config = Arc::new(AppConfig::from_env());
    let store = build_store(&config).await?;

    // Delivery runs on its own task; bookings never wait on it
    let notifications = NotificationDispatcher::spawn(
        Arc::new(LoggingNotifier),
        config.notification_queue_capacity,
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(config.clone(), store, notifications)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
