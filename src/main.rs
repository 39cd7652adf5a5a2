use std::sync::Arc;

use castellet_api::config::{Config, StoreConfig};
use castellet_api::store::{SqliteStore, Store, SupabaseStore};
use castellet_api::{router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initial counter value when the SQLite backend provisions its counter row
const SQLITE_INITIAL_COUNTER: i64 = 0;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting api server...");

    let config = Config::from_env().expect("Invalid configuration");

    let store: Arc<dyn Store> = match &config.store {
        StoreConfig::Supabase { url, service_key } => {
            tracing::info!("Using Supabase store at {}", url);
            let store = SupabaseStore::new(url, service_key.clone())
                .expect("Failed to build Supabase client");
            Arc::new(store)
        }
        StoreConfig::Sqlite { database_url } => {
            let store = SqliteStore::connect(database_url)
                .await
                .expect("Failed to connect to database");
            store
                .init_schema(SQLITE_INITIAL_COUNTER)
                .await
                .expect("Failed to initialise database schema");
            tracing::info!("Database connection established.");
            Arc::new(store)
        }
    };

    let app = router(AppState::new(store, config.max_alloc_attempts));

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Servidor escoltant al port {}", addr.port());

    axum::serve(listener, app)
        .await
        .expect("Failed to start server.");
}
