use std::sync::Arc;

use axum::{
    routing::{delete, get, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::allocator::GameCodeAllocator;
use crate::store::Store;

pub mod games;
pub mod health;
pub mod players;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub allocator: GameCodeAllocator,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, max_alloc_attempts: u32) -> Self {
        let allocator = GameCodeAllocator::new(store.clone(), max_alloc_attempts);
        Self { store, allocator }
    }
}

pub fn router(state: AppState) -> Router {
    // Browsers call the API from any origin, including local files
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Root and health
        .route("/", get(health::root))
        .route("/health", get(health::health_check))

        // Game codes
        .route("/novapartida", get(games::new_game))

        // Player endpoints
        .route("/jugadors", get(players::list_players).post(players::create_player))
        .route("/jugadors/antics", delete(players::delete_old_players))
        .route("/jugadors/{id_grup}", put(players::update_player))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
