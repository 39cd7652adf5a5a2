use axum::{extract::State, response::Json};

use crate::error::ApiError;
use crate::models::NewGameResponse;
use crate::routes::AppState;

// GET /novapartida - Reserve the next game code
pub async fn new_game(
    State(state): State<AppState>,
) -> Result<Json<NewGameResponse>, ApiError> {
    let codi_partida = state.allocator.allocate_next_code().await?;

    tracing::info!("Allocated game code {}", codi_partida);
    Ok(Json(NewGameResponse { codi_partida }))
}
