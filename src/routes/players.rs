use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::Json,
};

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::models::{
    format_timestamp, DeleteOldPlayers, MessageResponse, NewPlayer, OldPlayersDeletedResponse,
    PlayerCreatedResponse, PlayerRecord, PlayerUpdate,
};
use crate::routes::AppState;

// GET /jugadors - List every player record
pub async fn list_players(
    State(state): State<AppState>,
) -> Result<Json<Vec<PlayerRecord>>, ApiError> {
    let players = state.store.list_players().await?;

    Ok(Json(players))
}

// POST /jugadors - Add a player (group) to a game
pub async fn create_player(
    State(state): State<AppState>,
    ApiJson(player): ApiJson<NewPlayer>,
) -> Result<(StatusCode, Json<PlayerCreatedResponse>), ApiError> {
    let player = player.validate()?;
    let record = state.store.insert_player(&player).await?;

    tracing::info!(
        "Inserted player {} ({}) in game {}",
        record.id_grup, player.nom_grup, player.numero_partida
    );

    Ok((
        StatusCode::CREATED,
        Json(PlayerCreatedResponse {
            message: "Jugador afegit correctament!".to_string(),
            id_grup: record.id_grup,
            numero_partida: record.numero_partida.unwrap_or(player.numero_partida),
            nom_grup: record.nom_grup.unwrap_or(player.nom_grup),
        }),
    ))
}

// PUT /jugadors/:idGrup - Update some fields of one player
pub async fn update_player(
    State(state): State<AppState>,
    ApiPath(id_grup): ApiPath<i64>,
    ApiJson(update): ApiJson<PlayerUpdate>,
) -> Result<Json<MessageResponse>, ApiError> {
    let update = update.validate()?;
    let updated = state.store.update_player(id_grup, &update).await?;

    if updated == 0 {
        return Err(ApiError::NotFound(format!(
            "No existeix cap jugador amb idGrup {id_grup}"
        )));
    }

    Ok(Json(MessageResponse::new("Jugador actualitzat correctament!")))
}

// DELETE /jugadors/antics - Remove players from games before a date
//
// The body is optional, so it is read raw rather than through the JSON
// extractor, which insists on a content type.
pub async fn delete_old_players(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<OldPlayersDeletedResponse>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        DeleteOldPlayers::default()
    } else {
        serde_json::from_slice::<Option<DeleteOldPlayers>>(&body)
            .map_err(|e| ApiError::validation(e.to_string()))?
            .unwrap_or_default()
    };

    let (data_limit, cutoff) = request.cutoff(chrono::Utc::now().date_naive())?;
    let eliminats = state.store.delete_players_before(cutoff).await?;

    tracing::info!("Deleted {} players dated before {}", eliminats, format_timestamp(cutoff));

    Ok(Json(OldPlayersDeletedResponse {
        message: "Jugadors antics eliminats correctament.".to_string(),
        data_limit,
        eliminats,
    }))
}
