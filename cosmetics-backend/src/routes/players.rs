use crate::AppState;
use crate::error::AppError;
use crate::validation;

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use axum_macros::debug_handler;
use cosmetics_db::{PlayerWithCosmetics, StoreErrorKind};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Public JSON shape of a player
#[derive(Debug, Serialize)]
pub(crate) struct PlayerResponse {
    uuid: Uuid,
    extra_data: Value,
    cosmetics: Vec<String>,
}

impl TryFrom<PlayerWithCosmetics> for PlayerResponse {
    type Error = serde_json::Error;

    fn try_from(player: PlayerWithCosmetics) -> Result<Self, Self::Error> {
        Ok(Self {
            uuid: player.id,
            extra_data: serde_json::from_str(&player.data)?,
            cosmetics: player.cosmetics,
        })
    }
}

#[debug_handler]
pub(crate) async fn add_player_cosmetic(
    State(state): State<Arc<AppState>>,
    Path((player_id, cosmetic_id)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    tracing::debug!(%player_id, %cosmetic_id, "adding cosmetic to player");
    validation::validate_cosmetic_id(&cosmetic_id)?;

    state
        .db
        .add_player_cosmetic(player_id, cosmetic_id.clone())
        .await
        .map_err(|err| match err.kind() {
            StoreErrorKind::ForeignKeyViolation => AppError::Rejected("No matching cosmetic found"),
            StoreErrorKind::UniqueViolation => AppError::Rejected("Cosmetic already owned by player"),
            _ => err.into(),
        })?;

    tracing::info!(%player_id, %cosmetic_id, "added cosmetic to player");
    Ok(StatusCode::OK)
}

pub(crate) async fn remove_player_cosmetic(
    State(state): State<Arc<AppState>>,
    Path((player_id, cosmetic_id)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    tracing::debug!(%player_id, %cosmetic_id, "removing cosmetic from player");
    validation::validate_cosmetic_id(&cosmetic_id)?;

    state
        .db
        .remove_player_cosmetic(player_id, cosmetic_id.clone())
        .await
        .map_err(|err| match err.kind() {
            StoreErrorKind::NotFound => AppError::NotFound("No matching pair found"),
            _ => err.into(),
        })?;

    tracing::info!(%player_id, %cosmetic_id, "removed cosmetic from player");
    Ok(StatusCode::OK)
}

/// Store the raw body as the player's custom data.
pub(crate) async fn set_player_data(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<Uuid>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    validation::validate_custom_data(&body)?;

    state.db.set_player_data(player_id, body).await?;

    tracing::info!(%player_id, "updated player data");
    Ok(StatusCode::OK)
}

pub(crate) async fn get_player_data(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let data = state
        .db
        .get_player_data(player_id)
        .await?
        .ok_or(AppError::NotFound("Player not found"))?;

    Ok(([(header::CONTENT_TYPE, "application/json")], data))
}

pub(crate) async fn delete_player(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .db
        .delete_player(player_id)
        .await
        .map_err(|err| match err.kind() {
            StoreErrorKind::NotFound => AppError::NotFound("Player not found"),
            _ => err.into(),
        })?;

    tracing::info!(%player_id, "deleted player");
    Ok(StatusCode::OK)
}

#[debug_handler]
pub(crate) async fn get_player(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let player = state
        .db
        .get_player(player_id)
        .await?
        .ok_or(AppError::NotFound("Player not found"))?;

    Ok(Json(PlayerResponse::try_from(player)?))
}

pub(crate) async fn list_player_ids(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let ids = state.db.list_player_ids().await?;
    Ok(Json(ids))
}
