use crate::AppState;
use crate::error::AppError;
use crate::routes::players::PlayerResponse;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use cosmetics_db::Database;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

const CACHE_CONTROL: &str = "max-age=300";

#[derive(Serialize)]
struct Entries {
    players: Vec<PlayerResponse>,
    cosmetics: Vec<Value>,
}

/// Query every cosmetic and every player and render the combined payload.
async fn render_entries(db: &Database) -> Result<Bytes, AppError> {
    let cosmetics = db
        .list_cosmetics()
        .await?
        .iter()
        .map(|document| serde_json::from_str(document))
        .collect::<Result<Vec<Value>, _>>()?;

    let players = db
        .list_players()
        .await?
        .into_iter()
        .map(PlayerResponse::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let body = serde_json::to_vec(&Entries { players, cosmetics })?;
    Ok(Bytes::from(body))
}

/// Everything at once, served from a snapshot at most a few seconds old.
pub(crate) async fn get_entries(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = state
        .entries
        .get_or_refresh(|| render_entries(&state.db))
        .await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL)),
            (header::AGE, HeaderValue::from(snapshot.age().as_secs())),
        ],
        snapshot.body,
    ))
}
