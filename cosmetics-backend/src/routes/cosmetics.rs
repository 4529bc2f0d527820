use crate::AppState;
use crate::error::AppError;
use crate::validation::{self, ValidationError};

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use axum_macros::debug_handler;
use cosmetics_db::{Cosmetic, StoreErrorKind};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
enum WriteMode {
    /// Insert only, duplicate ids are rejected
    Create,
    /// Insert or replace
    Upsert,
    /// Replace only, the id must already exist
    Update,
}

/// Extract the id a body-addressed request refers to.
fn id_from_document(document: &Map<String, Value>) -> Result<String, ValidationError> {
    match document.get("id") {
        None | Some(Value::Null) => Err(ValidationError::CosmeticIdEmpty),
        Some(Value::String(id)) => Ok(id.clone()),
        Some(_) => Err(ValidationError::CosmeticIdNotString),
    }
}

/// Build the stored form of a cosmetic from a request body.
///
/// A path id, when present, overrides whatever `id` the body carries.
fn cosmetic_from_body(path_id: Option<String>, body: &[u8]) -> Result<Cosmetic, ValidationError> {
    let mut document = validation::parse_object(body)?;

    let id = match path_id {
        Some(id) => id,
        None => id_from_document(&document)?,
    };
    validation::validate_cosmetic_id(&id)?;
    let version = validation::validate_version(document.get("version"))?;

    document.insert("id".to_string(), Value::String(id.clone()));

    Ok(Cosmetic {
        id,
        version,
        data: Value::Object(document).to_string(),
    })
}

async fn write_cosmetic(
    state: &AppState,
    mode: WriteMode,
    path_id: Option<String>,
    body: &[u8],
) -> Result<StatusCode, AppError> {
    let cosmetic = cosmetic_from_body(path_id, body)?;
    let cosmetic_id = cosmetic.id.clone();
    tracing::info!(%cosmetic_id, version = cosmetic.version, ?mode, "writing cosmetic");

    let result = match mode {
        WriteMode::Create => state.db.create_cosmetic(cosmetic).await,
        WriteMode::Upsert => state.db.upsert_cosmetic(cosmetic).await,
        WriteMode::Update => state.db.update_cosmetic(cosmetic).await,
    };

    result.map_err(|err| match err.kind() {
        StoreErrorKind::UniqueViolation => {
            AppError::Rejected("A cosmetic with this id already exists")
        }
        StoreErrorKind::NotFound => AppError::NotFound("Cosmetic not found"),
        _ => err.into(),
    })?;

    Ok(StatusCode::OK)
}

async fn remove_cosmetic(state: &AppState, cosmetic_id: String) -> Result<StatusCode, AppError> {
    validation::validate_cosmetic_id(&cosmetic_id)?;

    state
        .db
        .delete_cosmetic(cosmetic_id.clone())
        .await
        .map_err(|err| match err.kind() {
            StoreErrorKind::NotFound => AppError::NotFound("Cosmetic not found"),
            _ => err.into(),
        })?;

    tracing::info!(%cosmetic_id, "deleted cosmetic");
    Ok(StatusCode::OK)
}

// ============================================================================
// /cosmetics/{cosmetic_id}
// ============================================================================

#[debug_handler]
pub(crate) async fn create_cosmetic(
    State(state): State<Arc<AppState>>,
    Path(cosmetic_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    write_cosmetic(&state, WriteMode::Create, Some(cosmetic_id), &body).await
}

#[debug_handler]
pub(crate) async fn upsert_cosmetic(
    State(state): State<Arc<AppState>>,
    Path(cosmetic_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    write_cosmetic(&state, WriteMode::Upsert, Some(cosmetic_id), &body).await
}

pub(crate) async fn update_cosmetic(
    State(state): State<Arc<AppState>>,
    Path(cosmetic_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    write_cosmetic(&state, WriteMode::Update, Some(cosmetic_id), &body).await
}

pub(crate) async fn delete_cosmetic(
    State(state): State<Arc<AppState>>,
    Path(cosmetic_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    remove_cosmetic(&state, cosmetic_id).await
}

#[debug_handler]
pub(crate) async fn get_cosmetic(
    State(state): State<Arc<AppState>>,
    Path(cosmetic_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    validation::validate_cosmetic_id(&cosmetic_id)?;

    let data = state
        .db
        .get_cosmetic(cosmetic_id)
        .await?
        .ok_or(AppError::NotFound("Cosmetic not found"))?;

    Ok(([(header::CONTENT_TYPE, "application/json")], data))
}

// ============================================================================
// /cosmetics (id carried in the body)
// ============================================================================

pub(crate) async fn create_cosmetic_from_body(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    write_cosmetic(&state, WriteMode::Create, None, &body).await
}

pub(crate) async fn upsert_cosmetic_from_body(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    write_cosmetic(&state, WriteMode::Upsert, None, &body).await
}

pub(crate) async fn update_cosmetic_from_body(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    write_cosmetic(&state, WriteMode::Update, None, &body).await
}

pub(crate) async fn delete_cosmetic_from_body(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let document = validation::parse_object(&body)?;
    let cosmetic_id = id_from_document(&document)?;
    remove_cosmetic(&state, cosmetic_id).await
}

pub(crate) async fn list_cosmetic_ids(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let ids = state.db.list_cosmetic_ids().await?;
    Ok(Json(ids))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_id_is_injected() {
        let cosmetic =
            cosmetic_from_body(Some("torch".to_string()), br#"{"id":"other","version":1,"extra":"x"}"#)
                .unwrap();
        assert_eq!(cosmetic.id, "torch");
        assert_eq!(cosmetic.version, 1);

        let stored: Value = serde_json::from_str(&cosmetic.data).unwrap();
        assert_eq!(stored["id"], "torch");
        assert_eq!(stored["extra"], "x");
    }

    #[test]
    fn test_body_id_is_used_without_path() {
        let cosmetic = cosmetic_from_body(None, br#"{"id":"wings","version":3}"#).unwrap();
        assert_eq!(cosmetic.id, "wings");
        assert_eq!(cosmetic.version, 3);
    }

    #[test]
    fn test_body_rules() {
        assert_eq!(
            cosmetic_from_body(None, br#"{"version":1}"#).unwrap_err(),
            ValidationError::CosmeticIdEmpty
        );
        assert_eq!(
            cosmetic_from_body(None, br#"{"id":7,"version":1}"#).unwrap_err(),
            ValidationError::CosmeticIdNotString
        );
        assert_eq!(
            cosmetic_from_body(Some("Bad Id".to_string()), br#"{"version":1}"#).unwrap_err(),
            ValidationError::CosmeticIdInvalidChars
        );
        assert_eq!(
            cosmetic_from_body(Some("torch".to_string()), br#"{"extra":"x"}"#).unwrap_err(),
            ValidationError::VersionMissing
        );
        assert_eq!(
            cosmetic_from_body(Some("torch".to_string()), b"not json").unwrap_err(),
            ValidationError::BodyNotJsonObject
        );
    }
}
