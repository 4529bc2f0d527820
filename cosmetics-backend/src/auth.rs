use crate::AppState;
use crate::error::AppError;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use axum_extra::typed_header::TypedHeaderRejection;
use headers::Authorization;
use headers::authorization::Bearer;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Rejects the request with 401 unless it carries `Authorization: Bearer <api token>`.
pub(crate) async fn require_token(
    State(state): State<Arc<AppState>>,
    auth: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = match auth {
        Ok(TypedHeader(auth)) => state.token_matches(auth.token()),
        Err(_) => false,
    };

    if !authorized {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "rejected unauthenticated request"
        );
        return AppError::Unauthorized.into_response();
    }

    next.run(request).await
}
