use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::auth::models::TokenPair;
use crate::inbound::http::router::AppState;

pub async fn google_login(
    State(state): State<AppState>,
    payload: Result<Json<GoogleLoginRequest>, JsonRejection>,
) -> Result<ApiSuccess<TokenPair>, ApiError> {
    let Json(body) = payload?;

    state
        .auth_service
        .federated_login(&body.token)
        .await
        .map_err(ApiError::from)
        .map(|pair| ApiSuccess::new(StatusCode::OK, pair))
}

/// Google ID token obtained by the client from Google Sign-In.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GoogleLoginRequest {
    token: String,
}
