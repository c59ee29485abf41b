use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::auth::errors::AuthError;
use crate::domain::user::models::User;
use crate::domain::user::models::Username;
use crate::inbound::http::middleware::Identity;
use crate::inbound::http::router::AppState;

pub async fn current_user(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<ApiSuccess<CurrentUserResponseData>, ApiError> {
    let not_found = || ApiError::NotFound("User not found".to_string());

    let username = Username::new(identity.subject).map_err(|_| not_found())?;

    state
        .auth_service
        .current_user(&username)
        .await
        .map_err(|e| match e {
            AuthError::UserNotFound(_) => not_found(),
            other => ApiError::from(other),
        })
        .map(|ref user| ApiSuccess::new(StatusCode::OK, user.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentUserResponseData {
    pub username: String,
    pub email: String,
}

impl From<&User> for CurrentUserResponseData {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.as_str().to_string(),
            email: user.email.as_str().to_string(),
        }
    }
}
