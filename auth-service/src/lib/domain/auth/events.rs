use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::auth::models::RefreshTokenId;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;

/// Envelope for all security-relevant events.
#[derive(Debug, Clone)]
pub enum SecurityEvent {
    UserRegistered(UserRegisteredEvent),
    FederatedUserProvisioned(FederatedUserProvisionedEvent),
    RefreshTokenReplayed(RefreshTokenReplayedEvent),
}

impl SecurityEvent {
    pub fn event_id(&self) -> &str {
        match self {
            SecurityEvent::UserRegistered(e) => &e.event_id,
            SecurityEvent::FederatedUserProvisioned(e) => &e.event_id,
            SecurityEvent::RefreshTokenReplayed(e) => &e.event_id,
        }
    }

    pub fn event_type(&self) -> &str {
        match self {
            SecurityEvent::UserRegistered(_) => "user_registered",
            SecurityEvent::FederatedUserProvisioned(_) => "federated_user_provisioned",
            SecurityEvent::RefreshTokenReplayed(_) => "refresh_token_replayed",
        }
    }

    /// User ID this event relates to, used as the partition key.
    pub fn user_id(&self) -> &str {
        match self {
            SecurityEvent::UserRegistered(e) => &e.user_id,
            SecurityEvent::FederatedUserProvisioned(e) => &e.user_id,
            SecurityEvent::RefreshTokenReplayed(e) => &e.user_id,
        }
    }
}

/// Published when a user registers with a password.
#[derive(Debug, Clone)]
pub struct UserRegisteredEvent {
    pub event_id: String,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl UserRegisteredEvent {
    pub fn new(user: &User) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            user_id: user.id.to_string(),
            username: user.username.as_str().to_string(),
            email: user.email.as_str().to_string(),
            created_at: user.created_at,
        }
    }
}

/// Published when a federated login creates the account for a new email.
#[derive(Debug, Clone)]
pub struct FederatedUserProvisionedEvent {
    pub event_id: String,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub provider: String,
    pub created_at: DateTime<Utc>,
}

impl FederatedUserProvisionedEvent {
    pub fn new(user: &User, provider: &str) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            user_id: user.id.to_string(),
            username: user.username.as_str().to_string(),
            email: user.email.as_str().to_string(),
            provider: provider.to_string(),
            created_at: user.created_at,
        }
    }
}

/// Published when an already spent refresh token is presented again.
///
/// Either a client bug or a stolen token being replayed; downstream consumers
/// decide whether to revoke the user's other sessions.
#[derive(Debug, Clone)]
pub struct RefreshTokenReplayedEvent {
    pub event_id: String,
    pub user_id: String,
    pub token_id: String,
    pub detected_at: DateTime<Utc>,
}

impl RefreshTokenReplayedEvent {
    pub fn new(user_id: &UserId, token_id: &RefreshTokenId, detected_at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            token_id: token_id.to_string(),
            detected_at,
        }
    }
}
