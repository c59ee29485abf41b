use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::domain::auth::events::FederatedUserProvisionedEvent;
use crate::domain::auth::events::RefreshTokenReplayedEvent;
use crate::domain::auth::events::SecurityEvent;
use crate::domain::auth::events::UserRegisteredEvent;

/// Serializable envelope for all security events.
///
/// Infrastructure representation for event publishing (Kafka, logs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SecurityEventMessage {
    UserRegistered(UserRegisteredMessage),
    FederatedUserProvisioned(FederatedUserProvisionedMessage),
    RefreshTokenReplayed(RefreshTokenReplayedMessage),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegisteredMessage {
    pub event_id: String,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRegisteredEvent> for UserRegisteredMessage {
    fn from(event: &UserRegisteredEvent) -> Self {
        Self {
            event_id: event.event_id.clone(),
            user_id: event.user_id.clone(),
            username: event.username.clone(),
            email: event.email.clone(),
            created_at: event.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedUserProvisionedMessage {
    pub event_id: String,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub provider: String,
    pub created_at: DateTime<Utc>,
}

impl From<&FederatedUserProvisionedEvent> for FederatedUserProvisionedMessage {
    fn from(event: &FederatedUserProvisionedEvent) -> Self {
        Self {
            event_id: event.event_id.clone(),
            user_id: event.user_id.clone(),
            username: event.username.clone(),
            email: event.email.clone(),
            provider: event.provider.clone(),
            created_at: event.created_at,
        }
    }
}

/// Carries the token id only, never the token value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenReplayedMessage {
    pub event_id: String,
    pub user_id: String,
    pub token_id: String,
    pub detected_at: DateTime<Utc>,
}

impl From<&RefreshTokenReplayedEvent> for RefreshTokenReplayedMessage {
    fn from(event: &RefreshTokenReplayedEvent) -> Self {
        Self {
            event_id: event.event_id.clone(),
            user_id: event.user_id.clone(),
            token_id: event.token_id.clone(),
            detected_at: event.detected_at,
        }
    }
}

impl From<&SecurityEvent> for SecurityEventMessage {
    fn from(event: &SecurityEvent) -> Self {
        match event {
            SecurityEvent::UserRegistered(e) => SecurityEventMessage::UserRegistered(e.into()),
            SecurityEvent::FederatedUserProvisioned(e) => {
                SecurityEventMessage::FederatedUserProvisioned(e.into())
            }
            SecurityEvent::RefreshTokenReplayed(e) => {
                SecurityEventMessage::RefreshTokenReplayed(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::auth::models::RefreshTokenId;
    use crate::domain::user::models::UserId;

    #[test]
    fn test_message_is_tagged_by_event_type() {
        let event = SecurityEvent::RefreshTokenReplayed(RefreshTokenReplayedEvent::new(
            &UserId::new(),
            &RefreshTokenId::new(),
            Utc::now(),
        ));

        let value = serde_json::to_value(SecurityEventMessage::from(&event)).unwrap();

        assert_eq!(value["event_type"], event.event_type());
        assert_eq!(value["event_id"], event.event_id());
        assert_eq!(value["user_id"], event.user_id());
    }
}
