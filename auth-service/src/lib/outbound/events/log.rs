use async_trait::async_trait;

use crate::domain::auth::events::SecurityEvent;
use crate::domain::auth::ports::EventPublisher;
use crate::domain::errors::EventPublisherError;
use crate::outbound::events::messages::SecurityEventMessage;

/// Publishes security events to the application log only.
///
/// Used when no Kafka broker is configured.
#[derive(Debug, Default, Clone)]
pub struct LogEventPublisher;

impl LogEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(&self, event: &SecurityEvent) -> Result<(), EventPublisherError> {
        let payload = serde_json::to_string(&SecurityEventMessage::from(event))
            .map_err(|e| EventPublisherError::SerializationFailed(e.to_string()))?;

        tracing::info!(
            target: "security_events",
            event_type = event.event_type(),
            user_id = event.user_id(),
            payload = %payload,
            "Security event"
        );

        Ok(())
    }
}
