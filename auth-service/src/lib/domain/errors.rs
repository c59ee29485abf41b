use thiserror::Error;

/// Error for durable store operations.
///
/// Unique-constraint violations are surfaced as their own kinds so flows can
/// turn a lost registration race into `UsernameTaken`/`EmailTaken`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Username already exists: {0}")]
    DuplicateUsername(String),

    #[error("Email already exists: {0}")]
    DuplicateEmail(String),

    #[error("Refresh token already exists")]
    DuplicateRefreshToken,

    #[error("Stored record is invalid: {0}")]
    CorruptRecord(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Error for event publishing operations.
///
/// Represents failures that can occur when publishing security events to the event bus (Kafka).
#[derive(Debug, Clone, Error)]
pub enum EventPublisherError {
    #[error("Failed to serialize event: {0}")]
    SerializationFailed(String),

    #[error("Failed to publish event to broker: {0}")]
    PublishFailed(String),
}
