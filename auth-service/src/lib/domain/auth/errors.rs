use thiserror::Error;

use crate::domain::auth::models::RefreshTokenId;
use crate::domain::errors::StoreError;
use crate::domain::user::errors::EmailError;
use crate::domain::user::errors::PasswordPolicyError;
use crate::domain::user::errors::UsernameError;
use crate::domain::user::models::UserId;

/// Why a refresh token was refused although it exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshRejection {
    Expired,
    /// Already spent: a replay, possibly of a stolen token
    Revoked {
        token_id: RefreshTokenId,
        user_id: UserId,
    },
}

/// Error for refresh token rotation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RotationError {
    #[error("Refresh token not found")]
    NotFound,

    #[error("Refresh token expired or revoked")]
    ExpiredOrRevoked(RefreshRejection),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Error for federated identity verification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FederatedIdentityError {
    /// Bad signature, wrong audience or issuer, expired, missing email
    #[error("Invalid identity assertion: {0}")]
    InvalidAssertion(String),

    /// Provider keys could not be fetched in time
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),
}

/// Top-level error for all authentication flows
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    // Value validation errors (automatically converted via #[from])
    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid password: {0}")]
    InvalidPassword(#[from] PasswordPolicyError),

    // Domain-level errors
    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Email already taken: {0}")]
    EmailTaken(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Refresh token not found")]
    RefreshNotFound,

    #[error("Refresh token expired or revoked")]
    RefreshExpiredOrRevoked,

    #[error("Invalid identity assertion: {0}")]
    InvalidAssertion(String),

    // Infrastructure errors
    #[error("Identity provider unavailable: {0}")]
    IdentityProviderUnavailable(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Password hashing failed: {0}")]
    Password(#[from] auth::PasswordError),

    #[error("Token signing failed: {0}")]
    TokenSigning(#[from] auth::TokenError),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AuthError {
    /// Infrastructure failures a caller may retry, as opposed to a definitive answer.
    ///
    /// A corrupt stored record, an unparseable password hash or a signing
    /// failure fails the same way on every retry, so none of them count.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::IdentityProviderUnavailable(_) | AuthError::Unknown(_) => true,
            AuthError::Store(e) => !matches!(e, StoreError::CorruptRecord(_)),
            _ => false,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername(username) => AuthError::UsernameTaken(username),
            StoreError::DuplicateEmail(email) => AuthError::EmailTaken(email),
            other => AuthError::Store(other),
        }
    }
}

impl From<RotationError> for AuthError {
    fn from(err: RotationError) -> Self {
        match err {
            RotationError::NotFound => AuthError::RefreshNotFound,
            RotationError::ExpiredOrRevoked(_) => AuthError::RefreshExpiredOrRevoked,
            RotationError::Store(e) => AuthError::from(e),
        }
    }
}

impl From<FederatedIdentityError> for AuthError {
    fn from(err: FederatedIdentityError) -> Self {
        match err {
            FederatedIdentityError::InvalidAssertion(reason) => AuthError::InvalidAssertion(reason),
            FederatedIdentityError::ProviderUnavailable(reason) => {
                AuthError::IdentityProviderUnavailable(reason)
            }
        }
    }
}
