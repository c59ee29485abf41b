use async_trait::async_trait;

use crate::domain::auth::errors::AuthError;
use crate::domain::auth::errors::FederatedIdentityError;
use crate::domain::auth::events::SecurityEvent;
use crate::domain::auth::models::LoginCommand;
use crate::domain::auth::models::RefreshToken;
use crate::domain::auth::models::RefreshTokenId;
use crate::domain::auth::models::TokenPair;
use crate::domain::auth::models::VerifiedIdentity;
use crate::domain::errors::EventPublisherError;
use crate::domain::errors::StoreError;
use crate::domain::user::models::RegisterUserCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserRepository;

/// Port for the authentication flows.
///
/// Each flow is all-or-nothing: its store writes are committed together or
/// not at all.
#[async_trait]
pub trait AuthServicePort: Send + Sync + 'static {
    /// Register a new user with a password.
    ///
    /// # Errors
    /// * `UsernameTaken` - Username is already taken
    /// * `EmailTaken` - Email is already registered
    /// * `Store` - Store operation failed
    async fn register(&self, command: RegisterUserCommand) -> Result<User, AuthError>;

    /// Verify a password and issue a token pair.
    ///
    /// # Errors
    /// * `UserNotFound` - No user with this username
    /// * `InvalidCredentials` - Password does not match
    /// * `Store` - Store operation failed
    async fn login(&self, command: LoginCommand) -> Result<TokenPair, AuthError>;

    /// Exchange a refresh token for a new token pair, spending the presented one.
    ///
    /// # Errors
    /// * `RefreshNotFound` - Token unknown
    /// * `RefreshExpiredOrRevoked` - Token expired or already spent
    /// * `Store` - Store operation failed
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;

    /// Verify a third-party assertion, find or create the user, issue a token pair.
    ///
    /// # Errors
    /// * `InvalidAssertion` - Assertion did not verify
    /// * `IdentityProviderUnavailable` - Provider keys could not be fetched
    /// * `Store` - Store operation failed
    async fn federated_login(&self, assertion: &str) -> Result<TokenPair, AuthError>;

    /// Resolve the user behind an already verified access token subject.
    ///
    /// # Errors
    /// * `UserNotFound` - Subject no longer matches a user
    /// * `Store` - Store operation failed
    async fn current_user(&self, username: &Username) -> Result<User, AuthError>;
}

/// Persistence operations for refresh tokens.
///
/// Implemented by a store transaction, like [`UserRepository`].
#[async_trait]
pub trait RefreshTokenRepository: Send {
    /// Persist a new refresh token.
    ///
    /// # Errors
    /// * `DuplicateRefreshToken` - Token digest already exists
    /// * `Database` - Database operation failed
    async fn save(&mut self, token: &RefreshToken) -> Result<(), StoreError>;

    /// Retrieve a refresh token by the digest of its opaque value.
    ///
    /// The row stays locked against concurrent writers until the transaction ends.
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn find_by_hash(&mut self, token_hash: &str)
        -> Result<Option<RefreshToken>, StoreError>;

    /// Set the revoked flag if it is not set yet.
    ///
    /// # Returns
    /// `true` if this call revoked the token, `false` if it was already revoked or absent
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn revoke(&mut self, id: &RefreshTokenId) -> Result<bool, StoreError>;
}

/// One unit of work against the durable store.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait Transaction: UserRepository + RefreshTokenRepository + Sized {
    /// # Errors
    /// * `DuplicateUsername` / `DuplicateEmail` - A deferred constraint failed
    /// * `Database` - Commit failed
    async fn commit(self) -> Result<(), StoreError>;
}

/// Durable store holding users and refresh tokens.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Transaction: Transaction;

    /// # Errors
    /// * `Database` - Store unreachable
    async fn begin(&self) -> Result<Self::Transaction, StoreError>;
}

/// Converts a third-party identity assertion into a verified identity.
///
/// Never creates or looks up users.
#[async_trait]
pub trait FederatedIdentityVerifier: Send + Sync + 'static {
    /// Name of the provider, recorded on provisioning events.
    fn provider(&self) -> &'static str;

    /// # Errors
    /// * `InvalidAssertion` - Signature, audience, issuer or expiry check failed
    /// * `ProviderUnavailable` - Verification keys could not be fetched in time
    async fn verify(&self, assertion: &str) -> Result<VerifiedIdentity, FederatedIdentityError>;
}

/// Publishing of security events.
#[async_trait]
pub trait EventPublisher: Send + Sync + 'static {
    /// # Errors
    /// * `SerializationFailed` - Event serialization failed
    /// * `PublishFailed` - Failed to publish to broker
    async fn publish(&self, event: &SecurityEvent) -> Result<(), EventPublisherError>;
}
