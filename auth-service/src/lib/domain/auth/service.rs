use std::sync::Arc;

use async_trait::async_trait;
use auth::PasswordHasher;
use auth::TokenIssuer;
use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::auth::errors::AuthError;
use crate::domain::auth::errors::RefreshRejection;
use crate::domain::auth::errors::RotationError;
use crate::domain::auth::events::FederatedUserProvisionedEvent;
use crate::domain::auth::events::RefreshTokenReplayedEvent;
use crate::domain::auth::events::SecurityEvent;
use crate::domain::auth::events::UserRegisteredEvent;
use crate::domain::auth::models::AuthSettings;
use crate::domain::auth::models::LoginCommand;
use crate::domain::auth::models::TokenPair;
use crate::domain::auth::models::VerifiedIdentity;
use crate::domain::auth::ports::AuthServicePort;
use crate::domain::auth::ports::EventPublisher;
use crate::domain::auth::ports::FederatedIdentityVerifier;
use crate::domain::auth::ports::Store;
use crate::domain::auth::ports::Transaction;
use crate::domain::auth::refresh::RefreshTokenRotator;
use crate::domain::user::models::Password;
use crate::domain::user::models::RegisterUserCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserRepository;

/// Attempts at finding a free username for a provisioned federated user.
const USERNAME_ATTEMPTS: usize = 5;
/// Rounds of lookup-then-provision for one federated login.
const PROVISION_ATTEMPTS: usize = 3;

/// Domain service implementing the authentication flows.
///
/// Dependencies are passed in explicitly; every mutating flow runs in a
/// single store transaction committed only once all of its steps succeeded.
pub struct AuthService<S, F, EP>
where
    S: Store,
    F: FederatedIdentityVerifier,
    EP: EventPublisher,
{
    store: Arc<S>,
    token_issuer: Arc<TokenIssuer>,
    federated_verifier: Arc<F>,
    event_publisher: Arc<EP>,
    password_hasher: PasswordHasher,
    rotator: RefreshTokenRotator,
    settings: AuthSettings,
}

impl<S, F, EP> AuthService<S, F, EP>
where
    S: Store,
    F: FederatedIdentityVerifier,
    EP: EventPublisher,
{
    /// Create a new auth service with injected dependencies.
    ///
    /// # Arguments
    /// * `store` - Durable store for users and refresh tokens
    /// * `token_issuer` - Access token signer, built once at startup
    /// * `federated_verifier` - Third-party assertion verifier
    /// * `event_publisher` - Security event publishing implementation
    /// * `settings` - Role claim and refresh token lifetime
    pub fn new(
        store: Arc<S>,
        token_issuer: Arc<TokenIssuer>,
        federated_verifier: Arc<F>,
        event_publisher: Arc<EP>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            token_issuer,
            federated_verifier,
            event_publisher,
            password_hasher: PasswordHasher::new(),
            rotator: RefreshTokenRotator::new(settings.refresh_token_lifetime),
            settings,
        }
    }

    /// Hashing is deliberately slow, keep it off the async workers.
    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let hasher = self.password_hasher;

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Unknown(format!("Password hashing task failed: {}", e)))?
            .map_err(AuthError::from)
    }

    async fn verify_password(&self, password: &Password, hash: &str) -> Result<bool, AuthError> {
        let hasher = self.password_hasher;
        let password = password.expose().to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Unknown(format!("Password verification task failed: {}", e)))?
            .map_err(AuthError::from)
    }

    /// Burn one verification's worth of work for a login naming no account.
    async fn verify_decoy(&self, password: &Password) -> Result<(), AuthError> {
        let hasher = self.password_hasher;
        let password = password.expose().to_string();

        tokio::task::spawn_blocking(move || hasher.verify_decoy(&password))
            .await
            .map_err(|e| AuthError::Unknown(format!("Password verification task failed: {}", e)))?
            .map_err(AuthError::from)
    }

    /// Create a refresh token and sign an access token for `user` within `tx`.
    async fn issue_token_pair(
        &self,
        tx: &mut S::Transaction,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, AuthError> {
        let refresh_token = self.rotator.create(tx, user.id, now).await?;
        let access_token =
            self.token_issuer
                .issue_at(user.username.as_str(), &self.settings.role, now)?;

        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.token,
        })
    }

    /// Find a free username for `identity` and store the user unless its email exists.
    ///
    /// # Returns
    /// The stored user and whether this call created it
    ///
    /// # Errors
    /// * `UsernameTaken` - No free username found, or a concurrent insert took it
    async fn provision_federated_user(
        &self,
        tx: &mut S::Transaction,
        identity: &VerifiedIdentity,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Result<(User, bool), AuthError> {
        let base = Username::derive(&identity.display_name, &identity.email);
        let mut username = base.clone();
        let mut attempts = 0;

        while tx.find_by_username(&username).await?.is_some() {
            attempts += 1;
            if attempts >= USERNAME_ATTEMPTS {
                return Err(AuthError::UsernameTaken(base.to_string()));
            }
            let suffix = Uuid::new_v4().simple().to_string();
            username = base.with_suffix(&suffix[..6]);
        }

        let candidate = User {
            id: UserId::new(),
            username,
            email: identity.email.clone(),
            password_hash,
            created_at: now,
        };

        let stored = tx.create_unless_email_exists(&candidate).await?;
        let created = stored.id == candidate.id;

        Ok((stored, created))
    }

    async fn publish(&self, event: SecurityEvent) {
        if let Err(e) = self.event_publisher.publish(&event).await {
            tracing::error!(
                event_type = event.event_type(),
                event_id = event.event_id(),
                error = %e,
                "Failed to publish security event"
            );
        }
    }
}

#[async_trait]
impl<S, F, EP> AuthServicePort for AuthService<S, F, EP>
where
    S: Store,
    F: FederatedIdentityVerifier,
    EP: EventPublisher,
{
    async fn register(&self, command: RegisterUserCommand) -> Result<User, AuthError> {
        {
            let mut tx = self.store.begin().await?;

            if tx.find_by_username(&command.username).await?.is_some() {
                return Err(AuthError::UsernameTaken(command.username.to_string()));
            }
            if tx.find_by_email(&command.email).await?.is_some() {
                return Err(AuthError::EmailTaken(command.email.to_string()));
            }
        }

        let password_hash = self
            .hash_password(command.password.expose().to_string())
            .await?;

        let user = User {
            id: UserId::new(),
            username: command.username,
            email: command.email,
            password_hash,
            created_at: Utc::now(),
        };

        // A concurrent registration may have taken the name since the checks;
        // the store's unique constraints turn that into UsernameTaken/EmailTaken.
        let mut tx = self.store.begin().await?;
        tx.create(&user).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        self.publish(SecurityEvent::UserRegistered(UserRegisteredEvent::new(&user)))
            .await;

        Ok(user)
    }

    async fn login(&self, command: LoginCommand) -> Result<TokenPair, AuthError> {
        let user = {
            let mut tx = self.store.begin().await?;
            tx.find_by_username(&command.username).await?
        };

        // An unknown username costs one verification too.
        let Some(user) = user else {
            self.verify_decoy(&command.password).await?;
            tracing::info!("Password login rejected");
            return Err(AuthError::UserNotFound(command.username.to_string()));
        };

        if !self
            .verify_password(&command.password, &user.password_hash)
            .await?
        {
            tracing::info!(user_id = %user.id, "Password login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let pair = self.issue_token_pair(&mut tx, &user, now).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "Password login succeeded");
        Ok(pair)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let rotation = self.rotator.rotate(&mut tx, refresh_token, now).await;

        let successor = match rotation {
            Ok(successor) => successor,
            Err(RotationError::ExpiredOrRevoked(RefreshRejection::Revoked {
                token_id,
                user_id,
            })) => {
                drop(tx);
                tracing::warn!(
                    token_id = %token_id,
                    user_id = %user_id,
                    "Spent refresh token presented again, possible replay"
                );
                self.publish(SecurityEvent::RefreshTokenReplayed(
                    RefreshTokenReplayedEvent::new(&user_id, &token_id, now),
                ))
                .await;
                return Err(AuthError::RefreshExpiredOrRevoked);
            }
            Err(e) => return Err(e.into()),
        };

        let user_id = successor.record.user_id;
        let user = tx
            .find_by_id(&user_id)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(user_id.to_string()))?;

        let access_token = self
            .token_issuer
            .issue_at(user.username.as_str(), &self.settings.role, now)?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "Refresh token rotated");
        Ok(TokenPair {
            access_token,
            refresh_token: successor.token,
        })
    }

    async fn federated_login(&self, assertion: &str) -> Result<TokenPair, AuthError> {
        let identity = self.federated_verifier.verify(assertion).await?;
        let now = Utc::now();
        let mut attempts = 0;

        let (mut tx, user, created) = loop {
            attempts += 1;

            let mut tx = self.store.begin().await?;
            let existing = tx.find_by_email(&identity.email).await?;
            if let Some(user) = existing {
                break (tx, user, false);
            }
            drop(tx);

            // Placeholder credential: hash of a secret nobody ever sees.
            let password_hash = self.hash_password(auth::generate_opaque_token()).await?;

            let mut tx = self.store.begin().await?;
            match self
                .provision_federated_user(&mut tx, &identity, password_hash, now)
                .await
            {
                Ok((user, created)) => break (tx, user, created),
                // A concurrent first login for the same identity may have
                // taken the derived username; its user is found next round.
                Err(AuthError::UsernameTaken(username)) if attempts < PROVISION_ATTEMPTS => {
                    tracing::debug!(
                        username = %username,
                        attempt = attempts,
                        "Federated provisioning lost a username race, retrying"
                    );
                }
                Err(AuthError::UsernameTaken(username)) => {
                    tracing::error!(
                        username = %username,
                        "No free username for federated user"
                    );
                    return Err(AuthError::Unknown(format!(
                        "No free username derived from {}",
                        username
                    )));
                }
                Err(e) => return Err(e),
            }
        };

        let pair = self.issue_token_pair(&mut tx, &user, now).await?;
        tx.commit().await?;

        if created {
            tracing::info!(
                user_id = %user.id,
                provider = self.federated_verifier.provider(),
                "Federated user provisioned"
            );
            self.publish(SecurityEvent::FederatedUserProvisioned(
                FederatedUserProvisionedEvent::new(&user, self.federated_verifier.provider()),
            ))
            .await;
        }

        tracing::info!(user_id = %user.id, "Federated login succeeded");
        Ok(pair)
    }

    async fn current_user(&self, username: &Username) -> Result<User, AuthError> {
        let mut tx = self.store.begin().await?;

        tx.find_by_username(username)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(username.to_string()))
    }
}
