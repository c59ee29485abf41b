use std::fmt;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Password;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;

/// Refresh token unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefreshTokenId(pub Uuid);

impl RefreshTokenId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RefreshTokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RefreshTokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stored record of a long-lived opaque credential exchanged for new token pairs.
///
/// Only the digest of the token value is kept. Never updated after creation
/// except for `revoked`, which only ever goes from false to true. Spent tokens
/// are kept, not deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub id: RefreshTokenId,
    pub token_hash: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl RefreshToken {
    /// Fresh, unrevoked token for `user_id` valid for `lifetime` from `now`.
    pub fn issue(user_id: UserId, now: DateTime<Utc>, lifetime: Duration) -> IssuedRefreshToken {
        let token = auth::generate_opaque_token();

        let record = Self {
            id: RefreshTokenId::new(),
            token_hash: auth::hash_opaque_token(&token),
            user_id,
            created_at: now,
            expires_at: now + lifetime,
            revoked: false,
        };

        IssuedRefreshToken { token, record }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A just-created refresh token: the record to store and the value for its holder.
///
/// The plaintext exists only here; it is never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub record: RefreshToken,
}

// The token string is a bearer credential; keep it out of logs.
impl fmt::Debug for IssuedRefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedRefreshToken")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

/// Result of every successful credential-issuing flow.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenPair(***)")
    }
}

/// Identity asserted by a trusted third-party provider, after verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: EmailAddress,
    pub display_name: String,
}

/// Command to log in with a password.
#[derive(Debug)]
pub struct LoginCommand {
    pub username: Username,
    pub password: Password,
}

impl LoginCommand {
    pub fn new(username: Username, password: Password) -> Self {
        Self { username, password }
    }
}

/// Tunables of the authentication flows.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Role claim put in every issued access token
    pub role: String,
    pub refresh_token_lifetime: Duration,
}

impl AuthSettings {
    pub const DEFAULT_ROLE: &'static str = "USER";
    pub const DEFAULT_REFRESH_TOKEN_DAYS: i64 = 7;
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            role: Self::DEFAULT_ROLE.to_string(),
            refresh_token_lifetime: Duration::days(Self::DEFAULT_REFRESH_TOKEN_DAYS),
        }
    }
}
