use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::jwt::AccessTokenClaims;
use crate::jwt::JwtHandler;
use crate::jwt::TokenError;

/// Issues and parses short-lived access tokens.
///
/// Owns the signing key for the life of the process. Built once at startup
/// and shared read-only, so no locking is needed around it.
#[derive(Debug)]
pub struct TokenIssuer {
    jwt_handler: JwtHandler,
    lifetime: Duration,
}

impl TokenIssuer {
    /// Default access token lifetime in minutes.
    pub const DEFAULT_LIFETIME_MINUTES: i64 = 10;

    /// Create an issuer with the default 10 minute lifetime.
    ///
    /// # Errors
    /// * `KeyTooShort` - Secret shorter than 32 bytes
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        Self::with_lifetime(secret, Duration::minutes(Self::DEFAULT_LIFETIME_MINUTES))
    }

    /// Create an issuer with an explicit token lifetime.
    ///
    /// # Errors
    /// * `KeyTooShort` - Secret shorter than 32 bytes
    pub fn with_lifetime(secret: &[u8], lifetime: Duration) -> Result<Self, TokenError> {
        Ok(Self {
            jwt_handler: JwtHandler::new(secret)?,
            lifetime,
        })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign an access token for `subject` carrying `role`, issued now.
    ///
    /// # Errors
    /// * `EncodingFailed` - Token generation failed
    pub fn issue_access_token(&self, subject: &str, role: &str) -> Result<String, TokenError> {
        self.issue_at(subject, role, Utc::now())
    }

    /// Sign an access token as if issued at `issued_at`.
    pub fn issue_at(
        &self,
        subject: &str,
        role: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = AccessTokenClaims::new(subject, role, issued_at, self.lifetime);
        self.jwt_handler.encode(&claims)
    }

    /// Verify and decode an access token against the current time.
    ///
    /// # Errors
    /// * `Malformed` - Not a structurally valid token
    /// * `InvalidSignature` - Signature does not verify
    /// * `Expired` - Signature valid but expiry has passed
    pub fn parse_access_token(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        self.parse_at(token, Utc::now())
    }

    /// Verify and decode an access token against `now`.
    ///
    /// Signature first, then expiry with no leeway.
    pub fn parse_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessTokenClaims, TokenError> {
        let claims: AccessTokenClaims = self.jwt_handler.decode(token)?;

        if claims.is_expired(now.timestamp()) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test_secret_key_at_least_32_bytes!";

    #[test]
    fn test_issue_and_parse_round_trip() {
        let issuer = TokenIssuer::new(SECRET).unwrap();

        for (subject, role) in [("alice", "USER"), ("bob_2", "ADMIN"), ("x-y-z", "")] {
            let token = issuer.issue_access_token(subject, role).unwrap();
            let claims = issuer.parse_access_token(&token).unwrap();

            assert_eq!(claims.sub, subject);
            assert_eq!(claims.role, role);
            assert_eq!(claims.exp - claims.iat, 600);
        }
    }

    #[test]
    fn test_expired_token_with_valid_signature() {
        let issuer = TokenIssuer::new(SECRET).unwrap();
        let issued_at = Utc::now() - Duration::minutes(11);

        let token = issuer.issue_at("alice", "USER", issued_at).unwrap();

        assert_eq!(
            issuer.parse_access_token(&token).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn test_expired_exactly_at_expiry_instant() {
        let issuer = TokenIssuer::new(SECRET).unwrap();
        let issued_at = Utc::now();
        let token = issuer.issue_at("alice", "USER", issued_at).unwrap();

        let just_before = issued_at + Duration::minutes(10) - Duration::seconds(1);
        assert!(issuer.parse_at(&token, just_before).is_ok());

        let at_expiry = issued_at + Duration::minutes(10);
        assert_eq!(
            issuer.parse_at(&token, at_expiry).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn test_signature_checked_before_expiry() {
        let issuer = TokenIssuer::new(SECRET).unwrap();
        let other = TokenIssuer::new(b"another_secret_key_at_least_32_bytes").unwrap();

        let token = other
            .issue_at("alice", "USER", Utc::now() - Duration::hours(1))
            .unwrap();

        assert_eq!(
            issuer.parse_access_token(&token).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_malformed_token() {
        let issuer = TokenIssuer::new(SECRET).unwrap();

        assert!(matches!(
            issuer.parse_access_token("invalid.token.here"),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_token_without_required_claims_is_malformed() {
        let issuer = TokenIssuer::new(SECRET).unwrap();
        let handler = JwtHandler::new(SECRET).unwrap();
        let token = handler
            .encode(&serde_json::json!({ "sub": "alice" }))
            .unwrap();

        assert!(matches!(
            issuer.parse_access_token(&token),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_custom_lifetime() {
        let issuer = TokenIssuer::with_lifetime(SECRET, Duration::minutes(3)).unwrap();
        let token = issuer.issue_access_token("alice", "USER").unwrap();
        let claims = issuer.parse_access_token(&token).unwrap();

        assert_eq!(claims.exp - claims.iat, 180);
        assert_eq!(issuer.lifetime(), Duration::minutes(3));
    }
}
