use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::Validation;
use moka::future::Cache;
use serde::Deserialize;

use crate::config::GoogleConfig;
use crate::domain::auth::errors::FederatedIdentityError;
use crate::domain::auth::models::VerifiedIdentity;
use crate::domain::auth::ports::FederatedIdentityVerifier;
use crate::domain::user::models::EmailAddress;

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];
/// Single cache entry: the whole published key set.
const JWKS_CACHE_KEY: &str = "jwks";

type KeySet = Arc<HashMap<String, DecodingKey>>;

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: String,
    e: String,
}

/// Google sends `email_verified` as a boolean or as the string "true"/"false".
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmailVerified {
    Flag(bool),
    Text(String),
}

impl EmailVerified {
    fn is_false(&self) -> bool {
        match self {
            EmailVerified::Flag(flag) => !flag,
            EmailVerified::Text(text) => text.eq_ignore_ascii_case("false"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoogleIdClaims {
    email: Option<String>,
    email_verified: Option<EmailVerified>,
    name: Option<String>,
}

/// Verifies Google ID tokens against Google's published signing keys.
///
/// The key set is cached as a whole for the configured period. A key id that
/// is not in the cached set is rejected without refetching, so tokens with
/// made-up key ids cannot make this service hammer Google. Concurrent misses
/// share one fetch.
pub struct GoogleIdentityVerifier {
    http_client: reqwest::Client,
    jwks_url: String,
    client_id: String,
    key_cache: Cache<&'static str, KeySet>,
}

impl GoogleIdentityVerifier {
    /// Create a new verifier.
    ///
    /// # Arguments
    /// * `config` - Client id, key endpoint, cache period and timeouts
    ///
    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: &GoogleConfig) -> Result<Self, anyhow::Error> {
        let timeout = Duration::from_secs(config.timeout_seconds);

        let http_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        tracing::info!(
            jwks_url = %config.jwks_url,
            cache_seconds = config.jwks_cache_seconds,
            timeout_seconds = config.timeout_seconds,
            "Google identity verifier initialized"
        );

        Ok(Self {
            http_client,
            jwks_url: config.jwks_url.clone(),
            client_id: config.client_id.clone(),
            key_cache: Cache::builder()
                .time_to_live(Duration::from_secs(config.jwks_cache_seconds))
                .max_capacity(1)
                .build(),
        })
    }

    async fn fetch_keys(&self) -> Result<KeySet, FederatedIdentityError> {
        tracing::debug!(jwks_url = %self.jwks_url, "Fetching Google signing keys");

        let unavailable = |e: reqwest::Error| {
            tracing::error!(jwks_url = %self.jwks_url, error = %e, "Google signing keys unavailable");
            FederatedIdentityError::ProviderUnavailable(e.to_string())
        };

        let jwks: Jwks = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;

        let keys = jwks
            .keys
            .into_iter()
            .filter(|jwk| jwk.kty == "RSA")
            .filter_map(|jwk| match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => Some((jwk.kid, key)),
                Err(e) => {
                    tracing::warn!(kid = %jwk.kid, error = %e, "Skipping unusable signing key");
                    None
                }
            })
            .collect::<HashMap<_, _>>();

        tracing::debug!(key_count = keys.len(), "Google signing keys cached");
        Ok(Arc::new(keys))
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, FederatedIdentityError> {
        let keys = self
            .key_cache
            .try_get_with(JWKS_CACHE_KEY, self.fetch_keys())
            .await
            .map_err(|e| (*e).clone())?;

        keys.get(kid).cloned().ok_or_else(|| {
            tracing::debug!(kid = %kid, "Key id not in cached Google key set");
            invalid(format!("Unknown signing key: {}", kid))
        })
    }
}

fn invalid(reason: impl Into<String>) -> FederatedIdentityError {
    FederatedIdentityError::InvalidAssertion(reason.into())
}

/// Turn verified claims into an identity, applying the email requirements.
fn identity_from_claims(claims: GoogleIdClaims) -> Result<VerifiedIdentity, FederatedIdentityError> {
    if claims
        .email_verified
        .as_ref()
        .is_some_and(EmailVerified::is_false)
    {
        return Err(invalid("Email address is not verified"));
    }

    let email = claims.email.ok_or_else(|| invalid("Missing email claim"))?;
    let email = EmailAddress::new(email).map_err(|e| invalid(e.to_string()))?;

    let display_name = claims
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| email.local_part().to_string());

    Ok(VerifiedIdentity {
        email,
        display_name,
    })
}

#[async_trait]
impl FederatedIdentityVerifier for GoogleIdentityVerifier {
    fn provider(&self) -> &'static str {
        "google"
    }

    async fn verify(&self, assertion: &str) -> Result<VerifiedIdentity, FederatedIdentityError> {
        let header = decode_header(assertion).map_err(|e| invalid(e.to_string()))?;

        if header.alg != Algorithm::RS256 {
            return Err(invalid(format!("Unexpected algorithm: {:?}", header.alg)));
        }
        let kid = header.kid.ok_or_else(|| invalid("Missing key id"))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.leeway = 0;

        let claims = decode::<GoogleIdClaims>(assertion, &key, &validation)
            .map_err(|e| {
                tracing::info!(error = %e, "Google ID token rejected");
                invalid(e.to_string())
            })?
            .claims;

        identity_from_claims(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(email: Option<&str>, verified: Option<EmailVerified>, name: Option<&str>) -> GoogleIdClaims {
        GoogleIdClaims {
            email: email.map(str::to_string),
            email_verified: verified,
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_identity_uses_name() {
        let identity =
            identity_from_claims(claims(Some("bob@x.com"), Some(EmailVerified::Flag(true)), Some(" Bob ")))
                .unwrap();

        assert_eq!(identity.email.as_str(), "bob@x.com");
        assert_eq!(identity.display_name, "Bob");
    }

    #[test]
    fn test_identity_falls_back_to_local_part() {
        let identity = identity_from_claims(claims(Some("bob.b@x.com"), None, Some(""))).unwrap();
        assert_eq!(identity.display_name, "bob.b");
    }

    #[test]
    fn test_missing_email_is_invalid() {
        let result = identity_from_claims(claims(None, None, Some("Bob")));
        assert!(matches!(result, Err(FederatedIdentityError::InvalidAssertion(_))));
    }

    #[test]
    fn test_unverified_email_is_invalid() {
        let result = identity_from_claims(claims(
            Some("bob@x.com"),
            Some(EmailVerified::Text("false".to_string())),
            None,
        ));
        assert!(matches!(result, Err(FederatedIdentityError::InvalidAssertion(_))));

        let result =
            identity_from_claims(claims(Some("bob@x.com"), Some(EmailVerified::Flag(false)), None));
        assert!(result.is_err());
    }

    #[test]
    fn test_email_verified_accepts_both_encodings() {
        let parsed: GoogleIdClaims =
            serde_json::from_str(r#"{"email":"a@x.com","email_verified":"true"}"#).unwrap();
        assert!(!parsed.email_verified.unwrap().is_false());

        let parsed: GoogleIdClaims =
            serde_json::from_str(r#"{"email":"a@x.com","email_verified":false}"#).unwrap();
        assert!(parsed.email_verified.unwrap().is_false());
    }
}
