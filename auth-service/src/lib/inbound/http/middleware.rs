use async_trait::async_trait;
use auth::TokenError;
use axum::extract::FromRequestParts;
use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::router::AppState;

/// Caller identity taken from a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub role: String,
}

/// Outcome of the bearer filter, stored in request extensions for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    Authenticated(Identity),
    /// No bearer credentials were presented
    Anonymous,
    Rejected(TokenError),
}

/// Middleware that verifies bearer access tokens.
///
/// Never short-circuits: the outcome is attached to the request and
/// handlers that need a caller ask for it through the [`Identity`] extractor.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let authentication = match bearer_token(&req) {
        None => Authentication::Anonymous,
        Some(token) => match state.token_issuer.parse_access_token(token) {
            Ok(claims) => Authentication::Authenticated(Identity {
                subject: claims.sub,
                role: claims.role,
            }),
            Err(e) => {
                log_rejection(&e);
                Authentication::Rejected(e)
            }
        },
    };

    req.extensions_mut().insert(authentication);
    next.run(req).await
}

fn bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    scheme
        .eq_ignore_ascii_case("Bearer")
        .then(|| token.trim())
}

fn log_rejection(error: &TokenError) {
    match error {
        TokenError::Expired => tracing::debug!("Expired access token presented"),
        TokenError::Malformed(reason) => {
            tracing::info!(reason = %reason, "Malformed access token presented")
        }
        TokenError::InvalidSignature => {
            tracing::warn!("Access token with invalid signature presented")
        }
        other => tracing::warn!(error = %other, "Access token rejected"),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Authentication>() {
            Some(Authentication::Authenticated(identity)) => Ok(identity.clone()),
            Some(Authentication::Rejected(TokenError::Expired)) => {
                Err(ApiError::Unauthorized("Access token expired".to_string()))
            }
            Some(Authentication::Rejected(_)) => {
                Err(ApiError::Unauthorized("Invalid access token".to_string()))
            }
            Some(Authentication::Anonymous) | None => {
                Err(ApiError::Unauthorized("Missing bearer token".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http;

    use super::*;

    fn request(authorization: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri("/api/user/me");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&request(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&request(Some("bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&request(Some("Basic dXNlcg=="))), None);
        assert_eq!(bearer_token(&request(Some("Bearer"))), None);
        assert_eq!(bearer_token(&request(None)), None);
    }

    #[tokio::test]
    async fn test_identity_extractor() {
        let identity = Identity {
            subject: "alice".to_string(),
            role: "USER".to_string(),
        };

        let (mut parts, _) = request(None).into_parts();
        parts
            .extensions
            .insert(Authentication::Authenticated(identity.clone()));
        assert_eq!(
            Identity::from_request_parts(&mut parts, &()).await.unwrap(),
            identity
        );

        let (mut parts, _) = request(None).into_parts();
        parts
            .extensions
            .insert(Authentication::Rejected(TokenError::Expired));
        assert!(matches!(
            Identity::from_request_parts(&mut parts, &()).await,
            Err(ApiError::Unauthorized(_))
        ));

        let (mut parts, _) = request(None).into_parts();
        assert!(Identity::from_request_parts(&mut parts, &()).await.is_err());
    }
}
