use std::sync::Arc;

use async_trait::async_trait;
use auth::TokenIssuer;
use auth_service::domain::auth::errors::FederatedIdentityError;
use auth_service::domain::auth::models::AuthSettings;
use auth_service::domain::auth::models::VerifiedIdentity;
use auth_service::domain::auth::ports::FederatedIdentityVerifier;
use auth_service::domain::auth::service::AuthService;
use auth_service::domain::user::models::EmailAddress;
use auth_service::inbound::http::router::create_router;
use auth_service::outbound::events::LogEventPublisher;
use auth_service::outbound::repositories::InMemoryStore;
use serde_json::json;
use sqlx::postgres::PgConnectOptions;
use sqlx::postgres::PgPoolOptions;
use sqlx::Connection;
use sqlx::Executor;
use sqlx::PgConnection;
use sqlx::PgPool;

pub const TEST_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

/// Accepts assertions of the form `valid:<email>:<name>`.
///
/// `unavailable` simulates a provider outage; anything else is rejected.
pub struct StubIdentityVerifier;

#[async_trait]
impl FederatedIdentityVerifier for StubIdentityVerifier {
    fn provider(&self) -> &'static str {
        "stub"
    }

    async fn verify(&self, assertion: &str) -> Result<VerifiedIdentity, FederatedIdentityError> {
        if assertion == "unavailable" {
            return Err(FederatedIdentityError::ProviderUnavailable(
                "connection refused".to_string(),
            ));
        }

        let mut parts = assertion.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("valid"), Some(email), Some(name)) => Ok(VerifiedIdentity {
                email: EmailAddress::new(email.to_string())
                    .map_err(|e| FederatedIdentityError::InvalidAssertion(e.to_string()))?,
                display_name: name.to_string(),
            }),
            _ => Err(FederatedIdentityError::InvalidAssertion(
                "signature mismatch".to_string(),
            )),
        }
    }
}

/// Test application that spawns a real server
pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub api_client: reqwest::Client,
    pub token_issuer: Arc<TokenIssuer>,
}

impl TestApp {
    /// Spawn the application in a background task and return TestApp
    pub async fn spawn() -> Self {
        // Use random port (0 = OS assigns)
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let store = Arc::new(InMemoryStore::new());
        let token_issuer =
            Arc::new(TokenIssuer::new(TEST_SECRET).expect("Failed to create token issuer"));

        let auth_service = Arc::new(AuthService::new(
            Arc::clone(&store),
            Arc::clone(&token_issuer),
            Arc::new(StubIdentityVerifier),
            Arc::new(LogEventPublisher::new()),
            AuthSettings::default(),
        ));

        let router = create_router(auth_service, Arc::clone(&token_issuer));

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Server error");
        });

        Self {
            address,
            store,
            api_client: reqwest::Client::new(),
            token_issuer,
        }
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(format!("{}{}", self.address, path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(format!("{}{}", self.address, path))
    }

    /// Helper to make GET request with Bearer token
    pub fn get_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.get(path).bearer_auth(token)
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> reqwest::Response {
        self.post("/api/auth/register")
            .json(&json!({
                "username": username,
                "email": email,
                "password": password
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.post("/api/auth/login")
            .json(&json!({
                "username": username,
                "password": password
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.post("/api/auth/refresh")
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn google_login(&self, token: &str) -> reqwest::Response {
        self.post("/api/auth/google")
            .json(&json!({ "token": token }))
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// Test database helper
pub struct TestDb {
    pub pool: PgPool,
    pub db_name: String,
    postgres_url: String,
}

impl TestDb {
    /// Create a fresh migrated database, or `None` when `DATABASE_URL` is unset.
    pub async fn new() -> Option<Self> {
        let Ok(postgres_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping Postgres test");
            return None;
        };

        let db_name = format!(
            "test_auth_service_{}",
            uuid::Uuid::new_v4().to_string().replace('-', "_")
        );

        let mut conn = PgConnection::connect(&postgres_url)
            .await
            .expect("Failed to connect to Postgres");

        conn.execute(format!(r#"CREATE DATABASE "{}";"#, db_name).as_str())
            .await
            .expect("Failed to create test database");

        let options = postgres_url
            .parse::<PgConnectOptions>()
            .expect("Failed to parse DATABASE_URL")
            .database(&db_name);

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        Some(Self {
            pool,
            db_name,
            postgres_url,
        })
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        // Database cleanup happens asynchronously
        let db_name = self.db_name.clone();
        let postgres_url = self.postgres_url.clone();
        tokio::spawn(async move {
            if let Ok(mut conn) = PgConnection::connect(&postgres_url).await {
                let _ = conn
                    .execute(
                        format!(
                            r#"SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = '{}' AND pid <> pg_backend_pid();"#,
                            db_name
                        )
                        .as_str(),
                    )
                    .await;

                let _ = conn
                    .execute(format!(r#"DROP DATABASE IF EXISTS "{}";"#, db_name).as_str())
                    .await;
            }
        });
    }
}
