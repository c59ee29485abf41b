use std::sync::Arc;

use auth::TokenIssuer;
use auth_service::config::Config;
use auth_service::config::StoreBackend;
use auth_service::domain::auth::models::AuthSettings;
use auth_service::domain::auth::ports::AuthServicePort;
use auth_service::domain::auth::ports::EventPublisher;
use auth_service::domain::auth::ports::Store;
use auth_service::domain::auth::service::AuthService;
use auth_service::inbound::http::router::create_router;
use auth_service::outbound::events::KafkaEventProducer;
use auth_service::outbound::events::LogEventPublisher;
use auth_service::outbound::identity::GoogleIdentityVerifier;
use auth_service::outbound::repositories::InMemoryStore;
use auth_service::outbound::repositories::PostgresStore;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "auth-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;
    config.validate()?;

    tracing::info!(
        http_port = config.server.http_port,
        store = ?config.store.backend,
        access_token_minutes = config.jwt.access_token_minutes,
        refresh_token_days = config.jwt.refresh_token_days,
        kafka = config.kafka.is_some(),
        "Configuration loaded"
    );

    let token_issuer = Arc::new(TokenIssuer::with_lifetime(
        config.jwt.secret.as_bytes(),
        chrono::Duration::minutes(config.jwt.access_token_minutes),
    )?);
    let federated_verifier = Arc::new(GoogleIdentityVerifier::new(&config.google)?);
    let settings = AuthSettings {
        refresh_token_lifetime: chrono::Duration::days(config.jwt.refresh_token_days),
        ..AuthSettings::default()
    };

    let auth_service: Arc<dyn AuthServicePort> = match &config.kafka {
        Some(kafka) => {
            let publisher = Arc::new(KafkaEventProducer::new(kafka)?);
            build_service(&config, &token_issuer, federated_verifier, publisher, settings).await?
        }
        None => {
            tracing::info!("No Kafka configured, security events go to the log");
            let publisher = Arc::new(LogEventPublisher::new());
            build_service(&config, &token_issuer, federated_verifier, publisher, settings).await?
        }
    };

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(auth_service, token_issuer);
    axum::serve(http_listener, http_application).await?;

    tracing::info!("Server exited");
    Ok(())
}

/// Wire the auth service over the configured store backend.
async fn build_service<EP: EventPublisher>(
    config: &Config,
    token_issuer: &Arc<TokenIssuer>,
    federated_verifier: Arc<GoogleIdentityVerifier>,
    event_publisher: Arc<EP>,
    settings: AuthSettings,
) -> Result<Arc<dyn AuthServicePort>, anyhow::Error> {
    match config.store.backend {
        StoreBackend::Postgres => {
            let pg_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(&config.database.url)
                .await?;
            tracing::info!(
                max_connections = config.database.max_connections,
                database = "postgresql",
                "Database connection pool created"
            );

            sqlx::migrate!("./migrations").run(&pg_pool).await?;
            tracing::info!(database = "postgresql", "Database migrations completed");

            Ok(wire(
                PostgresStore::new(pg_pool),
                token_issuer,
                federated_verifier,
                event_publisher,
                settings,
            ))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store, data is lost on restart");
            Ok(wire(
                InMemoryStore::new(),
                token_issuer,
                federated_verifier,
                event_publisher,
                settings,
            ))
        }
    }
}

fn wire<S: Store, EP: EventPublisher>(
    store: S,
    token_issuer: &Arc<TokenIssuer>,
    federated_verifier: Arc<GoogleIdentityVerifier>,
    event_publisher: Arc<EP>,
    settings: AuthSettings,
) -> Arc<dyn AuthServicePort> {
    Arc::new(AuthService::new(
        Arc::new(store),
        Arc::clone(token_issuer),
        federated_verifier,
        event_publisher,
        settings,
    ))
}
