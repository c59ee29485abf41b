use std::env;

use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub jwt: JwtConfig,
    pub google: GoogleConfig,
    pub kafka: Option<KafkaConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Deserialize, Clone)]
pub struct JwtConfig {
    #[serde(default)]
    pub secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

// Keep the signing secret out of startup logs.
impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"***")
            .field("access_token_minutes", &self.access_token_minutes)
            .field("refresh_token_days", &self.refresh_token_days)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GoogleConfig {
    #[serde(default)]
    pub client_id: String,
    pub jwks_url: String,
    pub jwks_cache_seconds: u64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
}

fn default_max_connections() -> u32 {
    5
}

impl Config {
    /// Shortest accepted signing secret, in bytes.
    pub const MIN_SECRET_LENGTH: usize = 32;
    /// Longest accepted access token lifetime: one day.
    pub const MAX_ACCESS_TOKEN_MINUTES: i64 = 24 * 60;
    /// Longest accepted refresh token lifetime: one year.
    pub const MAX_REFRESH_TOKEN_DAYS: i64 = 365;

    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (JWT__SECRET, DATABASE__URL, GOOGLE__CLIENT_ID, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Example: JWT__SECRET=... overrides jwt.secret
            .add_source(Environment::default().separator("__"))
            .build()?;

        let config: Config = configuration.try_deserialize()?;

        Ok(config)
    }

    /// Reject settings the service cannot safely start with.
    ///
    /// # Errors
    /// * `Message` - Secret missing or shorter than 32 bytes, client id empty,
    ///   or token lifetimes outside their accepted range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < Self::MIN_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "jwt.secret must be at least {} bytes, got {}",
                Self::MIN_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.google.client_id.trim().is_empty() {
            return Err(ConfigError::Message(
                "google.client_id must be set".to_string(),
            ));
        }
        if !(1..=Self::MAX_ACCESS_TOKEN_MINUTES).contains(&self.jwt.access_token_minutes) {
            return Err(ConfigError::Message(format!(
                "jwt.access_token_minutes must be between 1 and {}, got {}",
                Self::MAX_ACCESS_TOKEN_MINUTES,
                self.jwt.access_token_minutes
            )));
        }
        if !(1..=Self::MAX_REFRESH_TOKEN_DAYS).contains(&self.jwt.refresh_token_days) {
            return Err(ConfigError::Message(format!(
                "jwt.refresh_token_days must be between 1 and {}, got {}",
                Self::MAX_REFRESH_TOKEN_DAYS,
                self.jwt.refresh_token_days
            )));
        }
        Ok(())
    }
}
