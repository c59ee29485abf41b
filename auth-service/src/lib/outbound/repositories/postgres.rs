use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::Postgres;
use uuid::Uuid;

use crate::domain::auth::models::RefreshToken;
use crate::domain::auth::models::RefreshTokenId;
use crate::domain::auth::ports::RefreshTokenRepository;
use crate::domain::auth::ports::Store;
use crate::domain::auth::ports::Transaction;
use crate::domain::errors::StoreError;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserRepository;

/// PostgreSQL implementation of the durable store.
///
/// Each flow gets its own database transaction; refresh tokens are read with
/// `FOR UPDATE` so a concurrent rotation of the same row waits for the first
/// one to finish.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store.
    ///
    /// # Arguments
    /// * `pool` - PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction, StoreError> {
        let tx = self.pool.begin().await.map_err(database_error)?;
        Ok(PostgresTransaction { tx })
    }
}

/// Open database transaction; rolled back by sqlx when dropped uncommitted.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId(row.id),
            username: Username::new(row.username)
                .map_err(|e| StoreError::CorruptRecord(e.to_string()))?,
            email: EmailAddress::new(row.email)
                .map_err(|e| StoreError::CorruptRecord(e.to_string()))?,
            password_hash: row.password_hash,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    token_hash: String,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshToken {
            id: RefreshTokenId(row.id),
            token_hash: row.token_hash,
            user_id: UserId(row.user_id),
            created_at: row.created_at,
            expires_at: row.expires_at,
            revoked: row.revoked,
        }
    }
}

fn database_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// Map unique-constraint violations on `users` to their domain kinds.
fn user_write_error(e: sqlx::Error, user: &User) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            if db_err.constraint() == Some("users_username_key") {
                return StoreError::DuplicateUsername(user.username.to_string());
            }
            if db_err.constraint() == Some("users_email_key") {
                return StoreError::DuplicateEmail(user.email.to_string());
            }
        }
    }
    database_error(e)
}

const SELECT_USER: &str = r#"
    SELECT id, username, email, password_hash, created_at
    FROM users
"#;

impl PostgresTransaction {
    async fn fetch_user(
        &mut self,
        filter: &str,
        value: &str,
    ) -> Result<Option<User>, StoreError> {
        let query = format!("{} WHERE {} = $1", SELECT_USER, filter);

        sqlx::query_as::<_, UserRow>(&query)
            .bind(value)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(database_error)?
            .map(User::try_from)
            .transpose()
    }
}

#[async_trait]
impl UserRepository for PostgresTransaction {
    async fn find_by_id(&mut self, id: &UserId) -> Result<Option<User>, StoreError> {
        let query = format!("{} WHERE id = $1", SELECT_USER);

        sqlx::query_as::<_, UserRow>(&query)
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(database_error)?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_username(&mut self, username: &Username) -> Result<Option<User>, StoreError> {
        self.fetch_user("username", username.as_str()).await
    }

    async fn find_by_email(&mut self, email: &EmailAddress) -> Result<Option<User>, StoreError> {
        self.fetch_user("email", email.as_str()).await
    }

    async fn create(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id.0)
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| user_write_error(e, user))?;

        tracing::debug!(user_id = %user.id, "User row inserted");
        Ok(())
    }

    async fn create_unless_email_exists(&mut self, user: &User) -> Result<User, StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(user.id.0)
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| user_write_error(e, user))?
        .rows_affected();

        if inserted == 1 {
            tracing::debug!(user_id = %user.id, "User row inserted");
            return Ok(user.clone());
        }

        self.find_by_email(&user.email).await?.ok_or_else(|| {
            StoreError::Database(format!(
                "User with email {} vanished after insert conflict",
                user.email
            ))
        })
    }
}

#[async_trait]
impl RefreshTokenRepository for PostgresTransaction {
    async fn save(&mut self, token: &RefreshToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, token_hash, user_id, created_at, expires_at, revoked)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.id.0)
        .bind(&token.token_hash)
        .bind(token.user_id.0)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.revoked)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => StoreError::DuplicateRefreshToken,
            _ => database_error(e),
        })?;

        Ok(())
    }

    async fn find_by_hash(
        &mut self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT id, token_hash, user_id, created_at, expires_at, revoked
            FROM refresh_tokens
            WHERE token_hash = $1
            FOR UPDATE
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(database_error)?;

        Ok(row.map(RefreshToken::from))
    }

    async fn revoke(&mut self, id: &RefreshTokenId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE id = $1 AND revoked = FALSE
            "#,
        )
        .bind(id.0)
        .execute(&mut *self.tx)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(database_error)
    }
}
