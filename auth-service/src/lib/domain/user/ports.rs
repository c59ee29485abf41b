use async_trait::async_trait;

use crate::domain::errors::StoreError;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;

/// Persistence operations for the user aggregate.
///
/// Implemented by a store transaction: every call runs inside the caller's
/// unit of work and becomes visible to others only on commit.
#[async_trait]
pub trait UserRepository: Send {
    /// Retrieve user by identifier.
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn find_by_id(&mut self, id: &UserId) -> Result<Option<User>, StoreError>;

    /// Retrieve user by username.
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn find_by_username(&mut self, username: &Username) -> Result<Option<User>, StoreError>;

    /// Retrieve user by email address.
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn find_by_email(&mut self, email: &EmailAddress) -> Result<Option<User>, StoreError>;

    /// Persist a new user.
    ///
    /// # Errors
    /// * `DuplicateUsername` - Username is already taken
    /// * `DuplicateEmail` - Email is already registered
    /// * `Database` - Database operation failed
    async fn create(&mut self, user: &User) -> Result<(), StoreError>;

    /// Persist `user` unless a user with the same email exists; return whichever is stored.
    ///
    /// Concurrent callers with the same email converge on a single row.
    ///
    /// # Errors
    /// * `DuplicateUsername` - Username is already taken by a different email
    /// * `Database` - Database operation failed
    async fn create_unless_email_exists(&mut self, user: &User) -> Result<User, StoreError>;
}
