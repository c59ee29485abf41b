use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;

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

#[derive(Debug, Default, Clone)]
struct State {
    users: HashMap<UserId, User>,
    /// Keyed by token digest
    refresh_tokens: HashMap<String, RefreshToken>,
}

/// Process-local store for development and tests.
///
/// Transactions are fully serialized: `begin` takes an exclusive lock held
/// until the transaction is committed or dropped, and writes are staged on a
/// copy of the state that only replaces it on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed refresh token record for this plaintext value, if any.
    pub async fn refresh_token(&self, token: &str) -> Option<RefreshToken> {
        self.state
            .lock()
            .await
            .refresh_tokens
            .get(&auth::hash_opaque_token(token))
            .cloned()
    }

    pub async fn refresh_token_count(&self) -> usize {
        self.state.lock().await.refresh_tokens.len()
    }

    /// Committed users, oldest first.
    pub async fn users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.state.lock().await.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        users
    }

    pub async fn user_count(&self) -> usize {
        self.state.lock().await.users.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();

        Ok(InMemoryTransaction { guard, staged })
    }
}

pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<State>,
    staged: State,
}

impl InMemoryTransaction {
    fn check_unique(&self, user: &User) -> Result<(), StoreError> {
        for existing in self.staged.users.values() {
            if existing.username == user.username {
                return Err(StoreError::DuplicateUsername(user.username.to_string()));
            }
            if existing.email == user.email {
                return Err(StoreError::DuplicateEmail(user.email.to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryTransaction {
    async fn find_by_id(&mut self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.staged.users.get(id).cloned())
    }

    async fn find_by_username(&mut self, username: &Username) -> Result<Option<User>, StoreError> {
        Ok(self
            .staged
            .users
            .values()
            .find(|u| &u.username == username)
            .cloned())
    }

    async fn find_by_email(&mut self, email: &EmailAddress) -> Result<Option<User>, StoreError> {
        Ok(self
            .staged
            .users
            .values()
            .find(|u| &u.email == email)
            .cloned())
    }

    async fn create(&mut self, user: &User) -> Result<(), StoreError> {
        self.check_unique(user)?;
        self.staged.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn create_unless_email_exists(&mut self, user: &User) -> Result<User, StoreError> {
        if let Some(existing) = self.find_by_email(&user.email).await? {
            return Ok(existing);
        }

        self.create(user).await?;
        Ok(user.clone())
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryTransaction {
    async fn save(&mut self, token: &RefreshToken) -> Result<(), StoreError> {
        if self.staged.refresh_tokens.contains_key(&token.token_hash) {
            return Err(StoreError::DuplicateRefreshToken);
        }
        self.staged
            .refresh_tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_by_hash(
        &mut self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, StoreError> {
        Ok(self.staged.refresh_tokens.get(token_hash).cloned())
    }

    async fn revoke(&mut self, id: &RefreshTokenId) -> Result<bool, StoreError> {
        match self
            .staged
            .refresh_tokens
            .values_mut()
            .find(|t| &t.id == id)
        {
            Some(token) if !token.revoked => {
                token.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(mut self) -> Result<(), StoreError> {
        *self.guard = self.staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use chrono::Utc;

    use super::*;

    fn user(username: &str, email: &str) -> User {
        User {
            id: UserId::new(),
            username: Username::new(username.to_string()).unwrap(),
            email: EmailAddress::new(email.to_string()).unwrap(),
            password_hash: "hash".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = InMemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.create(&user("alice", "alice@x.com")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_drop_discards_writes() {
        let store = InMemoryStore::new();

        {
            let mut tx = store.begin().await.unwrap();
            tx.create(&user("alice", "alice@x.com")).await.unwrap();
        }

        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create(&user("alice", "alice@x.com")).await.unwrap();

        assert_eq!(
            tx.create(&user("alice", "other@x.com")).await.unwrap_err(),
            StoreError::DuplicateUsername("alice".to_string())
        );
        assert_eq!(
            tx.create(&user("bob", "alice@x.com")).await.unwrap_err(),
            StoreError::DuplicateEmail("alice@x.com".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_unless_email_exists_returns_existing() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let first = user("alice", "alice@x.com");
        tx.create(&first).await.unwrap();

        let stored = tx
            .create_unless_email_exists(&user("alice2", "alice@x.com"))
            .await
            .unwrap();

        assert_eq!(stored.id, first.id);
    }

    #[tokio::test]
    async fn test_revoke_is_compare_and_set() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let token = RefreshToken::issue(UserId::new(), Utc::now(), Duration::days(7)).record;
        tx.save(&token).await.unwrap();

        assert!(tx.revoke(&token.id).await.unwrap());
        assert!(!tx.revoke(&token.id).await.unwrap());
        assert!(!tx.revoke(&RefreshTokenId::new()).await.unwrap());
        assert_eq!(
            tx.save(&token).await.unwrap_err(),
            StoreError::DuplicateRefreshToken
        );
    }
}
