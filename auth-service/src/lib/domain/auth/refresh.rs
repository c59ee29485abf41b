use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::domain::auth::errors::RefreshRejection;
use crate::domain::auth::errors::RotationError;
use crate::domain::auth::models::IssuedRefreshToken;
use crate::domain::auth::models::RefreshToken;
use crate::domain::auth::ports::RefreshTokenRepository;
use crate::domain::errors::StoreError;
use crate::domain::user::models::UserId;

/// Creates and rotates refresh tokens inside a caller-provided transaction.
///
/// Rotation is single-use: the presented token is revoked with a
/// compare-and-set before its successor is created, so of two concurrent
/// presentations of one token at most one can ever succeed.
#[derive(Debug, Clone)]
pub struct RefreshTokenRotator {
    lifetime: Duration,
}

impl RefreshTokenRotator {
    pub fn new(lifetime: Duration) -> Self {
        Self { lifetime }
    }

    /// Create and store a fresh refresh token for `user_id`.
    ///
    /// # Errors
    /// * `DuplicateRefreshToken` - Generated value collided
    /// * `Database` - Store operation failed
    pub async fn create<R>(
        &self,
        repository: &mut R,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<IssuedRefreshToken, StoreError>
    where
        R: RefreshTokenRepository,
    {
        let issued = RefreshToken::issue(user_id, now, self.lifetime);
        repository.save(&issued.record).await?;

        tracing::debug!(
            token_id = %issued.record.id,
            user_id = %user_id,
            expires_at = %issued.record.expires_at,
            "Refresh token created"
        );

        Ok(issued)
    }

    /// Spend `presented` and return its successor for the same user.
    ///
    /// # Errors
    /// * `NotFound` - No such token
    /// * `ExpiredOrRevoked` - Token expired, already revoked, or revoked concurrently
    /// * `Store` - Store operation failed
    pub async fn rotate<R>(
        &self,
        repository: &mut R,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedRefreshToken, RotationError>
    where
        R: RefreshTokenRepository,
    {
        let current = repository
            .find_by_hash(&auth::hash_opaque_token(presented))
            .await?
            .ok_or(RotationError::NotFound)?;

        let replay = RotationError::ExpiredOrRevoked(RefreshRejection::Revoked {
            token_id: current.id,
            user_id: current.user_id,
        });

        if current.revoked {
            return Err(replay);
        }

        if current.is_expired(now) {
            return Err(RotationError::ExpiredOrRevoked(RefreshRejection::Expired));
        }

        if !repository.revoke(&current.id).await? {
            return Err(replay);
        }

        let successor = self.create(repository, current.user_id, now).await?;

        tracing::debug!(
            revoked_token_id = %current.id,
            token_id = %successor.record.id,
            user_id = %current.user_id,
            "Refresh token rotated"
        );

        Ok(successor)
    }
}

impl Default for RefreshTokenRotator {
    fn default() -> Self {
        Self::new(Duration::days(7))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::auth::ports::Store;
    use crate::domain::auth::ports::Transaction;
    use crate::outbound::repositories::InMemoryStore;

    async fn seed_token(
        store: &InMemoryStore,
        rotator: &RefreshTokenRotator,
    ) -> IssuedRefreshToken {
        let mut tx = store.begin().await.unwrap();
        let token = rotator
            .create(&mut tx, UserId::new(), Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();
        token
    }

    #[tokio::test]
    async fn test_create_stores_token() {
        let store = InMemoryStore::new();
        let rotator = RefreshTokenRotator::default();

        let token = seed_token(&store, &rotator).await;

        let stored = store.refresh_token(&token.token).await.unwrap();
        assert_eq!(stored, token.record);
        assert_ne!(stored.token_hash, token.token);
        assert_eq!(stored.expires_at - stored.created_at, Duration::days(7));
    }

    #[tokio::test]
    async fn test_rotate_revokes_and_issues_successor() {
        let store = InMemoryStore::new();
        let rotator = RefreshTokenRotator::default();
        let original = seed_token(&store, &rotator).await;

        let mut tx = store.begin().await.unwrap();
        let successor = rotator
            .rotate(&mut tx, &original.token, Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_ne!(successor.token, original.token);
        assert_eq!(successor.record.user_id, original.record.user_id);
        assert!(!successor.record.revoked);
        assert!(store.refresh_token(&original.token).await.unwrap().revoked);
    }

    #[tokio::test]
    async fn test_rotate_unknown_token() {
        let store = InMemoryStore::new();
        let rotator = RefreshTokenRotator::default();

        let mut tx = store.begin().await.unwrap();
        let result = rotator.rotate(&mut tx, "no-such-token", Utc::now()).await;

        assert_eq!(result.unwrap_err(), RotationError::NotFound);
    }

    #[tokio::test]
    async fn test_rotate_expired_token() {
        let store = InMemoryStore::new();
        let rotator = RefreshTokenRotator::default();
        let token = seed_token(&store, &rotator).await;

        let mut tx = store.begin().await.unwrap();
        let later = token.record.expires_at;
        let result = rotator.rotate(&mut tx, &token.token, later).await;

        assert_eq!(
            result.unwrap_err(),
            RotationError::ExpiredOrRevoked(RefreshRejection::Expired)
        );
    }

    #[tokio::test]
    async fn test_spent_token_is_rejected_forever() {
        let store = InMemoryStore::new();
        let rotator = RefreshTokenRotator::default();
        let original = seed_token(&store, &rotator).await;

        let mut tx = store.begin().await.unwrap();
        rotator
            .rotate(&mut tx, &original.token, Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        for _ in 0..3 {
            let mut tx = store.begin().await.unwrap();
            let result = rotator.rotate(&mut tx, &original.token, Utc::now()).await;
            assert_eq!(
                result.unwrap_err(),
                RotationError::ExpiredOrRevoked(RefreshRejection::Revoked {
                    token_id: original.record.id,
                    user_id: original.record.user_id,
                })
            );
        }
    }

    #[tokio::test]
    async fn test_uncommitted_rotation_leaves_token_usable() {
        let store = InMemoryStore::new();
        let rotator = RefreshTokenRotator::default();
        let original = seed_token(&store, &rotator).await;

        {
            let mut tx = store.begin().await.unwrap();
            rotator
                .rotate(&mut tx, &original.token, Utc::now())
                .await
                .unwrap();
            // dropped without commit
        }

        assert!(!store.refresh_token(&original.token).await.unwrap().revoked);
        assert_eq!(store.refresh_token_count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_rotations_single_winner() {
        let store = Arc::new(InMemoryStore::new());
        let rotator = Arc::new(RefreshTokenRotator::default());
        let original = seed_token(&store, &rotator).await;

        let attempts = (0..8).map(|_| {
            let store = Arc::clone(&store);
            let rotator = Arc::clone(&rotator);
            let presented = original.token.clone();
            tokio::spawn(async move {
                let mut tx = store.begin().await?;
                let successor = rotator.rotate(&mut tx, &presented, Utc::now()).await?;
                tx.commit().await?;
                Ok::<_, RotationError>(successor)
            })
        });

        let mut successes = 0;
        let mut rejections = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            match attempt.await.unwrap() {
                Ok(_) => successes += 1,
                Err(RotationError::ExpiredOrRevoked(_)) => rejections += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(rejections, 7);
        // original plus exactly one successor
        assert_eq!(store.refresh_token_count().await, 2);
    }
}
