//! User lookup by id, read through the `user_data:<id>` cache.

use std::sync::Arc;

use meetsmatch_core::models::User;
use tracing::warn;

use crate::cache::{CacheLayer, TtlClass, user_key};
use crate::error::{MatchError, MatchResult};
use crate::storage::MatchDatabase;

pub struct UserDirectory {
    db: MatchDatabase,
    cache: Arc<CacheLayer>,
}

impl UserDirectory {
    pub const fn new(db: MatchDatabase, cache: Arc<CacheLayer>) -> Self {
        Self { db, cache }
    }

    /// Load a user snapshot. Cache failures fall through to the database.
    pub async fn get(&self, user_id: &str) -> MatchResult<User> {
        let key = user_key(user_id);
        match self.cache.get::<User>(&key).await {
            Ok(Some(user)) => return Ok(user),
            Ok(None) => {}
            Err(e) => warn!(user_id, error = %e, "User cache read failed"),
        }

        let user = self
            .db
            .get_user(user_id)
            .await
            .map_err(MatchError::internal("GetUser"))?;

        if let Err(e) = self.cache.set(&key, &user, TtlClass::User).await {
            warn!(user_id, error = %e, "User cache write failed");
        }
        Ok(user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use meetsmatch_core::config::CacheConfig;

    #[tokio::test]
    async fn reads_through_and_serves_from_cache() {
        let db = MatchDatabase::open_in_memory().await.unwrap();
        let cache = Arc::new(CacheLayer::new(
            Arc::new(MemoryStore::new()),
            CacheConfig::default(),
        ));
        let dir = UserDirectory::new(db.clone(), Arc::clone(&cache));

        let alice = User {
            id: "alice".into(),
            first_name: "Alice".into(),
            ..User::default()
        };
        db.upsert_user(&alice).await.unwrap();

        assert_eq!(dir.get("alice").await.unwrap(), alice);
        assert_eq!(cache.stats().misses, 1);

        // Served from cache even after the row changes.
        let mut renamed = alice.clone();
        renamed.first_name = "Al".into();
        db.upsert_user(&renamed).await.unwrap();
        assert_eq!(dir.get("alice").await.unwrap().first_name, "Alice");
        assert_eq!(cache.stats().hits, 1);

        cache.invalidate_user("alice").await.unwrap();
        assert_eq!(dir.get("alice").await.unwrap().first_name, "Al");
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let db = MatchDatabase::open_in_memory().await.unwrap();
        let dir = UserDirectory::new(db, Arc::new(CacheLayer::disabled()));
        assert!(matches!(dir.get("ghost").await, Err(MatchError::NotFound(_))));
    }
}
