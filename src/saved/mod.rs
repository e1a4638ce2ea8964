//! Per-user saved items, persisted as one record per user.
//!
//! Each user's whole collection is a single row holding a JSON list, read
//! and rewritten as a unit. Every read-modify-write in a store instance goes
//! through one async mutex, across all users, so two saves can never race
//! and lose an item.

pub mod errors;
pub mod models;

pub use errors::StoreError;
pub use models::{DeleteOutcome, ItemKey, SaveOutcome, SavedItem, UserCollection};

use chrono::Utc;
use sqlx::{Pool, Sqlite};
use std::future::Future;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Most keys accepted by a single membership check.
pub const MAX_CHECK_KEYS: usize = 100;

pub struct SavedItemStore {
    pool: Pool<Sqlite>,
    write_gate: Mutex<()>,
}

impl SavedItemStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            write_gate: Mutex::new(()),
        }
    }

    /// The user's collection; empty when nothing is stored or the record is unreadable.
    pub async fn load(
        &self,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<UserCollection, StoreError> {
        let user_id = valid_user(user_id)?;
        with_cancel(cancel, self.read_collection(user_id)).await
    }

    /// Saved items, newest first, optionally capped.
    pub async fn list(
        &self,
        user_id: &str,
        cap: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<Vec<SavedItem>, StoreError> {
        Ok(self.load(user_id, cancel).await?.most_recent(cap))
    }

    /// Insert the item unless an item with the same key is already saved.
    pub async fn save(
        &self,
        user_id: &str,
        mut item: SavedItem,
        cancel: &CancellationToken,
    ) -> Result<SaveOutcome, StoreError> {
        let user_id = valid_user(user_id)?;
        item.saved_at = Utc::now().timestamp();
        if item.id.is_empty() {
            item.id = uuid::Uuid::new_v4().to_string();
        }

        with_cancel(cancel, async {
            let _guard = self.write_gate.lock().await;
            let mut collection = self.read_collection(user_id).await?;

            if !collection.insert(item) {
                log::debug!("Item already saved for user {}, skipping", user_id);
                return Ok(SaveOutcome::AlreadyPresent);
            }

            self.write_collection(&collection).await?;
            log::info!(
                "Saved item for user {} ({} items total)",
                user_id,
                collection.len()
            );
            Ok(SaveOutcome::Saved)
        })
        .await
    }

    pub async fn delete(
        &self,
        user_id: &str,
        key: &ItemKey,
        cancel: &CancellationToken,
    ) -> Result<DeleteOutcome, StoreError> {
        let user_id = valid_user(user_id)?;

        with_cancel(cancel, async {
            let _guard = self.write_gate.lock().await;
            let mut collection = self.read_collection(user_id).await?;

            if !collection.remove(key) {
                return Ok(DeleteOutcome::NotFound);
            }

            self.write_collection(&collection).await?;
            log::info!("Deleted saved {} '{}' for user {}", key.kind, key.name, user_id);
            Ok(DeleteOutcome::Deleted)
        })
        .await
    }

    /// Which of `keys` are saved for the user, in query order.
    pub async fn check_many(
        &self,
        user_id: &str,
        keys: &[ItemKey],
        cancel: &CancellationToken,
    ) -> Result<Vec<ItemKey>, StoreError> {
        valid_user(user_id)?;
        if keys.len() > MAX_CHECK_KEYS {
            return Err(StoreError::TooManyKeys(keys.len(), MAX_CHECK_KEYS));
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let collection = self.load(user_id, cancel).await?;
        Ok(keys
            .iter()
            .filter(|k| collection.contains(k))
            .cloned()
            .collect())
    }

    async fn read_collection(&self, user_id: &str) -> Result<UserCollection, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT items_json FROM saved_collections WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((items_json,)) = row else {
            return Ok(UserCollection::empty(user_id));
        };

        match serde_json::from_str::<Vec<SavedItem>>(&items_json) {
            Ok(items) => Ok(UserCollection {
                user_id: user_id.to_string(),
                items,
            }),
            Err(e) => {
                log::warn!(
                    "Saved collection for user {} is unreadable, treating as empty: {}",
                    user_id,
                    e
                );
                Ok(UserCollection::empty(user_id))
            }
        }
    }

    async fn write_collection(&self, collection: &UserCollection) -> Result<(), StoreError> {
        let items_json = serde_json::to_string(&collection.items)?;

        sqlx::query(
            r#"
            INSERT INTO saved_collections (user_id, items_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                items_json = excluded.items_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&collection.user_id)
        .bind(&items_json)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn valid_user(user_id: &str) -> Result<&str, StoreError> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        Err(StoreError::InvalidUser)
    } else {
        Ok(trimmed)
    }
}

async fn with_cancel<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    if cancel.is_cancelled() {
        return Err(StoreError::Cancelled);
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(StoreError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;
    use crate::models::EntityKind;
    use crate::recommendations::links::build_links;
    use crate::recommendations::RecommendationResult;
    use std::sync::Arc;

    async fn store() -> SavedItemStore {
        let db = DatabaseManager::in_memory().await.unwrap();
        SavedItemStore::new(db.pool)
    }

    fn album(name: &str, artist: &str) -> SavedItem {
        SavedItem::new(name, artist, EntityKind::Album)
    }

    #[tokio::test]
    async fn test_saving_twice_stores_one_item() {
        let store = store().await;
        let cancel = CancellationToken::new();

        let first = store.save("alice", album("OK Computer", "Radiohead"), &cancel).await.unwrap();
        let second = store.save("alice", album("ok computer", "RADIOHEAD"), &cancel).await.unwrap();

        assert_eq!(first, SaveOutcome::Saved);
        assert_eq!(second, SaveOutcome::AlreadyPresent);
        assert_eq!(store.load("alice", &cancel).await.unwrap().len(), 1);

        let present = store
            .check_many(
                "alice",
                &[ItemKey::new("OK Computer", "Radiohead", EntityKind::Album)],
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(present.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_then_delete_again() {
        let store = store().await;
        let cancel = CancellationToken::new();
        store.save("alice", album("Kid A", "Radiohead"), &cancel).await.unwrap();

        let key = ItemKey::new("KID A", "radiohead", EntityKind::Album);
        assert_eq!(store.delete("alice", &key, &cancel).await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(store.delete("alice", &key, &cancel).await.unwrap(), DeleteOutcome::NotFound);
        assert!(store.load("alice", &cancel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_many_handles_punctuation_in_names() {
        let store = store().await;
        let cancel = CancellationToken::new();
        store
            .save("alice", SavedItem::new("Hello, Goodbye", "The Beatles", EntityKind::Track), &cancel)
            .await
            .unwrap();
        store
            .save("alice", SavedItem::new("Crosby, Stills & Nash", "Crosby, Stills & Nash", EntityKind::Album), &cancel)
            .await
            .unwrap();

        let keys = vec![
            ItemKey::new("Hello, Goodbye", "The Beatles", EntityKind::Track),
            ItemKey::new("Hello", "Goodbye, The Beatles", EntityKind::Track),
            ItemKey::new("Crosby, Stills & Nash", "Crosby, Stills & Nash", EntityKind::Album),
            ItemKey::new("Crosby, Stills & Nash", "Crosby, Stills & Nash", EntityKind::Artist),
        ];
        let present = store.check_many("alice", &keys, &cancel).await.unwrap();

        assert_eq!(present, vec![keys[0].clone(), keys[2].clone()]);
    }

    #[tokio::test]
    async fn test_collections_are_per_user() {
        let store = store().await;
        let cancel = CancellationToken::new();
        store.save("alice", album("Kid A", "Radiohead"), &cancel).await.unwrap();

        assert!(store.load("bob", &cancel).await.unwrap().is_empty());
        let key = ItemKey::new("Kid A", "Radiohead", EntityKind::Album);
        assert_eq!(store.delete("bob", &key, &cancel).await.unwrap(), DeleteOutcome::NotFound);
        assert_eq!(store.load("alice", &cancel).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_is_newest_first_with_cap() {
        let store = store().await;
        let cancel = CancellationToken::new();
        for name in ["Pablo Honey", "The Bends", "OK Computer"] {
            store.save("alice", album(name, "Radiohead"), &cancel).await.unwrap();
        }

        let all = store.list("alice", None, &cancel).await.unwrap();
        let names: Vec<&str> = all.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["OK Computer", "The Bends", "Pablo Honey"]);

        let capped = store.list("alice", Some(1), &cancel).await.unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].name, "OK Computer");
    }

    #[tokio::test]
    async fn test_concurrent_saves_are_not_lost() {
        let store = Arc::new(store().await);
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let user = if i % 2 == 0 { "alice" } else { "bob" };
                store
                    .save(user, album(&format!("Album {}", i), "Various"), &CancellationToken::new())
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), SaveOutcome::Saved);
        }

        let cancel = CancellationToken::new();
        assert_eq!(store.load("alice", &cancel).await.unwrap().len(), 10);
        assert_eq!(store.load("bob", &cancel).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_corrupt_record_reads_as_empty() {
        let db = DatabaseManager::in_memory().await.unwrap();
        sqlx::query("INSERT INTO saved_collections (user_id, items_json, updated_at) VALUES (?, ?, ?)")
            .bind("alice")
            .bind("{ not json")
            .bind(0_i64)
            .execute(&db.pool)
            .await
            .unwrap();
        let store = SavedItemStore::new(db.pool);
        let cancel = CancellationToken::new();

        assert!(store.load("alice", &cancel).await.unwrap().is_empty());
        assert_eq!(
            store.save("alice", album("Kid A", "Radiohead"), &cancel).await.unwrap(),
            SaveOutcome::Saved
        );
        assert_eq!(store.load("alice", &cancel).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_collection_survives_reopen() {
        let path = std::env::temp_dir().join(format!("saved-{}.db", uuid::Uuid::new_v4()));
        let cancel = CancellationToken::new();
        {
            let db = DatabaseManager::new(&path).await.unwrap();
            let store = SavedItemStore::new(db.pool.clone());
            store.save("alice", album("In Rainbows", "Radiohead"), &cancel).await.unwrap();
            db.pool.close().await;
        }

        let db = DatabaseManager::new(&path).await.unwrap();
        let store = SavedItemStore::new(db.pool.clone());
        let items = store.list("alice", None, &cancel).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "In Rainbows");
        assert!(items[0].saved_at > 0);
        db.pool.close().await;
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_too_many_keys_rejected() {
        let store = store().await;
        let keys: Vec<ItemKey> = (0..=MAX_CHECK_KEYS)
            .map(|i| ItemKey::new(format!("T{}", i), "A", EntityKind::Track))
            .collect();
        let result = store.check_many("alice", &keys, &CancellationToken::new()).await;
        assert!(matches!(result, Err(StoreError::TooManyKeys(101, 100))));
    }

    #[tokio::test]
    async fn test_cancelled_and_invalid_user() {
        let store = store().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            store.save("alice", album("Kid A", "Radiohead"), &cancel).await,
            Err(StoreError::Cancelled)
        ));
        assert!(matches!(
            store.load("  ", &CancellationToken::new()).await,
            Err(StoreError::InvalidUser)
        ));
        assert!(store.load("alice", &CancellationToken::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_many_rejects_blank_user_even_without_keys() {
        let store = store().await;
        let cancel = CancellationToken::new();
        assert!(matches!(
            store.check_many(" ", &[], &cancel).await,
            Err(StoreError::InvalidUser)
        ));
        assert!(store.check_many("alice", &[], &cancel).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_saved_recommendation_is_found_by_its_key() {
        let store = store().await;
        let cancel = CancellationToken::new();
        let result = RecommendationResult {
            name: "Glory Box".to_string(),
            artist: "Portishead".to_string(),
            image_url: None,
            match_score: 0.7,
            tags: Vec::new(),
            kind: EntityKind::Track,
            links: build_links(EntityKind::Track, "Glory Box", "Portishead", None, "u"),
        };

        let outcome = store.save("alice", SavedItem::from(&result), &cancel).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Saved);

        let key = ItemKey::new("glory box", "PORTISHEAD", EntityKind::Track);
        assert_eq!(store.check_many("alice", &[key.clone()], &cancel).await.unwrap(), vec![key]);
        let items = store.list("alice", None, &cancel).await.unwrap();
        assert_eq!(items[0].score, 0.7);
        assert_eq!(items[0].link, "u");
    }
}
