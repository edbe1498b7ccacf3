//! Typed repositories over the document store.
//!
//! A [`Repository`] binds an entity type to its tenant-scoped collection and
//! handles the JSON (de)serialization, converting parse failures into
//! data-corruption errors so callers see the taxonomy, not serde.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::store::{collection_name, CollectionKind, DocumentStore};
use crate::types::KickAiError;

/// A persistable domain entity.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Which per-team collection this entity lives in.
    const KIND: CollectionKind;
    /// Human-readable entity name for error messages.
    const NAME: &'static str;

    /// Document id within the collection.
    fn doc_id(&self) -> String;
}

/// Typed CRUD access to one entity collection.
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    collection: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: self.collection.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("collection", &self.collection)
            .finish()
    }
}

impl<T: Entity> Repository<T> {
    /// Create a repository for a tenant's collection.
    pub fn new(store: Arc<dyn DocumentStore>, team_id: &str) -> Self {
        Self {
            store,
            collection: collection_name(team_id, T::KIND),
            _marker: PhantomData,
        }
    }

    /// Create a repository over an explicit collection name (for the global
    /// teams collection).
    pub fn with_collection(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            _marker: PhantomData,
        }
    }

    /// The backing collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Insert or replace an entity.
    pub async fn save(&self, entity: &T) -> Result<(), KickAiError> {
        let value = serde_json::to_value(entity)
            .map_err(|e| KickAiError::Programming(format!("serialize {}: {e}", T::NAME)))?;
        self.store.put(&self.collection, &entity.doc_id(), &value).await
    }

    /// Fetch an entity, `None` if absent.
    pub async fn find(&self, id: &str) -> Result<Option<T>, KickAiError> {
        match self.store.get(&self.collection, id).await? {
            None => Ok(None),
            Some(value) => self.decode(id, value).map(Some),
        }
    }

    /// Fetch an entity or fail with a lookup error.
    pub async fn require(&self, id: &str) -> Result<T, KickAiError> {
        self.find(id)
            .await?
            .ok_or_else(|| KickAiError::not_found(T::NAME, id))
    }

    /// Delete an entity; returns whether it existed.
    pub async fn delete(&self, id: &str) -> Result<bool, KickAiError> {
        self.store.delete(&self.collection, id).await
    }

    /// List every entity in the collection.
    pub async fn all(&self) -> Result<Vec<T>, KickAiError> {
        let docs = self.store.list(&self.collection).await?;
        let mut entities = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = doc
                .get("player_id")
                .or_else(|| doc.get("member_id"))
                .or_else(|| doc.get("match_id"))
                .or_else(|| doc.get("team_id"))
                .and_then(Value::as_str)
                .unwrap_or("?")
                .to_owned();
            entities.push(self.decode(&id, doc)?);
        }
        Ok(entities)
    }

    fn decode(&self, id: &str, value: Value) -> Result<T, KickAiError> {
        serde_json::from_value(value).map_err(|e| KickAiError::DataCorruption {
            collection: self.collection.clone(),
            id: id.to_owned(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Player, PlayerStatus};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use serde_json::json;

    fn player(id: &str) -> Player {
        Player {
            player_id: id.to_owned(),
            team_id: "KAI".to_owned(),
            name: "John Smith".to_owned(),
            phone: Some("+447123456789".to_owned()),
            position: Some("midfielder".to_owned()),
            status: PlayerStatus::Pending,
            telegram_id: Some(42),
            username: Some("jsmith".to_owned()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_and_require() {
        let store = Arc::new(MemoryStore::new());
        let repo: Repository<Player> = Repository::new(store, "KAI");

        repo.save(&player("JS1")).await.expect("save");
        let loaded = repo.require("JS1").await.expect("require");
        assert_eq!(loaded.player_id, "JS1");

        let missing = repo.require("ZZ9").await;
        assert!(matches!(missing, Err(KickAiError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_data_corruption() {
        let store = Arc::new(MemoryStore::new());
        store
            .put("kickai_KAI_players", "JS1", &json!({"player_id": "JS1"}))
            .await
            .expect("put");

        let repo: Repository<Player> = Repository::new(store, "KAI");
        let result = repo.find("JS1").await;
        assert!(matches!(result, Err(KickAiError::DataCorruption { .. })));
    }
}
