//! Tenant-scoped document storage.
//!
//! Documents are JSON objects addressed by `(collection, id)`. Collections
//! are derived from the tenant: `kickai_<team_id>_players`,
//! `kickai_<team_id>_team_members`, `kickai_<team_id>_matches`,
//! `kickai_<team_id>_attendance`, plus the global `kickai_teams`. Ids are
//! stringly-typed (`{team_id}_{match_id}_{player_id}` for attendance) so
//! direct lookup needs no secondary indexes.
//!
//! Two backends: [`SqliteStore`] for production (WAL-mode SQLite, migration
//! applied inline on open) and [`MemoryStore`] for tests.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::types::KickAiError;

/// The kinds of per-team collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Playing-squad records.
    Players,
    /// Leadership-side members.
    TeamMembers,
    /// Fixtures.
    Matches,
    /// Per-match availability records.
    Attendance,
    /// Tenant records (normally addressed via the global collection).
    Teams,
}

impl CollectionKind {
    /// Collection name suffix.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Players => "players",
            Self::TeamMembers => "team_members",
            Self::Matches => "matches",
            Self::Attendance => "attendance",
            Self::Teams => "teams",
        }
    }
}

/// Name of a tenant-scoped collection.
pub fn collection_name(team_id: &str, kind: CollectionKind) -> String {
    format!("kickai_{team_id}_{}", kind.suffix())
}

/// Name of the global teams collection.
pub const TEAMS_COLLECTION: &str = "kickai_teams";

/// Abstract JSON document store.
///
/// Implementations are shared across tasks and must be safe for concurrent
/// use; they are stateless over persistent storage.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace a document.
    async fn put(&self, collection: &str, id: &str, doc: &Value) -> Result<(), KickAiError>;

    /// Fetch a document, `None` if absent.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, KickAiError>;

    /// Delete a document; returns whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, KickAiError>;

    /// List every document in a collection, ordered by id.
    async fn list(&self, collection: &str) -> Result<Vec<Value>, KickAiError>;

    /// Connectivity probe used by the startup validator.
    async fn ping(&self) -> Result<(), KickAiError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store for tests and offline runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, BTreeMap<String, Value>>>, KickAiError> {
        self.collections
            .lock()
            .map_err(|_| KickAiError::unavailable("database", "store lock poisoned"))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put(&self, collection: &str, id: &str, doc: &Value) -> Result<(), KickAiError> {
        let mut map = self.lock()?;
        map.entry(collection.to_owned())
            .or_default()
            .insert(id.to_owned(), doc.clone());
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, KickAiError> {
        let map = self.lock()?;
        Ok(map.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, KickAiError> {
        let mut map = self.lock()?;
        Ok(map
            .get_mut(collection)
            .map(|c| c.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>, KickAiError> {
        let map = self.lock()?;
        Ok(map
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), KickAiError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// SQLite-backed document store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the store at the given path and apply migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migration fails.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create store directory {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .pragma("trusted_schema", "OFF")
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open document store at {}", path.display()))?;

        let migration_sql = include_str!("../../migrations/001_documents.sql");
        sqlx::raw_sql(migration_sql)
            .execute(&pool)
            .await
            .context("failed to apply document store migration")?;

        Ok(Self { pool })
    }

    fn db_err(e: sqlx::Error) -> KickAiError {
        KickAiError::unavailable("database", e.to_string())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn put(&self, collection: &str, id: &str, doc: &Value) -> Result<(), KickAiError> {
        let body = doc.to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO documents (collection, id, body, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .bind(now)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(Self::db_err)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, KickAiError> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::db_err)?;

        match row {
            None => Ok(None),
            Some(row) => {
                let body: String = row.get(0);
                let value = serde_json::from_str(&body).map_err(|e| KickAiError::DataCorruption {
                    collection: collection.to_owned(),
                    id: id.to_owned(),
                    reason: e.to_string(),
                })?;
                Ok(Some(value))
            }
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, KickAiError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Self::db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>, KickAiError> {
        let rows = sqlx::query("SELECT id, body FROM documents WHERE collection = ? ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::db_err)?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get(0);
            let body: String = row.get(1);
            let value = serde_json::from_str(&body).map_err(|e| KickAiError::DataCorruption {
                collection: collection.to_owned(),
                id,
                reason: e.to_string(),
            })?;
            docs.push(value);
        }
        Ok(docs)
    }

    async fn ping(&self) -> Result<(), KickAiError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(Self::db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_naming() {
        assert_eq!(
            collection_name("KAI", CollectionKind::Players),
            "kickai_KAI_players"
        );
        assert_eq!(
            collection_name("KAI", CollectionKind::Attendance),
            "kickai_KAI_attendance"
        );
        assert_eq!(TEAMS_COLLECTION, "kickai_teams");
    }

    #[tokio::test]
    async fn test_memory_store_crud() {
        let store = MemoryStore::new();
        let doc = json!({"player_id": "JS1", "name": "John Smith"});

        store.put("kickai_KAI_players", "JS1", &doc).await.expect("put");
        let fetched = store.get("kickai_KAI_players", "JS1").await.expect("get");
        assert_eq!(fetched, Some(doc));

        assert!(store.delete("kickai_KAI_players", "JS1").await.expect("delete"));
        assert!(!store.delete("kickai_KAI_players", "JS1").await.expect("delete"));
        assert_eq!(store.get("kickai_KAI_players", "JS1").await.expect("get"), None);
    }

    #[tokio::test]
    async fn test_memory_store_list_is_ordered() {
        let store = MemoryStore::new();
        for id in ["B2", "A1", "C3"] {
            store
                .put("c", id, &json!({ "id": id }))
                .await
                .expect("put");
        }
        let docs = store.list("c").await.expect("list");
        let ids: Vec<&str> = docs.iter().filter_map(|d| d["id"].as_str()).collect();
        assert_eq!(ids, vec!["A1", "B2", "C3"]);
    }

    #[tokio::test]
    async fn test_sqlite_store_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(&dir.path().join("test.db"))
            .await
            .expect("open");

        let doc = json!({"match_id": "M1", "opponent": "Rovers"});
        store.put("kickai_KAI_matches", "M1", &doc).await.expect("put");
        assert_eq!(
            store.get("kickai_KAI_matches", "M1").await.expect("get"),
            Some(doc.clone())
        );

        // Upsert replaces.
        let doc2 = json!({"match_id": "M1", "opponent": "United"});
        store.put("kickai_KAI_matches", "M1", &doc2).await.expect("put");
        assert_eq!(
            store.get("kickai_KAI_matches", "M1").await.expect("get"),
            Some(doc2)
        );

        store.ping().await.expect("ping");
    }
}
