//! Local document store backed by SQLite
//!
//! One `documents` table keyed by (collection, id) with the JSON body as text.
//! Used for local development and tests in place of the hosted store.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use super::{merge_fields, BatchOp, Document, DocumentStore, WriteBatch, WriteMode};
use crate::Result;

const CREATE_DOCUMENTS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        body TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (collection, id)
    )
"#;

const UPSERT_SQL: &str = r#"
    INSERT INTO documents (collection, id, body, updated_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(collection, id) DO UPDATE SET
        body = excluded.body,
        updated_at = excluded.updated_at
"#;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) a store file
    pub async fn open(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new document store: {}", db_path.display());
        } else {
            info!("Opened existing document store: {}", db_path.display());
        }

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&pool)
            .await?;

        Self::from_pool(pool).await
    }

    /// Private in-memory store, gone when dropped
    pub async fn in_memory() -> Result<Self> {
        // A single connection that never expires, the database lives in it
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_DOCUMENTS_SQL).execute(&pool).await?;
        Ok(Self { pool })
    }
}

fn decode_body(body: &str) -> Result<Document> {
    Ok(serde_json::from_str(body)?)
}

async fn load(conn: &mut SqliteConnection, collection: &str, id: &str) -> Result<Option<Document>> {
    let body: Option<String> =
        sqlx::query_scalar("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    body.as_deref().map(decode_body).transpose()
}

async fn write_one(
    conn: &mut SqliteConnection,
    collection: &str,
    id: &str,
    fields: Document,
    mode: WriteMode,
) -> Result<()> {
    let body = match mode {
        WriteMode::Replace => fields,
        WriteMode::Merge => match load(conn, collection, id).await? {
            Some(mut existing) => {
                merge_fields(&mut existing, fields);
                existing
            }
            None => fields,
        },
    };

    debug!(collection, id, ?mode, "Writing document");
    sqlx::query(UPSERT_SQL)
        .bind(collection)
        .bind(id)
        .bind(serde_json::to_string(&body)?)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn delete_one(conn: &mut SqliteConnection, collection: &str, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
        .bind(collection)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let mut conn = self.pool.acquire().await?;
        load(&mut conn, collection, id).await
    }

    async fn write_document(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        mode: WriteMode,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        write_one(&mut tx, collection, id, fields, mode).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        delete_one(&mut conn, collection, id).await
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, body FROM documents WHERE collection = ? ORDER BY id")
                .bind(collection)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|(id, body)| Ok((id, decode_body(&body)?)))
            .collect()
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(
            sqlx::query_scalar("SELECT DISTINCT collection FROM documents ORDER BY collection")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let count = batch.len();
        let mut tx = self.pool.begin().await?;
        for op in batch.into_ops() {
            match op {
                BatchOp::Write {
                    collection,
                    id,
                    fields,
                    mode,
                } => write_one(&mut tx, &collection, &id, fields, mode).await?,
                BatchOp::Delete { collection, id } => {
                    delete_one(&mut tx, &collection, &id).await?;
                }
            }
        }
        // Dropping the transaction on an early return rolls everything back
        tx.commit().await?;
        debug!("Committed batch of {} operations", count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().expect("object")
    }

    #[tokio::test]
    async fn test_missing_document_is_none() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert_eq!(store.get_document("menuItems", "nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replace_then_merge() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .write_document(
                "sides",
                "fries",
                doc(json!({"name": "Fries", "active": true})),
                WriteMode::Replace,
            )
            .await
            .unwrap();
        store
            .write_document(
                "sides",
                "fries",
                doc(json!({"imageUrl": "https://cdn/fries.jpg"})),
                WriteMode::Merge,
            )
            .await
            .unwrap();

        let loaded = store.get_document("sides", "fries").await.unwrap().unwrap();
        assert_eq!(
            Value::Object(loaded),
            json!({"name": "Fries", "active": true, "imageUrl": "https://cdn/fries.jpg"})
        );

        store
            .write_document("sides", "fries", doc(json!({"name": "Fries"})), WriteMode::Replace)
            .await
            .unwrap();
        let loaded = store.get_document("sides", "fries").await.unwrap().unwrap();
        assert_eq!(Value::Object(loaded), json!({"name": "Fries"}));
    }

    #[tokio::test]
    async fn test_merge_creates_missing_document() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .write_document("salads", "caesar", doc(json!({"name": "Caesar"})), WriteMode::Merge)
            .await
            .unwrap();
        assert!(store.get_document("salads", "caesar").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_is_ordered_and_scoped_to_collection() {
        let store = SqliteStore::in_memory().await.unwrap();
        for id in ["wings", "cheesesteak", "fries"] {
            let collection = if id == "fries" { "sides" } else { "menuItems" };
            store
                .write_document(collection, id, doc(json!({"name": id})), WriteMode::Replace)
                .await
                .unwrap();
        }
        let ids: Vec<String> = store
            .list_documents("menuItems")
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["cheesesteak", "wings"]);
        assert_eq!(
            store.list_collections().await.unwrap(),
            vec!["menuItems", "sides"]
        );
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .write_document("combos", "party", doc(json!({})), WriteMode::Replace)
            .await
            .unwrap();
        assert!(store.delete_document("combos", "party").await.unwrap());
        assert!(!store.delete_document("combos", "party").await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_applies_in_order() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .write_document("combos", "family", doc(json!({"stale": true})), WriteMode::Replace)
            .await
            .unwrap();

        let mut batch = WriteBatch::new();
        batch
            .delete("combos", "family")
            .write("combos", "family", doc(json!({"name": "Family Pack"})), WriteMode::Merge)
            .write("combos", "date-night", doc(json!({"name": "Date Night"})), WriteMode::Replace);
        store.commit(batch).await.unwrap();

        let family = store.get_document("combos", "family").await.unwrap().unwrap();
        assert_eq!(Value::Object(family), json!({"name": "Family Pack"}));
        assert_eq!(store.list_documents("combos").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("menu.db");
        let store = SqliteStore::open(&path).await.unwrap();
        store
            .write_document("desserts", "cake", doc(json!({"name": "Cake"})), WriteMode::Replace)
            .await
            .unwrap();
        assert!(path.exists());
        drop(store);

        let reopened = SqliteStore::open(&path).await.unwrap();
        assert!(reopened.get_document("desserts", "cake").await.unwrap().is_some());
    }
}
