//! Document store collaborator
//!
//! The procedures only ever see a [`DocumentStore`] handle. The entry point
//! builds one with [`connect_store`] before any procedure runs.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};
use crate::{Error, Result};

pub mod firestore;
pub mod sqlite;

pub use firestore::FirestoreStore;
pub use sqlite::SqliteStore;

/// Field map of one stored document (the id is kept separately)
pub type Document = Map<String, Value>;

/// How a write combines with an existing document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Overwrite only the supplied top-level fields, creating the document if absent
    Merge,
    /// Overwrite the whole document
    Replace,
}

/// One mutation inside a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    Write {
        collection: String,
        id: String,
        fields: Document,
        mode: WriteMode,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// Ordered group of mutations committed atomically
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(
        &mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        fields: Document,
        mode: WriteMode,
    ) -> &mut Self {
        self.ops.push(BatchOp::Write {
            collection: collection.into(),
            id: id.into(),
            fields,
            mode,
        });
        self
    }

    pub fn delete(&mut self, collection: impl Into<String>, id: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::Delete {
            collection: collection.into(),
            id: id.into(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Per-document reads and writes plus collection queries
///
/// Failures surface unchanged; implementations do not retry.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    async fn write_document(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        mode: WriteMode,
    ) -> Result<()>;

    /// Returns false if there was nothing to delete
    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool>;

    /// All documents in a collection, ordered by id
    async fn list_documents(&self, collection: &str) -> Result<Vec<(String, Document)>>;

    /// Names of collections holding at least one document
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Apply every mutation or none
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}

/// Overwrite `fields` onto `existing` at the top level
pub fn merge_fields(existing: &mut Document, fields: Document) {
    for (key, value) in fields {
        existing.insert(key, value);
    }
}

/// Build the store named by the configuration
pub async fn connect_store(config: &StoreConfig) -> Result<Box<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Sqlite => {
            let path = config.sqlite_path();
            info!("Using local document store: {}", path.display());
            Ok(Box::new(SqliteStore::open(&path).await?))
        }
        StoreBackend::Firestore => {
            let project = config.project_id.as_deref().ok_or_else(|| {
                Error::Config("store.project_id is required for the firestore backend".into())
            })?;
            let store = if let Some(host) = &config.emulator_host {
                info!("Using Firestore emulator at {} (project {})", host, project);
                FirestoreStore::emulator(host, project, &config.database)?
            } else {
                let endpoint = config
                    .endpoint
                    .as_deref()
                    .unwrap_or(firestore::PRODUCTION_ENDPOINT);
                info!("Using Firestore at {} (project {})", endpoint, project);
                if config.access_token.is_none() {
                    tracing::warn!("No access token configured; production requests will be rejected");
                }
                FirestoreStore::new(endpoint, project, &config.database, config.access_token.clone())?
            };
            Ok(Box::new(store))
        }
    }
}
