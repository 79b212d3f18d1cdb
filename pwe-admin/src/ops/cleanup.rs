//! Data-correction passes that delete documents
//!
//! Normal operation never deletes; these exist for cleaning up duplicated or
//! malformed combo documents.

use pwe_common::menu::price_new_document;
use pwe_common::store::{Document, DocumentStore, WriteBatch, WriteMode};
use pwe_common::{Error, MarkupTable, Result};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecreateReport {
    /// Whether a previous document was deleted
    pub replaced: bool,
    pub variants: usize,
}

/// Delete a document and write it again from fresh fields, atomically
pub async fn recreate(
    store: &dyn DocumentStore,
    markup: &MarkupTable,
    collection: &str,
    id: &str,
    fields: &Document,
) -> Result<RecreateReport> {
    let (priced, variants) = price_new_document(fields, markup)?;
    let replaced = store.get_document(collection, id).await?.is_some();

    let mut batch = WriteBatch::new();
    batch
        .delete(collection, id)
        .write(collection, id, priced, WriteMode::Replace);
    store.commit(batch).await?;

    info!(
        "Recreated {}/{} ({} variants, previous document {})",
        collection,
        id,
        variants,
        if replaced { "deleted" } else { "absent" }
    );
    Ok(RecreateReport { replaced, variants })
}

/// Delete several documents in one commit; every id must exist
pub async fn remove_documents(
    store: &dyn DocumentStore,
    collection: &str,
    ids: &[String],
) -> Result<usize> {
    let mut batch = WriteBatch::new();
    for id in ids {
        if store.get_document(collection, id).await?.is_none() {
            return Err(Error::NotFound(format!("{}/{}", collection, id)));
        }
        batch.delete(collection, id.as_str());
    }
    let count = batch.len();
    store.commit(batch).await?;
    info!("Removed {} documents from {}", count, collection);
    Ok(count)
}
