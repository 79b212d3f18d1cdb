//! Initial menu upload

use std::collections::BTreeMap;
use std::path::Path;

use pwe_common::menu::price_new_document;
use pwe_common::store::{Document, DocumentStore, WriteBatch, WriteMode};
use pwe_common::{MarkupTable, Result};
use serde::Deserialize;
use tracing::{debug, info};

/// Seed data: collection -> document id -> fields
///
/// Prices in the file are base prices only; platform pricing is computed
/// while seeding.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SeedFile {
    pub collections: BTreeMap<String, BTreeMap<String, Document>>,
}

impl SeedFile {
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<&Document> {
        self.collections.get(collection).and_then(|docs| docs.get(id))
    }

    pub fn document_count(&self) -> usize {
        self.collections.values().map(BTreeMap::len).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub documents: usize,
    pub variants: usize,
    pub dry_run: bool,
}

/// Write every seed document (replacing what is stored) in one commit
///
/// Pricing is computed for all documents before anything is written, so a
/// bad price anywhere leaves the store untouched.
pub async fn seed(
    store: &dyn DocumentStore,
    markup: &MarkupTable,
    seed: &SeedFile,
    dry_run: bool,
) -> Result<SeedReport> {
    let mut report = SeedReport {
        dry_run,
        ..Default::default()
    };
    let mut batch = WriteBatch::new();

    for (collection, documents) in &seed.collections {
        for (id, fields) in documents {
            let (priced, variants) = price_new_document(fields, markup)?;
            debug!(collection = %collection, id = %id, variants, "Prepared seed document");
            report.documents += 1;
            report.variants += variants;
            batch.write(collection.as_str(), id.as_str(), priced, WriteMode::Replace);
        }
    }

    if dry_run {
        info!(
            "Dry run: would seed {} documents ({} variants)",
            report.documents, report.variants
        );
        return Ok(report);
    }

    store.commit(batch).await?;
    info!(
        "Seeded {} documents ({} variants) across {} collections",
        report.documents,
        report.variants,
        seed.collections.len()
    );
    Ok(report)
}
