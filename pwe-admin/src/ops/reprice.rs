//! Platform price consistency passes
//!
//! `reprice` rewrites stored platform prices from base prices; `audit` only
//! reports where they have drifted.

use pwe_common::menu::{fields, reprice_document, MenuItem};
use pwe_common::pricing::base_price_from_json;
use pwe_common::store::{DocumentStore, WriteBatch, WriteMode};
use pwe_common::{MarkupTable, Platform, PlatformPricing, Result};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepriceReport {
    pub scanned: usize,
    pub changed_documents: usize,
    pub changed_variants: usize,
    pub dry_run: bool,
}

/// One stored platform price that does not match its base price
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftEntry {
    pub collection: String,
    pub document: String,
    /// None for single-price documents
    pub variant: Option<String>,
    pub platform: Platform,
    pub stored: Option<Decimal>,
    pub expected: Decimal,
}

/// Recompute platform pricing for every document in `collections`
///
/// Changed documents are merged back (only `variants` / `platformPricing`)
/// in a single commit.
pub async fn reprice(
    store: &dyn DocumentStore,
    markup: &MarkupTable,
    collections: &[&str],
    dry_run: bool,
) -> Result<RepriceReport> {
    let mut report = RepriceReport {
        dry_run,
        ..Default::default()
    };
    let mut batch = WriteBatch::new();

    for collection in collections {
        for (id, doc) in store.list_documents(collection).await? {
            report.scanned += 1;
            let repriced = reprice_document(&doc, markup)?;
            if repriced.is_unchanged() {
                debug!(collection, id = %id, "Pricing already current");
                continue;
            }
            info!(
                collection,
                id = %id,
                variants = repriced.variants_changed,
                "Repricing document"
            );
            report.changed_documents += 1;
            report.changed_variants += repriced.variants_changed;
            batch.write(*collection, id, repriced.changes, WriteMode::Merge);
        }
    }

    if !dry_run && !batch.is_empty() {
        store.commit(batch).await?;
    }

    info!(
        "Scanned {} documents, {} {} ({} variants)",
        report.scanned,
        report.changed_documents,
        if dry_run { "need repricing" } else { "repriced" },
        report.changed_variants
    );
    Ok(report)
}

/// List every stored platform price that disagrees with the markup table
pub async fn audit(
    store: &dyn DocumentStore,
    markup: &MarkupTable,
    collections: &[&str],
) -> Result<Vec<DriftEntry>> {
    let mut entries = Vec::new();

    for collection in collections {
        for (id, doc) in store.list_documents(collection).await? {
            if doc.contains_key(fields::VARIANTS) {
                let item = MenuItem::from_document(&doc)?;
                for variant in &item.variants {
                    for drift in variant.drift(markup)? {
                        entries.push(DriftEntry {
                            collection: collection.to_string(),
                            document: id.clone(),
                            variant: Some(variant.id.clone()),
                            platform: drift.platform,
                            stored: drift.stored,
                            expected: drift.expected,
                        });
                    }
                }
            }

            if let Some(base) = doc.get(fields::BASE_PRICE) {
                let expected = markup.propagate(base_price_from_json(base)?)?;
                let stored: PlatformPricing = match doc.get(fields::PLATFORM_PRICING) {
                    Some(value) => serde_json::from_value(value.clone())?,
                    None => PlatformPricing::default(),
                };
                for (platform, expected) in expected.iter() {
                    let stored = stored.get(platform);
                    if stored != Some(expected) {
                        entries.push(DriftEntry {
                            collection: collection.to_string(),
                            document: id.clone(),
                            variant: None,
                            platform,
                            stored,
                            expected,
                        });
                    }
                }
            }
        }
    }

    for entry in &entries {
        warn!(
            "Price drift {}/{}{}: {} stored {} expected {}",
            entry.collection,
            entry.document,
            entry.variant.as_deref().map(|v| format!("#{}", v)).unwrap_or_default(),
            entry.platform,
            entry.stored.map(|d| d.to_string()).unwrap_or_else(|| "none".into()),
            entry.expected
        );
    }
    info!("Audit found {} drifted prices", entries.len());
    Ok(entries)
}
