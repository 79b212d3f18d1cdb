//! pwe-admin - menu data administration for Philly Wings Express
//!
//! One-shot procedures against the menu document store: seed the menu,
//! keep delivery platform prices in step with base prices, patch individual
//! documents, inspect collections, and clean up broken combo documents.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pwe_admin::{NewVariant, SeedFile};
use pwe_common::config::{load_config, StoreBackend};
use pwe_common::menu::{collections, Position};
use pwe_common::store::connect_store;
use pwe_common::MarkupTable;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::info;

/// Command-line arguments for pwe-admin
#[derive(Parser, Debug)]
#[command(name = "pwe-admin")]
#[command(about = "Menu data administration for Philly Wings Express")]
#[command(version)]
struct Args {
    /// Config file (default: $PWE_CONFIG, then ~/.config/pwe/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured store backend (sqlite or firestore)
    #[arg(long, global = true)]
    store: Option<StoreBackend>,

    /// Override the SQLite store file
    #[arg(long, global = true)]
    sqlite_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a JSON seed file, computing platform prices
    Seed {
        file: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Recompute platform prices from base prices
    Reprice {
        /// Collections to scan (default: every priced collection)
        #[arg(long = "collection", short = 'C')]
        collections: Vec<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Report platform prices that do not match their base price
    Audit {
        #[arg(long = "collection", short = 'C')]
        collections: Vec<String>,
    },
    /// Set one top-level field (value parsed as JSON, else taken as a string)
    SetField {
        collection: String,
        id: String,
        field: String,
        value: String,
    },
    /// Set a document's imageUrl
    AttachImage {
        collection: String,
        id: String,
        url: String,
    },
    /// Change a base price (of a variant with --variant)
    SetPrice {
        collection: String,
        id: String,
        price: Decimal,
        #[arg(long)]
        variant: Option<String>,
    },
    /// Insert a new variant into a document's list
    AddVariant {
        collection: String,
        id: String,
        #[arg(long)]
        variant_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: Decimal,
        /// first, last, or a zero-based index
        #[arg(long, default_value = "last")]
        position: Position,
        /// Extra descriptive fields as a JSON object
        #[arg(long)]
        extra: Option<String>,
    },
    /// Print collections, a collection, or one document
    Inspect {
        collection: Option<String>,
        id: Option<String>,
    },
    /// Delete a document and write it again from a seed file entry
    Recreate {
        seed_file: PathBuf,
        collection: String,
        id: String,
    },
    /// Delete documents
    Remove {
        collection: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show platform prices for a base price without touching the store
    Quote { price: Decimal },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!(
        "pwe-admin v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(backend) = args.store {
        config.store.backend = backend;
    }
    if let Some(path) = args.sqlite_path {
        config.store.sqlite_path = Some(path);
    }
    let markup = config.pricing.clone();

    if let Command::Quote { price } = &args.command {
        return quote(&markup, *price);
    }

    let store = connect_store(&config.store)
        .await
        .context("Failed to connect to document store")?;
    let store = store.as_ref();

    match args.command {
        Command::Seed { file, dry_run } => {
            let seed = SeedFile::from_file(&file)
                .with_context(|| format!("Failed to read seed file {}", file.display()))?;
            let report = pwe_admin::seed(store, &markup, &seed, dry_run).await?;
            println!("{} documents, {} variants", report.documents, report.variants);
        }
        Command::Reprice {
            collections,
            dry_run,
        } => {
            let names = collection_names(&collections);
            let report = pwe_admin::reprice(store, &markup, &names, dry_run).await?;
            println!(
                "scanned {}, changed {} documents ({} variants){}",
                report.scanned,
                report.changed_documents,
                report.changed_variants,
                if dry_run { " [dry run]" } else { "" }
            );
        }
        Command::Audit { collections } => {
            let names = collection_names(&collections);
            let entries = pwe_admin::audit(store, &markup, &names).await?;
            for e in &entries {
                println!(
                    "{}/{}\t{}\t{}\tstored={}\texpected={}",
                    e.collection,
                    e.document,
                    e.variant.as_deref().unwrap_or("-"),
                    e.platform,
                    e.stored.map(|d| d.to_string()).unwrap_or_else(|| "none".into()),
                    e.expected
                );
            }
            if !entries.is_empty() {
                anyhow::bail!("{} prices out of step with their base price", entries.len());
            }
        }
        Command::SetField {
            collection,
            id,
            field,
            value,
        } => {
            pwe_admin::set_field(store, &markup, &collection, &id, &field, parse_value(&value))
                .await?;
        }
        Command::AttachImage { collection, id, url } => {
            pwe_admin::attach_image(store, &collection, &id, &url).await?;
        }
        Command::SetPrice {
            collection,
            id,
            price,
            variant,
        } => {
            pwe_admin::set_base_price(store, &markup, &collection, &id, variant.as_deref(), price)
                .await?;
        }
        Command::AddVariant {
            collection,
            id,
            variant_id,
            name,
            price,
            position,
            extra,
        } => {
            let extra = match extra {
                Some(raw) => serde_json::from_str(&raw).context("--extra must be a JSON object")?,
                None => serde_json::Map::new(),
            };
            let new_variant = NewVariant {
                id: variant_id,
                name,
                base_price: price,
                extra,
            };
            pwe_admin::add_variant(store, &markup, &collection, &id, new_variant, position).await?;
        }
        Command::Inspect { collection, id } => {
            let inspection =
                pwe_admin::inspect(store, collection.as_deref(), id.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&inspection.to_json())?);
        }
        Command::Recreate {
            seed_file,
            collection,
            id,
        } => {
            let seed = SeedFile::from_file(&seed_file)
                .with_context(|| format!("Failed to read seed file {}", seed_file.display()))?;
            let fields = seed.document(&collection, &id).with_context(|| {
                format!("{}/{} not found in {}", collection, id, seed_file.display())
            })?;
            pwe_admin::recreate(store, &markup, &collection, &id, fields).await?;
        }
        Command::Remove { collection, ids } => {
            let removed = pwe_admin::remove_documents(store, &collection, &ids).await?;
            println!("removed {}", removed);
        }
        Command::Quote { .. } => unreachable!("handled before connecting"),
    }

    Ok(())
}

fn quote(markup: &MarkupTable, price: Decimal) -> Result<()> {
    let pricing = markup.propagate(price)?;
    for (platform, display) in pricing.iter() {
        println!("{}\t{}", platform, display);
    }
    Ok(())
}

fn collection_names(requested: &[String]) -> Vec<&str> {
    if requested.is_empty() {
        collections::PRICED.to_vec()
    } else {
        requested.iter().map(String::as_str).collect()
    }
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
