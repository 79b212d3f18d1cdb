//! # Philly Wings Express common library
//!
//! Shared code for the menu tooling binaries:
//! - Platform price propagation (delivery platform markups)
//! - Menu document model (items and their variants)
//! - Document store collaborator (local SQLite store, Firestore REST client)
//! - Configuration loading

pub mod config;
pub mod error;
pub mod menu;
pub mod pricing;
pub mod store;

pub use error::{Error, Result};
pub use pricing::{MarkupTable, Platform, PlatformPricing};
pub use store::{Document, DocumentStore, WriteBatch, WriteMode};
