//! pwe-admin library - one-shot menu data procedures
//!
//! Every procedure is a short sequence of awaited store calls: read a few
//! documents, compute prices where needed, write them back, report.
//! Procedures take an already-connected [`DocumentStore`] handle.
//!
//! [`DocumentStore`]: pwe_common::DocumentStore

pub mod ops;

pub use ops::*;
