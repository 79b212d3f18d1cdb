//! Administrative procedures over the menu collections

mod cleanup;
mod inspect;
mod patch;
mod reprice;
mod seed;

pub use cleanup::{recreate, remove_documents, RecreateReport};
pub use inspect::{inspect, Inspection};
pub use patch::{add_variant, attach_image, set_base_price, set_field, NewVariant};
pub use reprice::{audit, reprice, DriftEntry, RepriceReport};
pub use seed::{seed, SeedFile, SeedReport};
