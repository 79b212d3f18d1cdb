//! Menu document model
//!
//! A menu item (or dessert, side, salad, catering add-on) owns an ordered
//! list of variants. Variant order is display order. Each variant carries its
//! own base price and the per-platform prices derived from it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::pricing::{self, json_price, MarkupTable, Platform, PlatformPricing};
use crate::store::Document;
use crate::{Error, Result};

/// Collections holding menu documents
pub mod collections {
    pub const MENU_ITEMS: &str = "menuItems";
    pub const DESSERTS: &str = "desserts";
    pub const SIDES: &str = "sides";
    pub const SALADS: &str = "salads";
    pub const CATERING_ADD_ONS: &str = "cateringAddOns";
    pub const COMBOS: &str = "combos";

    /// Every collection whose documents carry prices
    pub const PRICED: [&str; 6] = [MENU_ITEMS, DESSERTS, SIDES, SALADS, CATERING_ADD_ONS, COMBOS];
}

/// Document field names shared by the procedures
pub mod fields {
    pub const VARIANTS: &str = "variants";
    pub const BASE_PRICE: &str = "basePrice";
    pub const PLATFORM_PRICING: &str = "platformPricing";
    pub const IMAGE_URL: &str = "imageUrl";
}

/// One orderable size/option of a menu item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    /// Unique within the parent item's variant list
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(with = "json_price")]
    pub base_price: Decimal,
    #[serde(default)]
    pub platform_pricing: PlatformPricing,
    /// Category-specific fields (`size`, `description`, `options`,
    /// `prepMethod`, `count`, `slices`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A stored platform price that disagrees with the markup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceDrift {
    pub platform: Platform,
    pub stored: Option<Decimal>,
    pub expected: Decimal,
}

impl Variant {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        base_price: Decimal,
        markup: &MarkupTable,
    ) -> Result<Self> {
        let platform_pricing = markup.propagate(base_price)?;
        Ok(Self {
            id: id.into(),
            name: name.into(),
            base_price,
            platform_pricing,
            extra: Map::new(),
        })
    }

    /// Recompute platform prices; returns true if anything changed
    pub fn reprice(&mut self, markup: &MarkupTable) -> Result<bool> {
        let pricing = markup.propagate(self.base_price)?;
        if pricing == self.platform_pricing {
            return Ok(false);
        }
        self.platform_pricing = pricing;
        Ok(true)
    }

    /// Platforms whose stored price differs from the computed one
    pub fn drift(&self, markup: &MarkupTable) -> Result<Vec<PriceDrift>> {
        let expected = markup.propagate(self.base_price)?;
        Ok(expected
            .iter()
            .filter_map(|(platform, expected)| {
                let stored = self.platform_pricing.get(platform);
                (stored != Some(expected)).then_some(PriceDrift {
                    platform,
                    stored,
                    expected,
                })
            })
            .collect())
    }
}

/// Where to insert a new variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    First,
    Last,
    Index(usize),
}

impl std::str::FromStr for Position {
    type Err = Error;

    /// `first`, `last`, or a zero-based index
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(Position::First),
            "last" => Ok(Position::Last),
            other => other
                .parse()
                .map(Position::Index)
                .map_err(|_| Error::invalid(format!("bad variant position: {}", s))),
        }
    }
}

/// Any document owning an ordered variant list
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MenuItem {
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MenuItem {
    pub fn from_document(doc: &Document) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(doc.clone()))?)
    }

    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::invalid(format!("menu item encoded as {}", other))),
        }
    }

    pub fn variant(&self, id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn variant_mut(&mut self, id: &str) -> Option<&mut Variant> {
        self.variants.iter_mut().find(|v| v.id == id)
    }

    pub fn insert_variant(&mut self, variant: Variant, position: Position) -> Result<()> {
        if self.variant(&variant.id).is_some() {
            return Err(Error::invalid(format!("duplicate variant id: {}", variant.id)));
        }
        let index = match position {
            Position::First => 0,
            Position::Last => self.variants.len(),
            Position::Index(i) if i <= self.variants.len() => i,
            Position::Index(i) => {
                return Err(Error::invalid(format!(
                    "variant index {} beyond list of {}",
                    i,
                    self.variants.len()
                )))
            }
        };
        self.variants.insert(index, variant);
        Ok(())
    }

    /// Recompute every variant; returns the number that changed
    pub fn reprice(&mut self, markup: &MarkupTable) -> Result<usize> {
        let mut changed = 0;
        for variant in &mut self.variants {
            if variant.reprice(markup)? {
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// Fields rewritten by [`reprice_document`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepricedFields {
    /// Only the fields whose value changed, ready for a merge write
    pub changes: Document,
    pub variants_seen: usize,
    pub variants_changed: usize,
}

impl RepricedFields {
    pub fn is_unchanged(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Recompute prices on a raw stored document
///
/// Handles both shapes found in the menu collections: a `variants` list, and
/// single-price documents carrying a top-level `basePrice`. Documents with
/// neither are left alone.
pub fn reprice_document(doc: &Document, markup: &MarkupTable) -> Result<RepricedFields> {
    let mut out = RepricedFields::default();

    if doc.contains_key(fields::VARIANTS) {
        let mut item = MenuItem::from_document(doc)?;
        out.variants_seen = item.variants.len();
        out.variants_changed = item.reprice(markup)?;
        if out.variants_changed > 0 {
            out.changes
                .insert(fields::VARIANTS.to_string(), serde_json::to_value(&item.variants)?);
        }
    }

    if let Some(base) = doc.get(fields::BASE_PRICE) {
        let base = pricing::base_price_from_json(base)?;
        let expected = markup.propagate(base)?.to_json();
        if doc.get(fields::PLATFORM_PRICING) != Some(&expected) {
            out.changes
                .insert(fields::PLATFORM_PRICING.to_string(), expected);
        }
    }

    Ok(out)
}

/// Attach computed pricing to a document about to be seeded
pub fn price_new_document(doc: &Document, markup: &MarkupTable) -> Result<(Document, usize)> {
    let repriced = reprice_document(doc, markup)?;
    let mut doc = doc.clone();
    for (key, value) in repriced.changes {
        doc.insert(key, value);
    }
    Ok((doc, repriced.variants_seen))
}
