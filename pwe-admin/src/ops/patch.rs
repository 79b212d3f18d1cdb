//! Single-document fix-ups: field edits, image links, price changes, new variants

use pwe_common::menu::{fields, MenuItem, Position, Variant};
use pwe_common::pricing::decimal_to_json;
use pwe_common::store::{Document, DocumentStore, WriteMode};
use pwe_common::{Error, MarkupTable, Result};
use reqwest::Url;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::info;

async fn load_existing(store: &dyn DocumentStore, collection: &str, id: &str) -> Result<Document> {
    store
        .get_document(collection, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{}/{}", collection, id)))
}

/// Set one top-level field on an existing document
///
/// Setting `basePrice` also rewrites `platformPricing`. The derived price
/// fields themselves cannot be set directly.
pub async fn set_field(
    store: &dyn DocumentStore,
    markup: &MarkupTable,
    collection: &str,
    id: &str,
    field: &str,
    value: Value,
) -> Result<()> {
    if field == fields::PLATFORM_PRICING || field == fields::VARIANTS {
        return Err(Error::InvalidArgument(format!(
            "{} is derived from base prices; use set-price or add-variant",
            field
        )));
    }
    load_existing(store, collection, id).await?;

    let mut changes = Document::new();
    if field == fields::BASE_PRICE {
        let base = pwe_common::pricing::base_price_from_json(&value)?;
        changes.insert(
            fields::PLATFORM_PRICING.to_string(),
            markup.propagate(base)?.to_json(),
        );
    }
    changes.insert(field.to_string(), value);

    store
        .write_document(collection, id, changes, WriteMode::Merge)
        .await?;
    info!("Set {} on {}/{}", field, collection, id);
    Ok(())
}

/// Point a document at its product photo
pub async fn attach_image(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    image_url: &str,
) -> Result<()> {
    let url = Url::parse(image_url)
        .map_err(|e| Error::InvalidArgument(format!("bad image url {}: {}", image_url, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidArgument(format!(
            "image url must be http(s): {}",
            image_url
        )));
    }
    load_existing(store, collection, id).await?;

    let mut changes = Document::new();
    changes.insert(fields::IMAGE_URL.to_string(), Value::String(url.to_string()));
    store
        .write_document(collection, id, changes, WriteMode::Merge)
        .await?;
    info!("Attached image to {}/{}: {}", collection, id, url);
    Ok(())
}

/// Change a base price and its platform prices together
///
/// With `variant_id` the named variant changes; without it the document's
/// own top-level `basePrice` does.
pub async fn set_base_price(
    store: &dyn DocumentStore,
    markup: &MarkupTable,
    collection: &str,
    id: &str,
    variant_id: Option<&str>,
    base_price: Decimal,
) -> Result<()> {
    let doc = load_existing(store, collection, id).await?;
    let mut changes = Document::new();

    match variant_id {
        Some(variant_id) => {
            let mut item = MenuItem::from_document(&doc)?;
            let variant = item.variant_mut(variant_id).ok_or_else(|| {
                Error::NotFound(format!("variant {} in {}/{}", variant_id, collection, id))
            })?;
            variant.base_price = base_price;
            variant.reprice(markup)?;
            changes.insert(
                fields::VARIANTS.to_string(),
                serde_json::to_value(&item.variants)?,
            );
        }
        None => {
            let pricing = markup.propagate(base_price)?;
            changes.insert(fields::BASE_PRICE.to_string(), decimal_to_json(base_price));
            changes.insert(fields::PLATFORM_PRICING.to_string(), pricing.to_json());
        }
    }

    store
        .write_document(collection, id, changes, WriteMode::Merge)
        .await?;
    info!(
        "Set base price of {}/{}{} to {}",
        collection,
        id,
        variant_id.map(|v| format!("#{}", v)).unwrap_or_default(),
        base_price
    );
    Ok(())
}

/// Variant to be inserted by [`add_variant`]
#[derive(Debug, Clone, PartialEq)]
pub struct NewVariant {
    pub id: String,
    pub name: String,
    pub base_price: Decimal,
    /// Descriptive fields such as `size` or `description`
    pub extra: Map<String, Value>,
}

/// Insert a priced variant into an existing document's list
pub async fn add_variant(
    store: &dyn DocumentStore,
    markup: &MarkupTable,
    collection: &str,
    id: &str,
    new_variant: NewVariant,
    position: Position,
) -> Result<()> {
    let doc = load_existing(store, collection, id).await?;
    let mut item = MenuItem::from_document(&doc)?;

    let mut variant = Variant::new(new_variant.id, new_variant.name, new_variant.base_price, markup)?;
    variant.extra = new_variant.extra;
    let variant_id = variant.id.clone();
    item.insert_variant(variant, position)?;

    let mut changes = Document::new();
    changes.insert(
        fields::VARIANTS.to_string(),
        serde_json::to_value(&item.variants)?,
    );
    store
        .write_document(collection, id, changes, WriteMode::Merge)
        .await?;
    info!(
        "Added variant {} to {}/{} ({} variants now)",
        variant_id,
        collection,
        id,
        item.variants.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::{doc, store};
    use pwe_common::store::SqliteStore;
    use rust_decimal_macros::dec;
    use serde_json::json;

    async fn seeded() -> SqliteStore {
        let store = store().await;
        store
            .write_document(
                "desserts",
                "cheesecake",
                doc(json!({
                    "name": "Cheesecake",
                    "variants": [
                        {"id": "slice", "name": "Slice", "basePrice": 4.99, "slices": 1,
                         "platformPricing": {"doordash": 6.74, "ubereats": 6.74, "grubhub": 6.06}}
                    ]
                })),
                WriteMode::Replace,
            )
            .await
            .unwrap();
        store
            .write_document(
                "cateringAddOns",
                "utensils",
                doc(json!({"name": "Utensil Kit", "basePrice": 0.00})),
                WriteMode::Replace,
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_set_field_merges() {
        let store = seeded().await;
        let markup = MarkupTable::standard();
        set_field(&store, &markup, "desserts", "cheesecake", "description", json!("New York style"))
            .await
            .unwrap();
        let cake = store.get_document("desserts", "cheesecake").await.unwrap().unwrap();
        assert_eq!(cake["description"], json!("New York style"));
        assert_eq!(cake["variants"][0]["id"], json!("slice"));
    }

    #[tokio::test]
    async fn test_set_field_base_price_keeps_pricing_in_step() {
        let store = seeded().await;
        let markup = MarkupTable::standard();
        set_field(&store, &markup, "cateringAddOns", "utensils", "basePrice", json!(2.49))
            .await
            .unwrap();
        let kit = store
            .get_document("cateringAddOns", "utensils")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            kit["platformPricing"],
            json!({"doordash": 3.36, "ubereats": 3.36, "grubhub": 3.03})
        );
    }

    #[tokio::test]
    async fn test_set_field_rejects_derived_fields_and_missing_docs() {
        let store = seeded().await;
        let markup = MarkupTable::standard();
        let err = set_field(&store, &markup, "desserts", "cheesecake", "platformPricing", json!({}))
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());

        let err = set_field(&store, &markup, "desserts", "tiramisu", "name", json!("Tiramisu"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_attach_image_validates_url() {
        let store = seeded().await;
        attach_image(&store, "desserts", "cheesecake", "https://storage.example.com/cake.jpg")
            .await
            .unwrap();
        let cake = store.get_document("desserts", "cheesecake").await.unwrap().unwrap();
        assert_eq!(cake["imageUrl"], json!("https://storage.example.com/cake.jpg"));

        assert!(attach_image(&store, "desserts", "cheesecake", "not a url")
            .await
            .unwrap_err()
            .is_invalid_argument());
        assert!(attach_image(&store, "desserts", "cheesecake", "ftp://host/cake.jpg")
            .await
            .unwrap_err()
            .is_invalid_argument());
    }

    #[tokio::test]
    async fn test_set_variant_price() {
        let store = seeded().await;
        let markup = MarkupTable::standard();
        set_base_price(&store, &markup, "desserts", "cheesecake", Some("slice"), dec!(5.49))
            .await
            .unwrap();
        let cake = store.get_document("desserts", "cheesecake").await.unwrap().unwrap();
        let slice = &cake["variants"][0];
        assert_eq!(slice["basePrice"], json!(5.49));
        // 7.4115 and 6.67035
        assert_eq!(
            slice["platformPricing"],
            json!({"doordash": 7.41, "ubereats": 7.41, "grubhub": 6.67})
        );
        assert_eq!(slice["slices"], json!(1));

        let err = set_base_price(&store, &markup, "desserts", "cheesecake", Some("whole"), dec!(30))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_set_top_level_price_rejects_negative() {
        let store = seeded().await;
        let markup = MarkupTable::standard();
        let err = set_base_price(&store, &markup, "cateringAddOns", "utensils", None, dec!(-1.00))
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());

        set_base_price(&store, &markup, "cateringAddOns", "utensils", None, dec!(1.00))
            .await
            .unwrap();
        let kit = store
            .get_document("cateringAddOns", "utensils")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kit["basePrice"], json!(1.0));
        assert_eq!(kit["platformPricing"]["grubhub"], json!(1.22));
    }

    #[tokio::test]
    async fn test_add_small_size_first() {
        let store = seeded().await;
        let markup = MarkupTable::standard();
        let mut extra = Map::new();
        extra.insert("size".into(), json!("mini"));
        add_variant(
            &store,
            &markup,
            "desserts",
            "cheesecake",
            NewVariant {
                id: "bite".into(),
                name: "Cheesecake Bite".into(),
                base_price: dec!(2.49),
                extra,
            },
            Position::First,
        )
        .await
        .unwrap();

        let cake = store.get_document("desserts", "cheesecake").await.unwrap().unwrap();
        let variants = cake["variants"].as_array().unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0]["id"], json!("bite"));
        assert_eq!(variants[0]["size"], json!("mini"));
        assert_eq!(variants[0]["platformPricing"]["grubhub"], json!(3.03));
        assert_eq!(variants[1]["id"], json!("slice"));
    }
}
