//! Read-only views of the store for debugging

use pwe_common::store::{Document, DocumentStore};
use pwe_common::{Error, Result};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Inspection {
    Collections(Vec<String>),
    Collection {
        collection: String,
        documents: Vec<(String, Document)>,
    },
    Document {
        collection: String,
        id: String,
        fields: Document,
    },
}

impl Inspection {
    /// JSON view for printing
    pub fn to_json(&self) -> Value {
        match self {
            Inspection::Collections(names) => json!({ "collections": names }),
            Inspection::Collection {
                collection,
                documents,
            } => {
                let docs: serde_json::Map<String, Value> = documents
                    .iter()
                    .map(|(id, fields)| (id.clone(), Value::Object(fields.clone())))
                    .collect();
                json!({ "collection": collection, "count": documents.len(), "documents": docs })
            }
            Inspection::Document {
                collection,
                id,
                fields,
            } => json!({ "collection": collection, "id": id, "fields": fields }),
        }
    }
}

/// No collection: list collections. Collection only: every document in it.
/// Both: that one document.
pub async fn inspect(
    store: &dyn DocumentStore,
    collection: Option<&str>,
    id: Option<&str>,
) -> Result<Inspection> {
    match (collection, id) {
        (None, None) => Ok(Inspection::Collections(store.list_collections().await?)),
        (None, Some(id)) => Err(Error::InvalidArgument(format!(
            "document id {} given without a collection",
            id
        ))),
        (Some(collection), None) => Ok(Inspection::Collection {
            collection: collection.to_string(),
            documents: store.list_documents(collection).await?,
        }),
        (Some(collection), Some(id)) => {
            let fields = store
                .get_document(collection, id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("{}/{}", collection, id)))?;
            Ok(Inspection::Document {
                collection: collection.to_string(),
                id: id.to_string(),
                fields,
            })
        }
    }
}
