//! Firestore REST v1 client
//!
//! Talks to either the hosted service (bearer token) or the local emulator.
//! Documents travel as plain JSON field maps inside the crate and are
//! converted to Firestore's typed value encoding at this boundary.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{BatchOp, Document, DocumentStore, WriteBatch, WriteMode};
use crate::{Error, Result};

pub const PRODUCTION_ENDPOINT: &str = "https://firestore.googleapis.com";

/// Token the emulator accepts for admin access
const EMULATOR_TOKEN: &str = "owner";
const PAGE_SIZE: &str = "300";
/// Most writes `documents:commit` accepts in one request
pub const MAX_COMMIT_WRITES: usize = 500;

pub struct FirestoreStore {
    http: Client,
    /// `{endpoint}/v1/projects/{p}/databases/{d}/documents`
    base_url: String,
    /// `projects/{p}/databases/{d}/documents`
    resource_root: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCollectionIdsResponse {
    #[serde(default)]
    collection_ids: Vec<String>,
    next_page_token: Option<String>,
}

impl FirestoreStore {
    pub fn new(endpoint: &str, project: &str, database: &str, token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let resource_root = format!("projects/{}/databases/{}/documents", project, database);
        let base_url = format!("{}/v1/{}", endpoint.trim_end_matches('/'), resource_root);
        Url::parse(&base_url).map_err(|e| Error::Config(format!("{}: {}", base_url, e)))?;

        Ok(Self {
            http,
            base_url,
            resource_root,
            token,
        })
    }

    /// Client for an emulator listening on `host:port`
    pub fn emulator(host: &str, project: &str, database: &str) -> Result<Self> {
        let endpoint = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        Self::new(&endpoint, project, database, Some(EMULATOR_TOKEN.to_string()))
    }

    fn collection_url(&self, collection: &str) -> Result<Url> {
        self.url_with_segments(&[collection])
    }

    fn document_url(&self, collection: &str, id: &str) -> Result<Url> {
        self.url_with_segments(&[collection, id])
    }

    fn url_with_segments(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| Error::Config(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("cannot build paths on {}", self.base_url)))?
            .extend(segments);
        Ok(url)
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.resource_root, collection, id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(Error::Store {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let url = self.document_url(collection, id)?;
        debug!(url = %url, "Fetching document");
        match self.send(self.http.get(url)).await {
            Ok(response) => {
                let doc: FirestoreDocument = response.json().await?;
                Ok(Some(decode_fields(&doc.fields)?))
            }
            Err(Error::Store { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write_document(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        mode: WriteMode,
    ) -> Result<()> {
        let url = self.document_url(collection, id)?;
        let mut request = self
            .http
            .patch(url)
            .json(&json!({ "fields": encode_fields(&fields) }));
        if mode == WriteMode::Merge {
            let mask: Vec<(&str, String)> = fields
                .keys()
                .map(|k| ("updateMask.fieldPaths", quote_field_path(k)))
                .collect();
            request = request.query(&mask);
        }
        debug!(collection, id, ?mode, "Writing document");
        self.send(request).await?;
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool> {
        let url = self.document_url(collection, id)?;
        let request = self
            .http
            .delete(url)
            .query(&[("currentDocument.exists", "true")]);
        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(Error::Store { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        let url = self.collection_url(collection)?;

        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.get(url.clone()).query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let page: ListDocumentsResponse = self.send(request).await?.json().await?;
            for doc in page.documents {
                let id = doc.name.rsplit('/').next().unwrap_or_default().to_string();
                documents.push((id, decode_fields(&doc.fields)?));
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        documents.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(documents)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let url = format!("{}:listCollectionIds", self.base_url);
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut body = json!({ "pageSize": 300 });
            if let Some(token) = &page_token {
                body["pageToken"] = json!(token);
            }
            let page: ListCollectionIdsResponse =
                self.send(self.http.post(&url).json(&body)).await?.json().await?;
            ids.extend(page.collection_ids);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        if batch.len() > MAX_COMMIT_WRITES {
            return Err(Error::invalid(format!(
                "batch of {} writes exceeds the Firestore commit limit of {}",
                batch.len(),
                MAX_COMMIT_WRITES
            )));
        }
        let writes: Vec<Value> = batch
            .ops()
            .iter()
            .map(|op| self.encode_write(op))
            .collect();
        let url = format!("{}:commit", self.base_url);
        debug!("Committing batch of {} writes", writes.len());
        self.send(self.http.post(url).json(&json!({ "writes": writes })))
            .await?;
        Ok(())
    }
}

impl FirestoreStore {
    fn encode_write(&self, op: &BatchOp) -> Value {
        match op {
            BatchOp::Write {
                collection,
                id,
                fields,
                mode,
            } => {
                let mut write = json!({
                    "update": {
                        "name": self.document_name(collection, id),
                        "fields": encode_fields(fields),
                    }
                });
                if *mode == WriteMode::Merge {
                    let paths: Vec<String> = fields.keys().map(|k| quote_field_path(k)).collect();
                    write["updateMask"] = json!({ "fieldPaths": paths });
                }
                write
            }
            BatchOp::Delete { collection, id } => {
                json!({ "delete": self.document_name(collection, id) })
            }
        }
    }
}

/// Quote a top-level field name for use in a field path
///
/// Names that are not plain identifiers go inside backticks.
pub fn quote_field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

pub fn encode_fields(fields: &Document) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

/// Plain JSON to a Firestore typed value
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or_default() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Document> {
    fields
        .iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

/// Firestore typed value to plain JSON
///
/// Timestamps, references and bytes come back as their string form.
pub fn decode_value(value: &Value) -> Result<Value> {
    let typed = value
        .as_object()
        .and_then(|m| m.iter().next())
        .map(|(kind, inner)| (kind.as_str(), inner))
        .ok_or_else(|| Error::invalid(format!("not a Firestore value: {}", value)))?;

    match typed {
        ("nullValue", _) => Ok(Value::Null),
        ("booleanValue", b) => Ok(Value::Bool(b.as_bool().unwrap_or_default())),
        ("integerValue", i) => {
            let parsed = match i {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            parsed
                .map(Value::from)
                .ok_or_else(|| Error::invalid(format!("bad integerValue: {}", i)))
        }
        ("doubleValue", d) => match d.as_f64().and_then(serde_json::Number::from_f64) {
            Some(n) => Ok(Value::Number(n)),
            None => {
                // NaN and Infinity arrive as strings and have no JSON form
                warn!("Dropping non-finite doubleValue {}", d);
                Ok(Value::Null)
            }
        },
        ("stringValue", s) | ("timestampValue", s) | ("referenceValue", s) | ("bytesValue", s) => {
            Ok(s.clone())
        }
        ("geoPointValue", g) => Ok(g.clone()),
        ("arrayValue", a) => {
            let values = a
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_value).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        ("mapValue", m) => {
            let fields = m
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Object(fields))
        }
        (kind, _) => Err(Error::invalid(format!("unsupported Firestore value type {}", kind))),
    }
}
