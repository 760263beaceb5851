use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::codec::{decode_fields, encode_field, encode_fields, encode_value, quote_path};
use super::{check, FirebaseBackend};
use crate::document::{set_path, Document, FieldUpdate, NewDocument, SetMode};
use crate::error::{BackendError, Result};
use crate::query::{Direction, Filter, Query};
use crate::traits::DocumentStore;

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Option<Map<String, Value>>,
}

impl RawDocument {
    fn into_document(self) -> Document {
        let id = self.name.rsplit('/').next().unwrap_or_default().to_string();
        Document::new(id, decode_fields(self.fields.as_ref()))
    }
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<RawDocument>,
}

impl FirebaseBackend {
    fn database(&self) -> String {
        format!("projects/{}/databases/(default)", self.config.project_id)
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/documents/{collection}/{id}", self.database())
    }

    fn documents_url(&self) -> String {
        format!("{}/{}/documents", self.config.firestore_url, self.database())
    }

    async fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self.bearer().await? {
            Some(token) => req.bearer_auth(token),
            None => req,
        })
    }

    async fn commit(&self, writes: Vec<Value>) -> Result<()> {
        let token = self.require_bearer().await?;
        let url = format!("{}/{}/documents:commit", self.config.firestore_url, self.database());
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "writes": writes }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

fn timestamp_transforms(paths: &[String]) -> Vec<Value> {
    paths
        .iter()
        .map(|p| json!({ "fieldPath": quote_path(p), "setToServerValue": "REQUEST_TIME" }))
        .collect()
}

/// One write in a commit request.
fn document_write(
    name: String,
    doc: &NewDocument,
    mask: Option<Vec<String>>,
    exists: Option<bool>,
) -> Value {
    let mut write = json!({
        "update": { "name": name, "fields": encode_fields(&doc.data) }
    });
    if let Some(paths) = mask {
        write["updateMask"] = json!({ "fieldPaths": paths });
    }
    if let Some(exists) = exists {
        write["currentDocument"] = json!({ "exists": exists });
    }
    if !doc.server_timestamps.is_empty() {
        write["updateTransforms"] = Value::Array(timestamp_transforms(&doc.server_timestamps));
    }
    write
}

fn update_write(name: String, updates: &[FieldUpdate]) -> Value {
    let mut fields = Map::new();
    let mut mask = Vec::new();
    let mut transforms = Vec::new();

    for update in updates {
        match update {
            FieldUpdate::Set(path, value) => {
                set_path(&mut fields, path, value.clone());
                mask.push(quote_path(path));
            }
            FieldUpdate::Increment(path, by) => transforms.push(json!({
                "fieldPath": quote_path(path),
                "increment": encode_value(&Value::from(*by)),
            })),
            FieldUpdate::ServerTimestamp(path) => transforms.push(json!({
                "fieldPath": quote_path(path),
                "setToServerValue": "REQUEST_TIME",
            })),
        }
    }

    let mut write = json!({
        "update": { "name": name, "fields": encode_fields(&fields) },
        "updateMask": { "fieldPaths": mask },
        "currentDocument": { "exists": true },
    });
    if !transforms.is_empty() {
        write["updateTransforms"] = Value::Array(transforms);
    }
    write
}

fn structured_query(query: &Query) -> Value {
    let filters: Vec<Value> = query
        .filters
        .iter()
        .map(|f| {
            let (field, op, value) = match f {
                Filter::Eq { field, value } => (field, "EQUAL", value),
                Filter::ArrayContains { field, value } => (field, "ARRAY_CONTAINS", value),
            };
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": quote_path(field) },
                    "op": op,
                    "value": encode_field(field, value),
                }
            })
        })
        .collect();

    let mut structured = json!({ "from": [{ "collectionId": query.collection }] });
    match filters.len() {
        0 => {}
        1 => structured["where"] = filters.into_iter().next().unwrap_or(Value::Null),
        _ => {
            structured["where"] = json!({ "compositeFilter": { "op": "AND", "filters": filters } });
        }
    }
    if let Some(order) = &query.order_by {
        let direction = match order.direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        structured["orderBy"] = json!([{
            "field": { "fieldPath": quote_path(&order.field) },
            "direction": direction,
        }]);
    }
    if let Some(limit) = query.limit {
        structured["limit"] = json!(limit);
    }
    json!({ "structuredQuery": structured })
}

#[async_trait]
impl DocumentStore for FirebaseBackend {
    async fn create(&self, collection: &str, doc: NewDocument) -> Result<String> {
        let id = Uuid::new_v4().simple().to_string()[..20].to_string();
        let write = document_write(self.document_name(collection, &id), &doc, None, Some(false));
        self.commit(vec![write]).await?;
        debug!(collection, id = %id, "document created");
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, doc: NewDocument, mode: SetMode) -> Result<()> {
        let mask = match mode {
            SetMode::Overwrite => None,
            SetMode::Merge => Some(doc.data.keys().map(|k| quote_path(k)).collect()),
        };
        let write = document_write(self.document_name(collection, id), &doc, mask, None);
        self.commit(vec![write]).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let url = format!("{}/{collection}/{id}", self.documents_url());
        let resp = self.authorized(self.http.get(url)).await?.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: RawDocument = check(resp).await?.json().await?;
        Ok(Some(raw.into_document()))
    }

    async fn update(&self, collection: &str, id: &str, updates: Vec<FieldUpdate>) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let write = update_write(self.document_name(collection, id), &updates);
        self.commit(vec![write]).await.map_err(|e| match e {
            BackendError::NotFound(_) => BackendError::NotFound(format!("{collection}/{id}")),
            other => other,
        })
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let token = self.require_bearer().await?;
        let url = format!("{}/{collection}/{id}", self.documents_url());
        let resp = self.http.delete(url).bearer_auth(token).send().await?;
        check(resp).await?;
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let url = format!("{}:runQuery", self.documents_url());
        let req = self.http.post(url).json(&structured_query(query));
        let resp = self.authorized(req).await?.send().await?;
        let items: Vec<RunQueryItem> = check(resp).await?.json().await?;
        Ok(items
            .into_iter()
            .filter_map(|item| item.document)
            .map(RawDocument::into_document)
            .collect())
    }
}
