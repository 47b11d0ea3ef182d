//! Firestore implementation of `MachineStore` over the REST API.
//!
//! Documents live in the `machines` collection with the fields `type`,
//! `number`, `status` and `college`; the document id is the machine id.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use laundry_core::{Machine, MachineKind, Status, StatusWrite};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use super::{MachineStore, StoreError, MACHINES_COLLECTION};

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com";

/// Connection settings for a Firestore project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// Web API key, sent as the `key` query parameter.
    pub api_key: Option<String>,
    /// OAuth access token, sent as a bearer token.
    pub auth_token: Option<String>,
    /// Override for the API host, e.g. a local emulator.
    pub base_url: Option<String>,
}

impl FirestoreConfig {
    /// Resource name of the database, `projects/<p>/databases/(default)`.
    fn database_name(&self) -> String {
        format!("projects/{}/databases/(default)", self.project_id)
    }

    fn documents_url(&self) -> String {
        let base = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!(
            "{}/v1/{}/documents",
            base.trim_end_matches('/'),
            self.database_name()
        )
    }
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<Document>,
}

/// Firestore-backed machine store.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Client,
    config: FirestoreConfig,
    documents_url: String,
}

impl FirestoreStore {
    pub fn new(config: FirestoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::storage("build http client", e.to_string()))?;
        let documents_url = config.documents_url();
        Ok(Self {
            client,
            config,
            documents_url,
        })
    }

    fn document_url(&self, id: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.documents_url)
            .map_err(|e| StoreError::storage("build url", e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::storage("build url", "base url cannot have a path"))?
            .push(MACHINES_COLLECTION)
            .push(id);
        Ok(url)
    }

    /// Full resource name of a machine document, as used inside commit requests.
    fn document_name(&self, id: &str) -> String {
        format!(
            "{}/documents/{}/{}",
            self.config.database_name(),
            MACHINES_COLLECTION,
            id
        )
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.config.api_key {
            builder = builder.query(&[("key", key)]);
        }
        if let Some(token) = &self.config.auth_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(
        &self,
        operation: &str,
        builder: RequestBuilder,
    ) -> Result<reqwest::Response, StoreError> {
        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::storage(operation, e.to_string()))?;
        Ok(response)
    }

    /// Turn an unsuccessful response into a store error.
    ///
    /// `missing` names the document(s) a write addressed; a response saying
    /// they do not exist becomes `NotFound` instead of a storage failure.
    async fn fail(
        operation: &str,
        response: reqwest::Response,
        missing: Option<&str>,
    ) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        failure(operation, status, &body, missing)
    }
}

/// Whether a failed write was rejected because its target document is absent.
///
/// Single-document PATCH reports this as 404. Inside a commit the
/// `currentDocument.exists` precondition can instead fail with 400
/// `FAILED_PRECONDITION`.
fn is_missing_document(status: StatusCode, body: &str) -> bool {
    status == StatusCode::NOT_FOUND
        || (status == StatusCode::BAD_REQUEST && body.contains("FAILED_PRECONDITION"))
}

fn failure(operation: &str, status: StatusCode, body: &str, missing: Option<&str>) -> StoreError {
    if let Some(id) = missing {
        if is_missing_document(status, body) {
            warn!("Firestore {} target missing: {}", operation, id);
            return StoreError::not_found(id);
        }
    }
    error!("Firestore {} failed: {} - {}", operation, status, body);
    StoreError::storage(operation, format!("{} - {}", status, body))
}

fn field_filter(field: &str, value: &str) -> Value {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field },
            "op": "EQUAL",
            "value": { "stringValue": value }
        }
    })
}

fn status_value(status: Status) -> Value {
    json!({ "integerValue": status.0.to_string() })
}

/// Encode a machine as Firestore document fields.
fn encode_fields(machine: &Machine) -> Value {
    json!({
        "type": { "stringValue": machine.kind.as_str() },
        "number": { "stringValue": machine.number },
        "status": status_value(machine.status),
        "college": { "stringValue": machine.college },
    })
}

fn string_field(fields: &HashMap<String, Value>, key: &str) -> Option<String> {
    let value = fields.get(key)?;
    if let Some(s) = value.get("stringValue").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    // Numbers written by other clients are accepted as labels.
    integer_field(fields, key).map(|n| n.to_string())
}

fn integer_field(fields: &HashMap<String, Value>, key: &str) -> Option<i64> {
    let value = fields.get(key)?;
    if let Some(raw) = value.get("integerValue") {
        return match raw {
            Value::String(s) => s.parse().ok(),
            other => other.as_i64(),
        };
    }
    value
        .get("doubleValue")
        .and_then(Value::as_f64)
        .map(|f| f as i64)
}

/// Decode a Firestore document into a machine record.
fn decode_document(document: &Document) -> Result<Machine, StoreError> {
    let id = document
        .name
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    let corrupt = |what: &str| StoreError::corruption(format!("document {}: {}", id, what));

    let kind: MachineKind = string_field(&document.fields, "type")
        .ok_or_else(|| corrupt("missing type"))?
        .parse()
        .map_err(|e: laundry_core::UnknownMachineKind| corrupt(&e.to_string()))?;
    let number = string_field(&document.fields, "number").ok_or_else(|| corrupt("missing number"))?;
    let status = integer_field(&document.fields, "status").ok_or_else(|| corrupt("missing status"))?;
    let college =
        string_field(&document.fields, "college").ok_or_else(|| corrupt("missing college"))?;

    Ok(Machine {
        id,
        kind,
        number,
        status: Status(status),
        college,
    })
}

#[async_trait]
impl MachineStore for FirestoreStore {
    fn backend_name(&self) -> &'static str {
        "firestore"
    }

    async fn query(&self, college: &str, kind: MachineKind) -> Result<Vec<Machine>, StoreError> {
        let url = Url::parse(&format!("{}:runQuery", self.documents_url))
            .map_err(|e| StoreError::storage("build url", e.to_string()))?;
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": MACHINES_COLLECTION }],
                "where": {
                    "compositeFilter": {
                        "op": "AND",
                        "filters": [
                            field_filter("college", college),
                            field_filter("type", kind.as_str()),
                        ]
                    }
                }
            }
        });

        let response = self
            .send("query", self.request(Method::POST, url).json(&body))
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail("query", response, None).await);
        }

        let items: Vec<RunQueryItem> = response
            .json()
            .await
            .map_err(|e| StoreError::corruption(format!("runQuery response: {}", e)))?;

        let mut machines = Vec::with_capacity(items.len());
        for document in items.iter().filter_map(|item| item.document.as_ref()) {
            match decode_document(document) {
                Ok(machine) => machines.push(machine),
                Err(e) => warn!("Skipping machine document: {}", e),
            }
        }
        debug!(
            "Firestore query {}/{} returned {} document(s)",
            college,
            kind,
            machines.len()
        );
        Ok(machines)
    }

    async fn get(&self, id: &str) -> Result<Option<Machine>, StoreError> {
        let url = self.document_url(id)?;
        let response = self.send("get", self.request(Method::GET, url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::fail("get", response, None).await);
        }
        let document: Document = response
            .json()
            .await
            .map_err(|e| StoreError::corruption(format!("document {}: {}", id, e)))?;
        decode_document(&document).map(Some)
    }

    async fn put(&self, machine: &Machine) -> Result<(), StoreError> {
        let url = self.document_url(&machine.id)?;
        let body = json!({ "fields": encode_fields(machine) });
        let response = self
            .send("put", self.request(Method::PATCH, url).json(&body))
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail("put", response, None).await);
        }
        Ok(())
    }

    async fn set_status(&self, id: &str, status: Status) -> Result<(), StoreError> {
        let url = self.document_url(id)?;
        let body = json!({ "fields": { "status": status_value(status) } });
        let builder = self
            .request(Method::PATCH, url)
            .query(&[
                ("updateMask.fieldPaths", "status"),
                ("currentDocument.exists", "true"),
            ])
            .json(&body);
        let response = self.send("set_status", builder).await?;
        if !response.status().is_success() {
            return Err(Self::fail("set_status", response, Some(id)).await);
        }
        Ok(())
    }

    async fn apply_status_writes(&self, writes: &[StatusWrite]) -> Result<(), StoreError> {
        let url = Url::parse(&format!("{}:commit", self.documents_url))
            .map_err(|e| StoreError::storage("build url", e.to_string()))?;
        let body = json!({
            "writes": writes
                .iter()
                .map(|w| json!({
                    "update": {
                        "name": self.document_name(&w.id),
                        "fields": { "status": status_value(w.to) }
                    },
                    "updateMask": { "fieldPaths": ["status"] },
                    "currentDocument": { "exists": true }
                }))
                .collect::<Vec<_>>()
        });

        let response = self
            .send("commit", self.request(Method::POST, url).json(&body))
            .await?;
        if !response.status().is_success() {
            let ids: Vec<&str> = writes.iter().map(|w| w.id.as_str()).collect();
            return Err(Self::fail("commit", response, Some(&ids.join(","))).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FirestoreConfig {
        FirestoreConfig {
            project_id: "rice-laundry".to_string(),
            api_key: None,
            auth_token: None,
            base_url: None,
        }
    }

    fn document(name: &str, fields: Value) -> Document {
        serde_json::from_value(json!({ "name": name, "fields": fields })).unwrap()
    }

    #[test]
    fn test_commit_precondition_failure_is_not_found() {
        let body = r#"{"error": {"code": 400, "message": "no entity to update", "status": "FAILED_PRECONDITION"}}"#;
        let err = failure("commit", StatusCode::BAD_REQUEST, body, Some("a,b"));
        assert_eq!(err, StoreError::not_found("a,b"));

        let err = failure("set_status", StatusCode::NOT_FOUND, "", Some("a"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_other_failures_are_storage_errors() {
        let body = r#"{"error": {"code": 400, "status": "INVALID_ARGUMENT"}}"#;
        let err = failure("commit", StatusCode::BAD_REQUEST, body, Some("a"));
        assert!(matches!(err, StoreError::Storage { .. }));

        // Reads never turn a 404 into NotFound here; `get` handles it first.
        let err = failure("query", StatusCode::NOT_FOUND, "", None);
        assert!(matches!(err, StoreError::Storage { .. }));

        let err = failure("put", StatusCode::FORBIDDEN, "denied", None);
        assert_eq!(err, StoreError::storage("put", "403 Forbidden - denied"));
    }

    #[test]
    fn test_documents_url() {
        assert_eq!(
            config().documents_url(),
            "https://firestore.googleapis.com/v1/projects/rice-laundry/databases/(default)/documents"
        );
        let emulator = FirestoreConfig {
            base_url: Some("http://localhost:8080/".to_string()),
            ..config()
        };
        assert!(emulator
            .documents_url()
            .starts_with("http://localhost:8080/v1/projects/"));
    }

    #[test]
    fn test_document_url_escapes_id() {
        let store = FirestoreStore::new(config()).unwrap();
        let url = store.document_url("a b?c").unwrap();
        assert!(url.as_str().ends_with("/documents/machines/a%20b%3Fc"));
    }

    #[test]
    fn test_document_name() {
        let store = FirestoreStore::new(config()).unwrap();
        assert_eq!(
            store.document_name("mock-baker-bin-1"),
            "projects/rice-laundry/databases/(default)/documents/machines/mock-baker-bin-1"
        );
    }

    #[test]
    fn test_decode_document() {
        let doc = document(
            "projects/p/databases/(default)/documents/machines/mock-baker-washer-3",
            json!({
                "type": { "stringValue": "washer" },
                "number": { "stringValue": "3" },
                "status": { "integerValue": "1" },
                "college": { "stringValue": "baker" }
            }),
        );
        let machine = decode_document(&doc).unwrap();
        assert_eq!(machine.id, "mock-baker-washer-3");
        assert_eq!(machine.kind, MachineKind::Washer);
        assert_eq!(machine.status, Status::IN_USE);
        assert_eq!(machine.number, "3");
    }

    #[test]
    fn test_decode_accepts_numeric_label_and_double_status() {
        let doc = document(
            "projects/p/databases/(default)/documents/machines/x",
            json!({
                "type": { "stringValue": "bin" },
                "number": { "integerValue": "12" },
                "status": { "doubleValue": 1.0 },
                "college": { "stringValue": "jones" }
            }),
        );
        let machine = decode_document(&doc).unwrap();
        assert_eq!(machine.number, "12");
        assert_eq!(machine.status, Status::FULL);
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let doc = document(
            "projects/p/databases/(default)/documents/machines/x",
            json!({
                "type": { "stringValue": "tumbler" },
                "number": { "stringValue": "1" },
                "status": { "integerValue": "0" },
                "college": { "stringValue": "jones" }
            }),
        );
        assert!(matches!(
            decode_document(&doc),
            Err(StoreError::Corruption { .. })
        ));
    }

    #[test]
    fn test_encode_fields() {
        let fields = encode_fields(&Machine::mock("baker", MachineKind::Dryer, 2));
        assert_eq!(fields["type"]["stringValue"], "dryer");
        assert_eq!(fields["number"]["stringValue"], "2");
        assert_eq!(fields["status"]["integerValue"], "0");
        assert_eq!(fields["college"]["stringValue"], "baker");
    }
}
