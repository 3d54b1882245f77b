//! In-process REST store.
//!
//! # Responsibility
//! - Serve the full store contract (CRUD + association endpoints) from memory.
//! - Record every request so callers can assert on network behaviour.
//! - Inject failures by method and path prefix.
//!
//! # Invariants
//! - Ids are assigned by the store on `POST`, never by the caller.
//! - Deleting a row drops every link that names it, as owner or target.
//! - Recorded requests include requests that were answered with a failure.

use super::{Method, RestRequest, RestTransport, TransportError, TransportResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Request as seen by the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
}

type LinkKey = (String, String, String);

#[derive(Default)]
struct MemoryState {
    rows: BTreeMap<String, BTreeMap<String, Map<String, Value>>>,
    links: BTreeMap<LinkKey, Vec<String>>,
    requests: Vec<RecordedRequest>,
    failures: Vec<(Method, String)>,
}

/// REST transport backed by in-memory tables.
#[derive(Default)]
pub struct InMemoryTransport {
    state: Mutex<MemoryState>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Counts recorded requests with `method`.
    pub fn count(&self, method: Method) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|request| request.method == method)
            .count()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    /// Answers every later request matching `method` and `path_prefix` with a
    /// 500 status.
    pub fn fail_on(&self, method: Method, path_prefix: impl Into<String>) {
        self.lock().failures.push((method, path_prefix.into()));
    }

    /// Returns one stored row, bypassing the request log.
    pub fn row(&self, table: &str, id: &str) -> Option<Value> {
        self.lock()
            .rows
            .get(table)
            .and_then(|rows| rows.get(id))
            .map(|row| Value::Object(row.clone()))
    }

    /// Returns stored row count for `table`, bypassing the request log.
    pub fn row_count(&self, table: &str) -> usize {
        self.lock().rows.get(table).map_or(0, BTreeMap::len)
    }

    /// Returns target ids linked from one owner, bypassing the request log.
    pub fn linked_ids(&self, owner_table: &str, owner_id: &str, target_table: &str) -> Vec<String> {
        self.lock()
            .links
            .get(&link_key(owner_table, owner_id, target_table))
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RestTransport for InMemoryTransport {
    async fn send(&self, request: RestRequest) -> TransportResult<Option<Value>> {
        let RestRequest { method, path, body } = request;
        let mut state = self.lock();
        state.requests.push(RecordedRequest {
            method,
            path: path.clone(),
        });

        let injected = state
            .failures
            .iter()
            .any(|(failing, prefix)| *failing == method && path.starts_with(prefix.as_str()));
        if injected {
            return Err(TransportError::Status {
                status: 500,
                message: format!("injected failure for {method} {path}"),
            });
        }

        let segments: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
        match (method, segments.as_slice()) {
            (Method::Get, [table]) => Ok(Some(state.list(table))),
            (Method::Post, [table]) => state.create(table, body).map(Some),
            (Method::Get, [table, id]) => state.read(table, id, &path).map(Some),
            (Method::Put, [table, id]) => state.update(table, id, body, &path).map(Some),
            (Method::Delete, [table, id]) => state.delete(table, id, &path).map(|()| None),
            (Method::Get, [owner, owner_id, target]) => {
                state.linked(owner, owner_id, target, &path).map(Some)
            }
            (Method::Put, [owner, owner_id, target, target_id]) => state
                .link(owner, owner_id, target, target_id, &path)
                .map(|()| None),
            (Method::Delete, [owner, owner_id, target, target_id]) => state
                .unlink(owner, owner_id, target, target_id, &path)
                .map(|()| None),
            _ => Err(TransportError::NotFound(path.clone())),
        }
    }
}

impl MemoryState {
    fn list(&self, table: &str) -> Value {
        let rows = self
            .rows
            .get(table)
            .map(|rows| rows.values().cloned().map(Value::Object).collect())
            .unwrap_or_default();
        Value::Array(rows)
    }

    fn create(&mut self, table: &str, body: Option<Value>) -> TransportResult<Value> {
        let mut row = into_object(body)?;
        let id = Uuid::new_v4().to_string();
        let now = now_epoch_ms();
        row.insert("id".to_string(), Value::String(id.clone()));
        row.insert("createdAt".to_string(), Value::from(now));
        row.insert("updatedAt".to_string(), Value::from(now));
        self.rows
            .entry(table.to_string())
            .or_default()
            .insert(id, row.clone());
        Ok(Value::Object(row))
    }

    fn read(&self, table: &str, id: &str, path: &str) -> TransportResult<Value> {
        self.rows
            .get(table)
            .and_then(|rows| rows.get(id))
            .map(|row| Value::Object(row.clone()))
            .ok_or_else(|| TransportError::NotFound(path.to_string()))
    }

    fn update(
        &mut self,
        table: &str,
        id: &str,
        body: Option<Value>,
        path: &str,
    ) -> TransportResult<Value> {
        let mut incoming = into_object(body)?;
        let existing = self
            .rows
            .get_mut(table)
            .and_then(|rows| rows.get_mut(id))
            .ok_or_else(|| TransportError::NotFound(path.to_string()))?;

        let created_at = existing.get("createdAt").cloned().unwrap_or(Value::Null);
        incoming.insert("id".to_string(), Value::String(id.to_string()));
        incoming.insert("createdAt".to_string(), created_at);
        incoming.insert("updatedAt".to_string(), Value::from(now_epoch_ms()));
        *existing = incoming;
        Ok(Value::Object(existing.clone()))
    }

    fn delete(&mut self, table: &str, id: &str, path: &str) -> TransportResult<()> {
        let removed = self
            .rows
            .get_mut(table)
            .and_then(|rows| rows.remove(id))
            .is_some();
        if !removed {
            return Err(TransportError::NotFound(path.to_string()));
        }

        self.links
            .retain(|(owner_table, owner_id, _), _| !(owner_table == table && owner_id == id));
        for ((_, _, target_table), targets) in self.links.iter_mut() {
            if target_table == table {
                targets.retain(|target| target != id);
            }
        }
        Ok(())
    }

    fn linked(
        &self,
        owner_table: &str,
        owner_id: &str,
        target_table: &str,
        path: &str,
    ) -> TransportResult<Value> {
        if !self.exists(owner_table, owner_id) {
            return Err(TransportError::NotFound(path.to_string()));
        }
        let targets = self
            .links
            .get(&link_key(owner_table, owner_id, target_table))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.rows.get(target_table).and_then(|rows| rows.get(id)))
                    .cloned()
                    .map(Value::Object)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Value::Array(targets))
    }

    fn link(
        &mut self,
        owner_table: &str,
        owner_id: &str,
        target_table: &str,
        target_id: &str,
        path: &str,
    ) -> TransportResult<()> {
        if !self.exists(owner_table, owner_id) || !self.exists(target_table, target_id) {
            return Err(TransportError::NotFound(path.to_string()));
        }
        let targets = self
            .links
            .entry(link_key(owner_table, owner_id, target_table))
            .or_default();
        if targets.iter().any(|id| id == target_id) {
            return Err(TransportError::Status {
                status: 409,
                message: format!("link already exists: {path}"),
            });
        }
        targets.push(target_id.to_string());
        Ok(())
    }

    fn unlink(
        &mut self,
        owner_table: &str,
        owner_id: &str,
        target_table: &str,
        target_id: &str,
        path: &str,
    ) -> TransportResult<()> {
        let targets = self
            .links
            .get_mut(&link_key(owner_table, owner_id, target_table))
            .ok_or_else(|| TransportError::NotFound(path.to_string()))?;
        let before = targets.len();
        targets.retain(|id| id != target_id);
        if targets.len() == before {
            return Err(TransportError::NotFound(path.to_string()));
        }
        Ok(())
    }

    fn exists(&self, table: &str, id: &str) -> bool {
        self.rows
            .get(table)
            .is_some_and(|rows| rows.contains_key(id))
    }
}

fn link_key(owner_table: &str, owner_id: &str, target_table: &str) -> LinkKey {
    (
        owner_table.to_string(),
        owner_id.to_string(),
        target_table.to_string(),
    )
}

fn into_object(body: Option<Value>) -> TransportResult<Map<String, Value>> {
    match body {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(TransportError::Status {
            status: 400,
            message: "request body must be a JSON object".to_string(),
        }),
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::InMemoryTransport;
    use crate::transport::{Method, RestRequest, RestTransport, TransportError};
    use serde_json::json;

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let store = InMemoryTransport::new();
        let row = store
            .send(RestRequest::post("widgets", json!({ "name": "clock" })))
            .await
            .unwrap()
            .unwrap();

        let id = row["id"].as_str().unwrap();
        assert!(row["createdAt"].is_i64());
        assert_eq!(store.row("widgets", id).unwrap()["name"], "clock");
    }

    #[tokio::test]
    async fn delete_drops_links_in_both_directions() {
        let store = InMemoryTransport::new();
        let zone = store
            .send(RestRequest::post("zones", json!({})))
            .await
            .unwrap()
            .unwrap();
        let call = store
            .send(RestRequest::post("calls", json!({})))
            .await
            .unwrap()
            .unwrap();
        let zone_id = zone["id"].as_str().unwrap();
        let call_id = call["id"].as_str().unwrap();

        store
            .send(RestRequest::put(
                format!("zones/{zone_id}/calls/{call_id}"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(store.linked_ids("zones", zone_id, "calls"), vec![call_id]);

        store
            .send(RestRequest::delete(format!("calls/{call_id}")))
            .await
            .unwrap();
        assert!(store.linked_ids("zones", zone_id, "calls").is_empty());
    }

    #[tokio::test]
    async fn injected_failure_is_recorded_and_reported() {
        let store = InMemoryTransport::new();
        store.fail_on(Method::Post, "calls");

        let err = store
            .send(RestRequest::post("calls", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 500, .. }));
        assert_eq!(store.request_count(), 1);
        assert_eq!(store.row_count("calls"), 0);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let store = InMemoryTransport::new();
        let err = store
            .send(RestRequest::get("a/b/c/d/e"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotFound(_)));
    }
}
