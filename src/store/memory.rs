use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::core::errors::{ApiError, Result};
use crate::core::helpers::{new_id, now_iso};

use super::{AuthUser, Filter, Join, JoinKind, SelectQuery, Store};

/// In-memory [`Store`] for tests and offline demos. Tables are plain JSON
/// rows; filters and embeds are interpreted with the same semantics the
/// HTTP client delegates to the backend.
///
/// Failure injection lets tests force the degraded feed paths:
/// `fail_joined_selects` rejects only selects carrying embeds (the
/// primary joined query), `fail_table` rejects reads of one table (e.g.
/// author lookups), `fail_all_selects` rejects every read.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    current_user: Mutex<Option<AuthUser>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_all_selects: AtomicBool,
    fail_joined_selects: AtomicBool,
    fail_tables: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user_id: &str) {
        *self.current_user.lock().expect("auth lock poisoned") = Some(AuthUser {
            id: user_id.to_string(),
            email: None,
        });
    }

    pub fn sign_out(&self) {
        *self.current_user.lock().expect("auth lock poisoned") = None;
    }

    pub fn fail_all_selects(&self, on: bool) {
        self.fail_all_selects.store(on, AtomicOrdering::SeqCst);
    }

    pub fn fail_joined_selects(&self, on: bool) {
        self.fail_joined_selects.store(on, AtomicOrdering::SeqCst);
    }

    pub fn fail_table(&self, table: &str, on: bool) {
        let mut failing = self.fail_tables.lock().expect("fail lock poisoned");
        if on {
            failing.insert(table.to_string());
        } else {
            failing.remove(table);
        }
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .expect("tables lock poisoned")
            .get(table)
            .map_or(0, Vec::len)
    }

    fn check_read(&self, table: &str, joined: bool) -> Result<()> {
        if self.fail_all_selects.load(AtomicOrdering::SeqCst) {
            return Err(ApiError::Persistence("injected failure: all selects".to_string()));
        }
        if joined && self.fail_joined_selects.load(AtomicOrdering::SeqCst) {
            return Err(ApiError::Persistence(
                "injected failure: joined selects".to_string(),
            ));
        }
        let failing = self.fail_tables.lock().expect("fail lock poisoned");
        if failing.contains(table) {
            return Err(ApiError::Persistence(format!("injected failure: {}", table)));
        }
        Ok(())
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, value) => row.get(column) == Some(value),
        Filter::Ilike(column, pattern) => {
            let Some(candidate) = row.get(column).and_then(Value::as_str) else {
                return false;
            };
            ilike(&candidate.to_lowercase(), &pattern.to_lowercase())
        }
        Filter::IsNull(column) => row.get(column).map_or(true, Value::is_null),
        Filter::Or(inner) => inner.iter().any(|f| matches(row, f)),
    }
}

fn ilike(candidate: &str, pattern: &str) -> bool {
    let inner = pattern.trim_matches('%');
    match (pattern.starts_with('%'), pattern.ends_with('%')) {
        (true, true) => candidate.contains(inner),
        (true, false) => candidate.ends_with(inner),
        (false, true) => candidate.starts_with(inner),
        (false, false) => candidate == inner,
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn project(row: &Value, columns: &[String]) -> Value {
    if columns.is_empty() || columns.iter().any(|c| c == "*") {
        return row.clone();
    }
    let mut out = Map::new();
    // Absent columns stay absent rather than becoming explicit nulls, as
    // the backend renders sparse rows.
    for column in columns {
        if let Some(value) = row.get(column) {
            out.insert(column.clone(), value.clone());
        }
    }
    Value::Object(out)
}

fn embed(tables: &HashMap<String, Vec<Value>>, row: &Value, columns: &[String], joins: &[Join]) -> Value {
    let mut out = project(row, columns);
    let empty = Vec::new();
    for join in joins {
        let foreign = tables.get(&join.table).unwrap_or(&empty);
        let key = row.get(&join.on_local).cloned().unwrap_or(Value::Null);
        let mut hits: Vec<&Value> = if key.is_null() {
            Vec::new()
        } else {
            foreign
                .iter()
                .filter(|f| f.get(&join.on_foreign) == Some(&key))
                .collect()
        };
        let value = match join.kind {
            // Same wrapper shape the backend renders for count embeds.
            JoinKind::Count => json!([{ "count": hits.len() }]),
            JoinKind::One => hits
                .first()
                .map(|hit| embed(tables, hit, &join.columns, &join.nested))
                .unwrap_or(Value::Null),
            JoinKind::Many => {
                // Deterministic embed order: oldest first when timestamped.
                hits.sort_by(|a, b| {
                    compare(
                        a.get("created_at").unwrap_or(&Value::Null),
                        b.get("created_at").unwrap_or(&Value::Null),
                    )
                });
                Value::Array(
                    hits.iter()
                        .map(|hit| embed(tables, hit, &join.columns, &join.nested))
                        .collect(),
                )
            }
        };
        if let Some(object) = out.as_object_mut() {
            object.insert(join.alias.clone(), value);
        }
    }
    out
}

fn fill_row_defaults(row: &mut Value) {
    if let Some(object) = row.as_object_mut() {
        if !object.contains_key("id") {
            object.insert("id".to_string(), json!(new_id()));
        }
        if !object.contains_key("created_at") {
            object.insert("created_at".to_string(), json!(now_iso()));
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, table: &str, query: SelectQuery) -> Result<Vec<Value>> {
        self.check_read(table, !query.joins.is_empty())?;
        let tables = self.tables.lock().expect("tables lock poisoned");
        let empty = Vec::new();
        let mut rows: Vec<&Value> = tables
            .get(table)
            .unwrap_or(&empty)
            .iter()
            .filter(|row| query.filters.iter().all(|f| matches(row, f)))
            .collect();
        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                );
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        let windowed: Vec<&Value> = match query.range {
            Some(range) => rows.into_iter().skip(range.offset).take(range.limit).collect(),
            None => rows,
        };
        Ok(windowed
            .into_iter()
            .map(|row| embed(&tables, row, &query.columns, &query.joins))
            .collect())
    }

    async fn select_one(&self, table: &str, query: SelectQuery) -> Result<Option<Value>> {
        let rows = self.select(table, query.range(0, 1)).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, table: &str, mut row: Value, returning: &[Join]) -> Result<Value> {
        fill_row_defaults(&mut row);
        let mut tables = self.tables.lock().expect("tables lock poisoned");
        tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(embed(&tables, &row, &[], returning))
    }

    async fn insert_ignore(
        &self,
        table: &str,
        mut row: Value,
        conflict_keys: &[&str],
    ) -> Result<bool> {
        let mut tables = self.tables.lock().expect("tables lock poisoned");
        let existing = tables.entry(table.to_string()).or_default();
        let conflict = existing.iter().any(|candidate| {
            conflict_keys
                .iter()
                .all(|key| candidate.get(*key) == row.get(*key))
        });
        if conflict {
            return Ok(false);
        }
        fill_row_defaults(&mut row);
        existing.push(row);
        Ok(true)
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
        returning: &[Join],
    ) -> Result<Value> {
        let mut tables = self.tables.lock().expect("tables lock poisoned");
        let mut updated = None;
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut() {
                if !filters.iter().all(|f| matches(row, f)) {
                    continue;
                }
                if let (Some(object), Some(changes)) = (row.as_object_mut(), patch.as_object()) {
                    for (key, value) in changes {
                        object.insert(key.clone(), value.clone());
                    }
                }
                if updated.is_none() {
                    updated = Some(row.clone());
                }
            }
        }
        match updated {
            Some(row) => Ok(embed(&tables, &row, &[], returning)),
            None => Err(ApiError::NotFound(table.to_string())),
        }
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let mut tables = self.tables.lock().expect("tables lock poisoned");
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !filters.iter().all(|f| matches(row, f)));
        Ok((before - rows.len()) as u64)
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        self.check_read(table, false)?;
        let tables = self.tables.lock().expect("tables lock poisoned");
        let empty = Vec::new();
        let n = tables
            .get(table)
            .unwrap_or(&empty)
            .iter()
            .filter(|row| filters.iter().all(|f| matches(row, f)))
            .count();
        Ok(n as u64)
    }

    async fn current_user(&self) -> Result<Option<AuthUser>> {
        Ok(self.current_user.lock().expect("auth lock poisoned").clone())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<()> {
        self.objects
            .lock()
            .expect("objects lock poisoned")
            .insert(format!("{}/{}", bucket, path), bytes);
        Ok(())
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<()> {
        self.objects
            .lock()
            .expect("objects lock poisoned")
            .remove(&format!("{}/{}", bucket, path));
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://{}/{}", bucket, path)
    }
}
