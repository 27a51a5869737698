//! In-process [`RemoteStore`] used by tests and local runs without a hosted backend.

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering as AtomicOrdering},
    },
};

use futures::{StreamExt, future::BoxFuture};
use serde_json::Value;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::dao::storage::{StorageError, StorageResult};

use super::{ChangeEvent, ChangeKind, ChangeStream, Filter, Query, RemoteStore, Row, Table};

const CHANGE_CAPACITY: usize = 256;

/// Failures of the in-memory store.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    /// The store was switched offline to simulate a network outage.
    #[error("in-memory store is offline")]
    Offline,
}

impl From<MemoryStoreError> for StorageError {
    fn from(err: MemoryStoreError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

struct Inner {
    tables: Mutex<HashMap<Table, Vec<Row>>>,
    changes: broadcast::Sender<ChangeEvent>,
    offline: AtomicBool,
}

/// Shared, cloneable in-memory tables with a change feed.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(HashMap::new()),
                changes,
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Make every subsequent operation fail (or succeed again) until toggled back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Insert a row directly, bypassing the offline switch. Non-object values are ignored.
    pub fn seed(&self, table: Table, row: Value) -> Option<Row> {
        let Value::Object(mut row) = row else {
            return None;
        };
        fill_defaults(&mut row);
        self.with_tables(|tables| tables.entry(table).or_default().push(row.clone()));
        Some(row)
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(AtomicOrdering::SeqCst) {
            Err(MemoryStoreError::Offline.into())
        } else {
            Ok(())
        }
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut HashMap<Table, Vec<Row>>) -> T) -> T {
        let mut guard = self
            .inner
            .tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn publish(&self, table: Table, kind: ChangeKind, row: Row) {
        let _ = self.inner.changes.send(ChangeEvent { table, kind, row });
    }

    fn insert_now(&self, table: Table, mut row: Row) -> StorageResult<Row> {
        self.ensure_online()?;
        fill_defaults(&mut row);
        self.with_tables(|tables| tables.entry(table).or_default().push(row.clone()));
        self.publish(table, ChangeKind::Insert, row.clone());
        Ok(row)
    }

    fn upsert_now(
        &self,
        table: Table,
        row: Row,
        on_conflict: &[&str],
    ) -> StorageResult<Row> {
        self.ensure_online()?;
        if let Some(missing) = on_conflict.iter().find(|column| !row.contains_key(**column)) {
            return Err(StorageError::rejected(format!(
                "upsert into `{table}` lacks conflict column `{missing}`"
            )));
        }

        let updated = self.with_tables(|tables| {
            let rows = tables.entry(table).or_default();
            let existing = rows.iter_mut().find(|candidate| {
                on_conflict
                    .iter()
                    .all(|column| candidate.get(*column) == row.get(*column))
            })?;
            for (column, value) in &row {
                existing.insert(column.clone(), value.clone());
            }
            Some(existing.clone())
        });

        match updated {
            Some(updated) => {
                self.publish(table, ChangeKind::Update, updated.clone());
                Ok(updated)
            }
            None => self.insert_now(table, row),
        }
    }

    fn select_now(&self, table: Table, query: Query) -> StorageResult<Vec<Row>> {
        self.ensure_online()?;
        let mut rows: Vec<Row> = self.with_tables(|tables| {
            tables
                .get(&table)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| query.filter.matches(row))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        });

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    fn update_now(&self, table: Table, filter: Filter, patch: Row) -> StorageResult<u64> {
        self.ensure_online()?;
        let touched = self.with_tables(|tables| {
            let mut touched = Vec::new();
            if let Some(rows) = tables.get_mut(&table) {
                for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                    for (column, value) in &patch {
                        row.insert(column.clone(), value.clone());
                    }
                    touched.push(row.clone());
                }
            }
            touched
        });

        let count = touched.len() as u64;
        for row in touched {
            self.publish(table, ChangeKind::Update, row);
        }
        Ok(count)
    }

    fn delete_now(&self, table: Table, filter: Filter) -> StorageResult<u64> {
        self.ensure_online()?;
        let removed = self.with_tables(|tables| {
            let Some(rows) = tables.get_mut(&table) else {
                return Vec::new();
            };
            let (removed, kept): (Vec<Row>, Vec<Row>) =
                rows.drain(..).partition(|row| filter.matches(row));
            *rows = kept;
            removed
        });

        let count = removed.len() as u64;
        for row in removed {
            self.publish(table, ChangeKind::Delete, row);
        }
        Ok(count)
    }

    fn count_now(&self, table: Table, filter: Filter) -> StorageResult<u64> {
        self.ensure_online()?;
        Ok(self.with_tables(|tables| {
            tables
                .get(&table)
                .map(|rows| rows.iter().filter(|row| filter.matches(row)).count() as u64)
                .unwrap_or(0)
        }))
    }
}

impl RemoteStore for MemoryStore {
    fn insert(&self, table: Table, row: Row) -> BoxFuture<'static, StorageResult<Row>> {
        let store = self.clone();
        Box::pin(async move { store.insert_now(table, row) })
    }

    fn upsert(
        &self,
        table: Table,
        row: Row,
        on_conflict: &'static [&'static str],
    ) -> BoxFuture<'static, StorageResult<Row>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_now(table, row, on_conflict) })
    }

    fn select(&self, table: Table, query: Query) -> BoxFuture<'static, StorageResult<Vec<Row>>> {
        let store = self.clone();
        Box::pin(async move { store.select_now(table, query) })
    }

    fn update(
        &self,
        table: Table,
        filter: Filter,
        patch: Row,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.update_now(table, filter, patch) })
    }

    fn delete(&self, table: Table, filter: Filter) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.delete_now(table, filter) })
    }

    fn count(&self, table: Table, filter: Filter) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count_now(table, filter) })
    }

    fn subscribe(&self, table: Table, filter: Filter) -> ChangeStream {
        let receiver = self.inner.changes.subscribe();
        BroadcastStream::new(receiver)
            .filter_map(move |received| {
                // Lagged receivers skip the missed events; the next poll catches up.
                let event = received
                    .ok()
                    .filter(|event| event.table == table && filter.matches(&event.row));
                futures::future::ready(event)
            })
            .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }
}

fn fill_defaults(row: &mut Row) {
    row.entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    if !row.contains_key("created_at") {
        let now = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        row.insert("created_at".into(), Value::String(now));
    }
}

/// Order JSON scalars the way the relational store orders the underlying columns.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (
                OffsetDateTime::parse(a, &Rfc3339),
                OffsetDateTime::parse(b, &Rfc3339),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        // Nulls sort last in ascending order, like the relational default.
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), Some(_)) => Ordering::Greater,
        (Some(_), None | Some(Value::Null)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}
