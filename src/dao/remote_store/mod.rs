pub mod memory;
#[cfg(feature = "rest-store")]
pub mod rest;

use std::fmt;

use futures::{future::BoxFuture, stream::BoxStream};
use serde_json::{Map, Value};

use crate::dao::storage::StorageResult;

/// A row as exchanged with the remote store: column name to JSON value.
pub type Row = Map<String, Value>;

/// Stream of change notifications produced by [`RemoteStore::subscribe`].
pub type ChangeStream = BoxStream<'static, ChangeEvent>;

/// Tables provisioned in the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Sessions,
    ConditionVotes,
    ConflictVotes,
    FirstMeMessages,
    ProudMoments,
    TeamMessages,
    ProblemKeywords,
    Cheers,
}

impl Table {
    /// Table name as known by the remote store.
    pub fn name(self) -> &'static str {
        match self {
            Table::Sessions => "sessions",
            Table::ConditionVotes => "condition_votes",
            Table::ConflictVotes => "conflict_votes",
            Table::FirstMeMessages => "first_me_messages",
            Table::ProudMoments => "proud_moments",
            Table::TeamMessages => "team_messages",
            Table::ProblemKeywords => "problem_keywords",
            Table::Cheers => "cheers",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Conjunction of column equality predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// Filter matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a `column = value` predicate.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((column.into(), value.into()));
        self
    }

    /// Predicates in insertion order.
    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    /// Whether `row` satisfies every predicate. A missing column never matches.
    pub fn matches(&self, row: &Row) -> bool {
        self.clauses
            .iter()
            .all(|(column, expected)| row.get(column) == Some(expected))
    }
}

/// Sort order applied by a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Filtered, optionally ordered and limited select.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    /// Select rows matching `filter`.
    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Sort by `column` descending.
    pub fn newest_first(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending: false,
        });
        self
    }

    /// Sort by `column` ascending.
    pub fn oldest_first(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending: true,
        });
        self
    }

    /// Keep at most `limit` rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Kind of row mutation reported on a change stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Notification that a row of a subscribed table changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// New row for inserts and updates, old row for deletes.
    pub row: Row,
}

/// Abstraction over the hosted relational store backing every session.
///
/// Writes return the affected rows as the store persisted them, including
/// store-assigned `id` and `created_at` columns.
pub trait RemoteStore: Send + Sync {
    fn insert(&self, table: Table, row: Row) -> BoxFuture<'static, StorageResult<Row>>;
    /// Insert or overwrite the row sharing the `on_conflict` columns.
    fn upsert(
        &self,
        table: Table,
        row: Row,
        on_conflict: &'static [&'static str],
    ) -> BoxFuture<'static, StorageResult<Row>>;
    fn select(&self, table: Table, query: Query) -> BoxFuture<'static, StorageResult<Vec<Row>>>;
    /// Merge `patch` into every matching row, returning how many were touched.
    fn update(
        &self,
        table: Table,
        filter: Filter,
        patch: Row,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    fn delete(&self, table: Table, filter: Filter) -> BoxFuture<'static, StorageResult<u64>>;
    fn count(&self, table: Table, filter: Filter) -> BoxFuture<'static, StorageResult<u64>>;
    /// Stream changes of rows matching `filter`. Dropping the stream unsubscribes.
    fn subscribe(&self, table: Table, filter: Filter) -> ChangeStream;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_requires_every_clause() {
        let row = json!({"session_id": "s1", "voter_id": "v1"})
            .as_object()
            .cloned()
            .unwrap();

        assert!(Filter::all().matches(&row));
        assert!(Filter::all().eq("session_id", "s1").matches(&row));
        assert!(
            !Filter::all()
                .eq("session_id", "s1")
                .eq("voter_id", "v2")
                .matches(&row)
        );
        assert!(!Filter::all().eq("team_number", 3).matches(&row));
    }
}
