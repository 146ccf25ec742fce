pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::Result;

/// A filter predicate on a table column.
#[derive(Debug, Clone)]
pub enum Filter {
    Eq(String, Value),
    /// Case-insensitive substring/pattern match; `%` wildcards as in SQL.
    Ilike(String, String),
    IsNull(String),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn ilike(column: &str, pattern: &str) -> Self {
        Filter::Ilike(column.to_string(), pattern.to_string())
    }

    pub fn is_null(column: &str) -> Self {
        Filter::IsNull(column.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }
}

/// Page window `[offset, offset + limit)`.
#[derive(Debug, Clone, Copy)]
pub struct Range {
    pub offset: usize,
    pub limit: usize,
}

/// How an embedded resource relates to the parent row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// At most one foreign row, embedded as an object (or null).
    One,
    /// All matching foreign rows, embedded as an array.
    Many,
    /// Only the number of matching foreign rows.
    Count,
}

/// An embedded resource: rows of `table` where
/// `foreign[on_foreign] == parent[on_local]`, projected to `columns`
/// (empty meaning all) and attached to the parent row under `alias`.
#[derive(Debug, Clone)]
pub struct Join {
    pub alias: String,
    pub table: String,
    pub on_local: String,
    pub on_foreign: String,
    pub columns: Vec<String>,
    pub kind: JoinKind,
    pub nested: Vec<Join>,
}

impl Join {
    pub fn one(alias: &str, table: &str, on_local: &str, columns: &[&str]) -> Self {
        Self {
            alias: alias.to_string(),
            table: table.to_string(),
            on_local: on_local.to_string(),
            on_foreign: "id".to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            kind: JoinKind::One,
            nested: Vec::new(),
        }
    }

    pub fn many(alias: &str, table: &str, on_foreign: &str, columns: &[&str]) -> Self {
        Self {
            alias: alias.to_string(),
            table: table.to_string(),
            on_local: "id".to_string(),
            on_foreign: on_foreign.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            kind: JoinKind::Many,
            nested: Vec::new(),
        }
    }

    pub fn count(alias: &str, table: &str, on_foreign: &str) -> Self {
        Self {
            alias: alias.to_string(),
            table: table.to_string(),
            on_local: "id".to_string(),
            on_foreign: on_foreign.to_string(),
            columns: Vec::new(),
            kind: JoinKind::Count,
            nested: Vec::new(),
        }
    }

    pub fn with_nested(mut self, nested: Vec<Join>) -> Self {
        self.nested = nested;
        self
    }
}

/// A select over one table: projection, embeds, predicates, order, window.
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    pub columns: Vec<String>,
    pub joins: Vec<Join>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub range: Option<Range>,
}

impl SelectQuery {
    /// Select all columns of the table.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn joins(mut self, joins: Vec<Join>) -> Self {
        self.joins.extend(joins);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn range(mut self, offset: usize, limit: usize) -> Self {
        self.range = Some(Range { offset, limit });
        self
    }
}

/// The signed-in viewer as reported by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// The hosted backend, reduced to its query-builder surface.
///
/// Every repository function takes a `&dyn Store` so callers construct
/// the client once and tests substitute [`memory::MemoryStore`].
#[async_trait]
pub trait Store: Send + Sync {
    async fn select(&self, table: &str, query: SelectQuery) -> Result<Vec<Value>>;

    /// Like [`Store::select`] but for single-row reads: zero rows is a
    /// non-error `None`.
    async fn select_one(&self, table: &str, query: SelectQuery) -> Result<Option<Value>>;

    /// Insert one row and return it projected through `returning` embeds.
    /// `id` and `created_at` are assigned by the backend when absent.
    async fn insert(&self, table: &str, row: Value, returning: &[Join]) -> Result<Value>;

    /// Insert unless a row with the same `conflict_keys` values already
    /// exists. Returns whether a row was actually inserted. The whole
    /// operation is atomic on the backend.
    async fn insert_ignore(&self, table: &str, row: Value, conflict_keys: &[&str])
        -> Result<bool>;

    /// Patch all rows matching `filters` and return the first updated row
    /// projected through `returning`; `NotFound` when nothing matched.
    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
        returning: &[Join],
    ) -> Result<Value>;

    /// Delete matching rows, returning how many were removed.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64>;

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64>;

    /// The current viewer, `None` when nobody is signed in.
    async fn current_user(&self) -> Result<Option<AuthUser>>;

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;

    async fn remove(&self, bucket: &str, path: &str) -> Result<()>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}
