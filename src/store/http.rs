use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use crate::config::StoreConfig;
use crate::core::errors::{ApiError, Result};

use super::{AuthUser, Filter, Join, JoinKind, SelectQuery, Store};

/// REST client for the hosted backend: PostgREST for rows, GoTrue for the
/// current-user lookup, the storage API for objects.
pub struct HttpStore {
    http: reqwest::Client,
    base: String,
    key: String,
    access_token: RwLock<Option<String>>,
}

impl HttpStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::Config(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            base: config.url.trim_end_matches('/').to_string(),
            key: config.key,
            access_token: RwLock::new(None),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(StoreConfig::from_env()?)
    }

    /// Attach (or clear) the signed-in session's access token. Requests
    /// fall back to the anonymous key when no token is set.
    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().expect("access token lock poisoned") = token;
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .expect("access token lock poisoned")
            .clone()
            .unwrap_or_else(|| self.key.clone())
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(&self.key) {
            headers.insert("apikey", v);
        }
        if let Ok(v) = HeaderValue::from_str(&format!("Bearer {}", self.bearer())) {
            headers.insert(AUTHORIZATION, v);
        }
        headers
    }

    fn rest(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base, table)
    }

    async fn checked(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        Err(ApiError::Persistence(format!("{}: {}", status, snippet)))
    }
}

/// Render the `select=` projection, embeds included. Foreign-key hints
/// follow the backend's `<table>_<column>_fkey` constraint naming.
fn select_param(parent_table: &str, columns: &[String], joins: &[Join]) -> String {
    let mut parts: Vec<String> = if columns.is_empty() {
        vec!["*".to_string()]
    } else {
        columns.to_vec()
    };
    for join in joins {
        parts.push(render_join(parent_table, join));
    }
    parts.join(",")
}

fn render_join(parent_table: &str, join: &Join) -> String {
    match join.kind {
        JoinKind::Count => format!("{}:{}(count)", join.alias, join.table),
        JoinKind::One => format!(
            "{}:{}!{}_{}_fkey({})",
            join.alias,
            join.table,
            parent_table,
            join.on_local,
            select_param(&join.table, &join.columns, &join.nested),
        ),
        JoinKind::Many => format!(
            "{}:{}!{}_{}_fkey({})",
            join.alias,
            join.table,
            join.table,
            join.on_foreign,
            select_param(&join.table, &join.columns, &join.nested),
        ),
    }
}

fn render_condition(filter: &Filter) -> String {
    match filter {
        Filter::Eq(column, value) => format!("{}.eq.{}", column, quoted(&scalar(value))),
        Filter::Ilike(column, pattern) => format!("{}.ilike.{}", column, quoted(pattern)),
        Filter::IsNull(column) => format!("{}.is.null", column),
        Filter::Or(inner) => {
            let parts: Vec<String> = inner.iter().map(render_condition).collect();
            format!("or({})", parts.join(","))
        }
    }
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| match f {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", quoted(&scalar(value)))),
            Filter::Ilike(column, pattern) => (column.clone(), format!("ilike.{}", quoted(pattern))),
            Filter::IsNull(column) => (column.clone(), "is.null".to_string()),
            Filter::Or(inner) => {
                let parts: Vec<String> = inner.iter().map(render_condition).collect();
                ("or".to_string(), format!("({})", parts.join(",")))
            }
        })
        .collect()
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Double-quote a filter value when it contains list syntax, so a
/// user-supplied needle cannot break out of an `or=(...)` expression.
fn quoted(value: &str) -> String {
    if value.contains(['"', '\\', ',', '(', ')']) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

fn query_params(table: &str, query: &SelectQuery) -> Vec<(String, String)> {
    let mut params = vec![(
        "select".to_string(),
        select_param(table, &query.columns, &query.joins),
    )];
    params.extend(filter_params(&query.filters));
    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    if let Some(range) = &query.range {
        params.push(("offset".to_string(), range.offset.to_string()));
        params.push(("limit".to_string(), range.limit.to_string()));
    }
    params
}

#[async_trait]
impl Store for HttpStore {
    async fn select(&self, table: &str, query: SelectQuery) -> Result<Vec<Value>> {
        let resp = self
            .http
            .get(self.rest(table))
            .headers(self.headers())
            .query(&query_params(table, &query))
            .send()
            .await?;
        Ok(Self::checked(resp).await?.json().await?)
    }

    async fn select_one(&self, table: &str, query: SelectQuery) -> Result<Option<Value>> {
        let query = query.range(0, 1);
        let rows = self.select(table, query).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, table: &str, row: Value, returning: &[Join]) -> Result<Value> {
        let resp = self
            .http
            .post(self.rest(table))
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .query(&[("select", select_param(table, &[], returning))])
            .json(&row)
            .send()
            .await?;
        let rows: Vec<Value> = Self::checked(resp).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::Persistence("insert returned no rows".to_string()))
    }

    async fn insert_ignore(
        &self,
        table: &str,
        row: Value,
        conflict_keys: &[&str],
    ) -> Result<bool> {
        let resp = self
            .http
            .post(self.rest(table))
            .headers(self.headers())
            .header("Prefer", "return=representation,resolution=ignore-duplicates")
            .query(&[("on_conflict", conflict_keys.join(","))])
            .json(&row)
            .send()
            .await?;
        let rows: Vec<Value> = Self::checked(resp).await?.json().await?;
        Ok(!rows.is_empty())
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
        returning: &[Join],
    ) -> Result<Value> {
        let mut params = vec![("select".to_string(), select_param(table, &[], returning))];
        params.extend(filter_params(filters));
        let resp = self
            .http
            .patch(self.rest(table))
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .query(&params)
            .json(&patch)
            .send()
            .await?;
        let rows: Vec<Value> = Self::checked(resp).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(table.to_string()))
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let resp = self
            .http
            .delete(self.rest(table))
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .query(&filter_params(filters))
            .send()
            .await?;
        let rows: Vec<Value> = Self::checked(resp).await?.json().await?;
        Ok(rows.len() as u64)
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let mut params = vec![("select".to_string(), "id".to_string())];
        params.extend(filter_params(filters));
        let resp = self
            .http
            .get(self.rest(table))
            .headers(self.headers())
            .header("Prefer", "count=exact")
            .header("Range-Unit", "items")
            .header("Range", "0-0")
            .query(&params)
            .send()
            .await?;
        let resp = Self::checked(resp).await?;
        let content_range = resp
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        content_range
            .rsplit('/')
            .next()
            .and_then(|total| total.parse().ok())
            .ok_or_else(|| {
                ApiError::Persistence(format!("unparseable content-range: {}", content_range))
            })
    }

    async fn current_user(&self) -> Result<Option<AuthUser>> {
        let token = self.access_token.read().expect("access token lock poisoned").clone();
        let Some(token) = token else {
            return Ok(None);
        };
        let resp = self
            .http
            .get(format!("{}/auth/v1/user", self.base))
            .header("apikey", &self.key)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        Ok(Some(Self::checked(resp).await?.json().await?))
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/storage/v1/object/{}/{}", self.base, bucket, path))
            .headers(self.headers())
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;
        Self::checked(resp).await?;
        Ok(())
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<()> {
        let resp = self
            .http
            .delete(format!("{}/storage/v1/object/{}/{}", self.base, bucket, path))
            .headers(self.headers())
            .send()
            .await?;
        Self::checked(resp).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base, bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_conditions_quote_reserved_characters() {
        let filter = Filter::Or(vec![
            Filter::ilike("first_name", "%a,b(c)%"),
            Filter::ilike("username", "%plain%"),
        ]);
        let params = filter_params(&[filter]);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].0, "or");
        assert_eq!(
            params[0].1,
            r#"(first_name.ilike."%a,b(c)%",username.ilike.%plain%)"#
        );
    }

    #[test]
    fn embedded_quotes_are_escaped() {
        assert_eq!(quoted(r#"%he said "hi"%"#), r#""%he said \"hi\"%""#);
        assert_eq!(quoted("%plain%"), "%plain%");
    }

    #[test]
    fn count_joins_render_the_aggregate_embed() {
        let join = Join::count("likes_count", "post_likes", "post_id");
        assert_eq!(render_join("posts", &join), "likes_count:post_likes(count)");
    }
}
