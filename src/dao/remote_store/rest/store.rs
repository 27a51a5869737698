use std::{collections::HashMap, sync::Arc, time::Duration};

use futures::{StreamExt, future::BoxFuture};
use reqwest::{Client, Method, Response, StatusCode, header::CONTENT_RANGE};
use serde_json::Value;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::dao::{
    remote_store::{ChangeEvent, ChangeKind, ChangeStream, Filter, Query, RemoteStore, Row, Table},
    storage::StorageResult,
};

use super::{
    config::RestConfig,
    error::{RestDaoError, RestResult},
};

const PREFER_REPRESENTATION: &str = "return=representation";
const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=representation";
const PREFER_COUNT: &str = "count=exact";

/// [`RemoteStore`] speaking the PostgREST dialect exposed by hosted relational backends.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: Arc<str>,
    api_key: Option<Arc<str>>,
    change_poll_interval: Duration,
}

impl RestStore {
    /// Build the HTTP client and verify the endpoint answers.
    pub async fn connect(config: RestConfig) -> RestResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| RestDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::<str>::from(config.base_url.trim_end_matches('/')),
            api_key: config.api_key.map(Arc::<str>::from),
            change_poll_interval: config.change_poll_interval,
        };

        store.probe().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match self.api_key {
            Some(ref key) => builder
                .header("apikey", key.as_ref())
                .bearer_auth(key.as_ref()),
            None => builder,
        }
    }

    async fn probe(&self) -> RestResult<()> {
        let response = self
            .request(Method::GET, "")
            .send()
            .await
            .map_err(|source| RestDaoError::RequestSend {
                path: self.base_url.to_string(),
                source,
            })?;
        check_status(self.base_url.as_ref(), response).await?;
        Ok(())
    }

    async fn send(
        &self,
        path: &str,
        builder: reqwest::RequestBuilder,
    ) -> RestResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|source| RestDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;
        check_status(path, response).await
    }

    async fn decode_rows(path: &str, response: Response) -> RestResult<Vec<Row>> {
        response
            .json::<Vec<Row>>()
            .await
            .map_err(|source| RestDaoError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    async fn write_one(
        &self,
        table: Table,
        row: Row,
        prefer: &'static str,
        on_conflict: Option<&'static [&'static str]>,
    ) -> RestResult<Row> {
        let path = table.name();
        let mut builder = self
            .request(Method::POST, path)
            .header("Prefer", prefer)
            .json(&row);
        if let Some(columns) = on_conflict {
            builder = builder.query(&[("on_conflict", columns.join(","))]);
        }

        let response = self.send(path, builder).await?;
        Self::decode_rows(path, response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RestDaoError::EmptyRepresentation {
                path: path.to_string(),
            })
    }

    async fn select_rows(&self, table: Table, query: &Query) -> RestResult<Vec<Row>> {
        let path = table.name();
        let mut params = filter_params(&query.filter);
        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".into(), format!("{}.{direction}", order.column)));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".into(), limit.to_string()));
        }

        let builder = self.request(Method::GET, path).query(&params);
        let response = self.send(path, builder).await?;
        Self::decode_rows(path, response).await
    }

    async fn mutate(
        &self,
        method: Method,
        table: Table,
        filter: &Filter,
        patch: Option<Row>,
    ) -> RestResult<u64> {
        let path = table.name();
        let mut builder = self
            .request(method, path)
            .header("Prefer", PREFER_REPRESENTATION)
            .query(&filter_params(filter));
        if let Some(patch) = patch {
            builder = builder.json(&patch);
        }

        let response = self.send(path, builder).await?;
        Ok(Self::decode_rows(path, response).await?.len() as u64)
    }

    async fn count_rows(&self, table: Table, filter: &Filter) -> RestResult<u64> {
        let path = table.name();
        let builder = self
            .request(Method::HEAD, path)
            .header("Prefer", PREFER_COUNT)
            .query(&filter_params(filter));
        let response = self.send(path, builder).await?;

        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| RestDaoError::MissingCount {
                path: path.to_string(),
            })
    }
}

impl RemoteStore for RestStore {
    fn insert(&self, table: Table, row: Row) -> BoxFuture<'static, StorageResult<Row>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .write_one(table, row, PREFER_REPRESENTATION, None)
                .await
                .map_err(Into::into)
        })
    }

    fn upsert(
        &self,
        table: Table,
        row: Row,
        on_conflict: &'static [&'static str],
    ) -> BoxFuture<'static, StorageResult<Row>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .write_one(table, row, PREFER_UPSERT, Some(on_conflict))
                .await
                .map_err(Into::into)
        })
    }

    fn select(&self, table: Table, query: Query) -> BoxFuture<'static, StorageResult<Vec<Row>>> {
        let store = self.clone();
        Box::pin(async move { store.select_rows(table, &query).await.map_err(Into::into) })
    }

    fn update(
        &self,
        table: Table,
        filter: Filter,
        patch: Row,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .mutate(Method::PATCH, table, &filter, Some(patch))
                .await
                .map_err(Into::into)
        })
    }

    fn delete(&self, table: Table, filter: Filter) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .mutate(Method::DELETE, table, &filter, None)
                .await
                .map_err(Into::into)
        })
    }

    fn count(&self, table: Table, filter: Filter) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count_rows(table, &filter).await.map_err(Into::into) })
    }

    fn subscribe(&self, table: Table, filter: Filter) -> ChangeStream {
        let store = self.clone();
        let query = Query::filtered(filter);

        // The REST dialect has no push channel, so changes are derived from
        // successive snapshots of the subscribed rows.
        async_stream::stream! {
            let mut ticker = interval(store.change_poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut previous: Option<HashMap<String, Row>> = None;

            loop {
                ticker.tick().await;
                let rows = match store.select_rows(table, &query).await {
                    Ok(rows) => rows,
                    Err(err) => {
                        warn!(%table, error = %err, "change feed refresh failed");
                        continue;
                    }
                };

                let current = index_rows(rows);
                if let Some(previous) = previous.as_ref() {
                    for event in diff_snapshots(table, previous, &current) {
                        yield event;
                    }
                }
                previous = Some(current);
            }
        }
        .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.probe().await.map_err(Into::into) })
    }
}

async fn check_status(path: &str, response: Response) -> RestResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        let body = response.text().await.unwrap_or_default();
        debug!(path, %status, body = %body, "store rejected request");
        return Err(RestDaoError::Rejected {
            path: path.to_string(),
            status,
            body,
        });
    }

    Err(RestDaoError::RequestStatus {
        path: path.to_string(),
        status,
    })
}

/// Translate equality predicates into PostgREST query parameters.
fn filter_params(filter: &Filter) -> Vec<(String, String)> {
    filter
        .clauses()
        .iter()
        .map(|(column, value)| {
            let operand = match value {
                Value::Null => "is.null".to_string(),
                Value::String(text) => format!("eq.{text}"),
                other => format!("eq.{other}"),
            };
            (column.clone(), operand)
        })
        .collect()
}

/// Extract the total from `Content-Range: 0-24/57` or `*/57`.
fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

fn index_rows(rows: Vec<Row>) -> HashMap<String, Row> {
    rows.into_iter()
        .map(|row| {
            let key = match row.get("id") {
                Some(Value::String(id)) => id.clone(),
                Some(other) => other.to_string(),
                None => Value::Object(row.clone()).to_string(),
            };
            (key, row)
        })
        .collect()
}

fn diff_snapshots(
    table: Table,
    previous: &HashMap<String, Row>,
    current: &HashMap<String, Row>,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    for (key, row) in current {
        match previous.get(key) {
            None => events.push(ChangeEvent {
                table,
                kind: ChangeKind::Insert,
                row: row.clone(),
            }),
            Some(old) if old != row => events.push(ChangeEvent {
                table,
                kind: ChangeKind::Update,
                row: row.clone(),
            }),
            Some(_) => {}
        }
    }
    for (key, row) in previous {
        if !current.contains_key(key) {
            events.push(ChangeEvent {
                table,
                kind: ChangeKind::Delete,
                row: row.clone(),
            });
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn filter_params_use_postgrest_operators() {
        let filter = Filter::all()
            .eq("session_id", "abc")
            .eq("team_number", 3)
            .eq("timer_started_at", Value::Null);

        assert_eq!(
            filter_params(&filter),
            vec![
                ("session_id".to_string(), "eq.abc".to_string()),
                ("team_number".to_string(), "eq.3".to_string()),
                ("timer_started_at".to_string(), "is.null".to_string()),
            ]
        );
    }

    #[test]
    fn content_range_total_is_parsed() {
        assert_eq!(parse_content_range_total("0-24/57"), Some(57));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("*/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn snapshot_diff_reports_inserts_updates_and_deletes() {
        let previous = index_rows(vec![
            row(json!({"id": "a", "keyword": "scope"})),
            row(json!({"id": "b", "keyword": "deadline"})),
        ]);
        let current = index_rows(vec![
            row(json!({"id": "a", "keyword": "scope creep"})),
            row(json!({"id": "c", "keyword": "roles"})),
        ]);

        let mut kinds: Vec<_> = diff_snapshots(Table::ProblemKeywords, &previous, &current)
            .into_iter()
            .map(|event| (event.kind, event.row["id"].as_str().unwrap().to_string()))
            .collect();
        kinds.sort_by(|a, b| a.1.cmp(&b.1));

        assert_eq!(
            kinds,
            vec![
                (ChangeKind::Update, "a".to_string()),
                (ChangeKind::Delete, "b".to_string()),
                (ChangeKind::Insert, "c".to_string()),
            ]
        );
    }
}
