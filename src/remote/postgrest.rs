use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::RemoteFailure;
use crate::remote::{failure, Remote, Select};
use crate::Backend;

/// PostgREST (Supabase の `rest/v1`) を叩く `Remote`
#[derive(Clone, Debug)]
pub struct PostgrestRemote {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PostgrestRemote {
    pub fn new(backend: &Backend) -> Result<Self, RemoteFailure> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: backend.url.trim_end_matches('/').to_owned(),
            api_key: backend.api_key.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::ACCEPT, "application/json")
    }
}

/// 検索クエリのパラメータ列
pub fn query_pairs(query: &Select) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_owned(), query.columns.clone())];
    pairs.extend(
        query
            .filters
            .iter()
            .map(|f| (f.column.clone(), f.to_query_value())),
    );
    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        pairs.push(("order".to_owned(), format!("{}.{}", order.column, direction)));
    }
    pairs
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// エラー応答の `message`、無ければ HTTP ステータスの説明
fn failure_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_owned)
                .unwrap_or_else(|| status.as_str().to_owned())
        })
}

async fn check(response: Response) -> Result<Response, RemoteFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = failure_message(status, &body);
    warn!("バックエンドエラー {}: {}", status, message);
    Err(RemoteFailure::new(message))
}

#[async_trait]
impl Remote for PostgrestRemote {
    async fn select(&self, query: &Select) -> Result<Vec<Value>, RemoteFailure> {
        debug!("select {} {:?}", query.table, query_pairs(query));
        let response = self
            .authorized(self.client.get(self.table_url(&query.table)))
            .query(&query_pairs(query))
            .send()
            .await?;
        Ok(check(response).await?.json::<Vec<Value>>().await?)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteFailure> {
        debug!("insert {}", table);
        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        let mut created = check(response).await?.json::<Vec<Value>>().await?;
        if created.is_empty() {
            return Err(failure(format!("insert into {} returned no rows", table)));
        }
        Ok(created.swap_remove(0))
    }
}

impl From<reqwest::Error> for RemoteFailure {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            return RemoteFailure::new("network timeout");
        }
        RemoteFailure::new(value.to_string())
    }
}
