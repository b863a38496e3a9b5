use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::RemoteFailure;
use crate::remote::{column_key, failure, split_columns, Filter, Operator, Remote, Select};

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<String, Vec<Value>>,
    failure: Option<String>,
    selects: usize,
}

/// プロセス内のテーブル
///
/// `Remote` と同じ条件・列指定を解釈する。テストとデモ用。
#[derive(Clone, Debug, Default)]
pub struct MemoryRemote {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// テーブルの行を差し替える
    pub async fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .lock()
            .await
            .rows
            .insert(table.to_owned(), rows);
    }

    /// 以降の呼び出しをすべて失敗させる
    pub async fn fail_with(&self, message: &str) {
        self.tables.lock().await.failure = Some(message.to_owned());
    }

    pub async fn recover(&self) {
        self.tables.lock().await.failure = None;
    }

    pub async fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .await
            .rows
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// これまでに受けた検索の回数
    pub async fn select_count(&self) -> usize {
        self.tables.lock().await.selects
    }
}

#[async_trait]
impl Remote for MemoryRemote {
    async fn select(&self, query: &Select) -> Result<Vec<Value>, RemoteFailure> {
        let mut tables = self.tables.lock().await;
        tables.selects += 1;
        if let Some(message) = &tables.failure {
            return Err(RemoteFailure::new(message.clone()));
        }
        let rows = tables
            .rows
            .get(&query.table)
            .ok_or_else(|| failure(format!("relation \"{}\" does not exist", query.table)))?;
        let mut matched = rows
            .iter()
            .filter(|row| query.filters.iter().all(|f| matches(row, f)))
            .cloned()
            .collect::<Vec<_>>();
        if let Some(order) = &query.order {
            matched.sort_by(|a, b| {
                let ordering = compare_nulls_last(&a[&order.column], &b[&order.column]);
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        debug!("memory select {}: {} rows", query.table, matched.len());
        matched
            .into_iter()
            .map(|row| project(&query.table, row, &query.columns))
            .collect()
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteFailure> {
        let mut tables = self.tables.lock().await;
        if let Some(message) = &tables.failure {
            return Err(RemoteFailure::new(message.clone()));
        }
        let Value::Object(mut object) = row else {
            return Err(failure("insert row must be a JSON object"));
        };
        let rows = tables.rows.entry(table.to_owned()).or_default();
        if object.get("id").map_or(true, Value::is_null) {
            let next = rows
                .iter()
                .filter_map(|r| r["id"].as_i64())
                .max()
                .unwrap_or(0)
                + 1;
            object.insert("id".to_owned(), Value::from(next));
        }
        let created = Value::Object(object);
        rows.push(created.clone());
        Ok(created)
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let actual = &row[&filter.column];
    match filter.operator {
        Operator::Eq => loosely_equal(actual, &filter.value),
        Operator::Neq => !loosely_equal(actual, &filter.value),
        Operator::Gt => compare(actual, &filter.value) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare(actual, &filter.value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => compare(actual, &filter.value) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare(actual, &filter.value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::In => match &filter.value {
            Value::Array(values) => values.iter().any(|v| loosely_equal(actual, v)),
            value => loosely_equal(actual, value),
        },
    }
}

/// クエリ文字列経由の比較と同じく、数値と文字列を区別しない
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::String(b)) | (Value::String(b), Value::Number(a)) => {
            a.to_string() == *b
        }
        (a, b) => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn compare_nulls_last(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

fn project(table: &str, row: Value, columns: &str) -> Result<Value, RemoteFailure> {
    let parts = split_columns(columns);
    if parts.iter().any(|p| *p == "*") {
        return Ok(row);
    }
    let Value::Object(source) = row else {
        return Ok(row);
    };
    let mut projected = Map::new();
    for part in parts {
        let key = column_key(part);
        let value = source
            .get(key)
            .ok_or_else(|| failure(format!("column {}.{} does not exist", table, key)))?;
        projected.insert(key.to_owned(), value.clone());
    }
    Ok(Value::Object(projected))
}
