mod memory;
mod postgrest;

use std::fmt::Display;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::domain::RemoteFailure;

pub use self::memory::*;
pub use self::postgrest::*;

/// バックエンド (BaaS) のテーブル操作
#[async_trait]
pub trait Remote: Send + Sync {
    /// 行を検索する。順序はバックエンドが返した順のまま
    async fn select(&self, query: &Select) -> Result<Vec<Value>, RemoteFailure>;
    /// 行を1件追加し、作成された行を返す
    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteFailure>;
}

#[async_trait]
impl<R: Remote + ?Sized> Remote for std::sync::Arc<R> {
    async fn select(&self, query: &Select) -> Result<Vec<Value>, RemoteFailure> {
        (**self).select(query).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteFailure> {
        (**self).insert(table, row).await
    }
}

/// 型付きの検索・追加
#[async_trait]
pub trait RemoteExt: Remote {
    async fn fetch<T>(&self, query: &Select) -> Result<Vec<T>, RemoteFailure>
    where
        T: DeserializeOwned + Send,
    {
        self.select(query)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(RemoteFailure::from))
            .collect()
    }

    async fn create<I, T>(&self, table: &str, row: &I) -> Result<T, RemoteFailure>
    where
        I: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send,
    {
        let created = self.insert(table, serde_json::to_value(row)?).await?;
        Ok(serde_json::from_value(created)?)
    }
}

impl<R: Remote + ?Sized> RemoteExt for R {}

/// 比較演算子
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
        }
    }
}

/// 列に対する条件
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

impl Filter {
    /// PostgREST のクエリ値 (`eq.3`, `in.(1,2)`)
    pub fn to_query_value(&self) -> String {
        let value = match (&self.operator, &self.value) {
            (Operator::In, Value::Array(values)) => format!(
                "({})",
                values.iter().map(list_item).collect::<Vec<_>>().join(",")
            ),
            (_, value) => plain(value),
        };
        format!("{}.{}", self.operator.as_str(), value)
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_owned(),
        other => other.to_string(),
    }
}

/// `in.(...)` の要素。予約文字を含む文字列は二重引用符で囲む
fn list_item(value: &Value) -> String {
    match value {
        Value::String(s)
            if s.contains(|c: char| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | '\\')) =>
        {
            format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
        }
        other => plain(other),
    }
}

/// 並び順
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// テーブル検索
#[derive(Clone, Debug, PartialEq)]
pub struct Select {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Select {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_owned(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn filter(
        mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, Operator::Eq, value)
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }
}

/// 列指定を最上位のカンマで分割する (`a,b:rel(c,d)` -> `a`, `b:rel(c,d)`)
pub(crate) fn split_columns(columns: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in columns.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(columns[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(columns[start..].trim());
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// 列指定1件が結果で使うキー名 (`sender:profiles!fk(*)` -> `sender`)
pub(crate) fn column_key(part: &str) -> &str {
    let head = part.split('(').next().unwrap_or(part);
    let head = head.split(':').next().unwrap_or(head);
    head.split('!').next().unwrap_or(head).trim()
}

pub(crate) fn failure(message: impl Display) -> RemoteFailure {
    RemoteFailure::new(message.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_filter_query_value() {
        let select = Select::new("bookings")
            .eq("customer_id", "c-1")
            .filter("provider_service_id", Operator::In, json!([1, 2]))
            .filter("start_at", Operator::Gte, "2024-04-01T00:00:00Z");
        let values = select
            .filters
            .iter()
            .map(Filter::to_query_value)
            .collect::<Vec<_>>();
        assert_eq!(
            values,
            vec!["eq.c-1", "in.(1,2)", "gte.2024-04-01T00:00:00Z"]
        );
    }

    #[test]
    fn test_in_list_quotes_reserved_strings() {
        let filter = Filter {
            column: "location".to_owned(),
            operator: Operator::In,
            value: json!(["a,b", "渋谷区", "x(1)", r#"say "hi""#]),
        };
        assert_eq!(
            filter.to_query_value(),
            r#"in.("a,b",渋谷区,"x(1)","say \"hi\"")"#
        );
    }

    #[test]
    fn test_split_columns() {
        assert_eq!(
            split_columns("id, content,sender:profiles!sender_id(id,display_name)"),
            vec!["id", "content", "sender:profiles!sender_id(id,display_name)"]
        );
        assert_eq!(split_columns("*"), vec!["*"]);
    }

    #[test]
    fn test_column_key() {
        assert_eq!(column_key("service_type"), "service_type");
        assert_eq!(column_key("sender:profiles!sender_id(*)"), "sender");
        assert_eq!(column_key("profiles(*)"), "profiles");
    }
}
