use std::{fmt::Debug, marker::PhantomData};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{
    Booking, Conversation, Entity, MessageWithParticipants, ProviderService, ProviderServiceId,
    RemoteFailure,
};
use crate::loader::ListQuery;
use crate::remote::{Remote, RemoteExt, Select};

/// 任意のテーブルから列を読む
///
/// `filtered_by` で指定した列が引数と等しい行に絞る。引数が無ければ全件。
pub struct TableQuery<T, R> {
    remote: R,
    table: String,
    columns: String,
    filter_column: Option<String>,
    order: Option<(String, bool)>,
    _item: PhantomData<fn() -> T>,
}

impl<T, R> TableQuery<T, R> {
    pub fn new(remote: R, table: impl Into<String>, columns: impl Into<String>) -> Self {
        Self {
            remote,
            table: table.into(),
            columns: columns.into(),
            filter_column: None,
            order: None,
            _item: PhantomData,
        }
    }

    pub fn filtered_by(mut self, column: impl Into<String>) -> Self {
        self.filter_column = Some(column.into());
        self
    }

    pub fn ordered_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some((column.into(), ascending));
        self
    }

    fn select(&self, param: Option<&Value>) -> Select {
        let mut select = Select::new(&self.table).columns(&self.columns);
        if let (Some(column), Some(value)) = (&self.filter_column, param) {
            select = select.eq(column, value.clone());
        }
        if let Some((column, ascending)) = &self.order {
            select = select.order(column, *ascending);
        }
        select
    }
}

#[async_trait]
impl<T, R> ListQuery for TableQuery<T, R>
where
    T: DeserializeOwned + Clone + Debug + Send + Sync,
    R: Remote,
{
    type Item = T;
    type Param = Value;

    fn name(&self) -> &str {
        &self.table
    }

    async fn fetch(&self, param: Option<&Value>) -> Result<Vec<T>, RemoteFailure> {
        self.remote.fetch(&self.select(param)).await
    }
}

/// お客様の予約一覧 (タスクカレンダー)
pub struct CustomerBookings<R> {
    remote: R,
}

impl<R: Remote> CustomerBookings<R> {
    pub fn new(remote: R) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl<R: Remote> ListQuery for CustomerBookings<R> {
    type Item = Booking;
    type Param = String;

    fn name(&self) -> &str {
        "customer_bookings"
    }

    async fn fetch(&self, customer_id: Option<&String>) -> Result<Vec<Booking>, RemoteFailure> {
        let mut select = Select::new(Booking::TABLE).order("start_at", true);
        if let Some(customer_id) = customer_id {
            select = select.eq("customer_id", customer_id.as_str());
        }
        self.remote.fetch(&select).await
    }
}

/// 提供サービス一覧。IDを渡すとそのサービスだけ
pub struct ProviderServices<R> {
    remote: R,
}

impl<R: Remote> ProviderServices<R> {
    pub fn new(remote: R) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl<R: Remote> ListQuery for ProviderServices<R> {
    type Item = ProviderService;
    type Param = ProviderServiceId;

    fn name(&self) -> &str {
        "provider_services"
    }

    async fn fetch(
        &self,
        id: Option<&ProviderServiceId>,
    ) -> Result<Vec<ProviderService>, RemoteFailure> {
        let mut select = Select::new(ProviderService::TABLE).order("id", true);
        if let Some(id) = id {
            select = select.eq("id", **id);
        }
        self.remote.fetch(&select).await
    }
}

/// 会話一覧
///
/// 自分宛て・自分発のメッセージは行レベルセキュリティで絞られている前提で、
/// `messages` を1回読んで相手ごとに集計する。
pub struct Conversations<R> {
    remote: R,
    me: String,
}

impl<R: Remote> Conversations<R> {
    pub fn new(remote: R, me: impl Into<String>) -> Self {
        Self {
            remote,
            me: me.into(),
        }
    }
}

#[async_trait]
impl<R: Remote> ListQuery for Conversations<R> {
    type Item = Conversation;
    type Param = ();

    fn name(&self) -> &str {
        "conversations"
    }

    async fn fetch(&self, _param: Option<&()>) -> Result<Vec<Conversation>, RemoteFailure> {
        let select = Select::new("messages")
            .columns(MessageWithParticipants::COLUMNS)
            .order("created_at", false);
        let messages: Vec<MessageWithParticipants> = self.remote.fetch(&select).await?;
        Ok(Conversation::summarize(&self.me, messages))
    }
}
