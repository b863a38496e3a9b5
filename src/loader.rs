mod query;

use std::{
    fmt::Debug,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::RemoteFailure;

pub use self::query::*;

/// 一覧を1回取得する読み込み処理
#[async_trait]
pub trait ListQuery: Send + Sync {
    type Item: Clone + Debug + Send + Sync;
    type Param: Debug + Send + Sync;

    /// 画面名。ログ用
    fn name(&self) -> &str;

    /// リモートを1回だけ読み、並び順をそのまま返す
    async fn fetch(&self, param: Option<&Self::Param>) -> Result<Vec<Self::Item>, RemoteFailure>;
}

/// 画面に公開する読み込み状態
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadState<T> {
    pub items: Vec<T>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl<T> Default for LoadState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            is_loading: false,
            error: None,
        }
    }
}

/// `load` の結果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// 取得できた件数
    Loaded(usize),
    /// 取得に失敗した。`error` に同じメッセージが入っている
    Failed(RemoteFailure),
    /// 別の読み込みが実行中だったため何もしなかった
    Coalesced,
    /// 初回表示済みのため何もしなかった
    Skipped,
}

/// 非同期一覧ローダー
///
/// 状態は `watch` チャネルで配信する。失敗しても `items` は直前の値のまま残し、
/// 読み込み中に呼ばれた `load` はリモートを読まずに `Coalesced` を返す。
pub struct ListLoader<Q: ListQuery> {
    query: Q,
    state: watch::Sender<LoadState<Q::Item>>,
    appeared: AtomicBool,
}

impl<Q: ListQuery> ListLoader<Q> {
    pub fn new(query: Q) -> Self {
        let (state, _) = watch::channel(LoadState::default());
        Self {
            query,
            state,
            appeared: AtomicBool::new(false),
        }
    }

    /// 状態の変化を購読する
    pub fn subscribe(&self) -> watch::Receiver<LoadState<Q::Item>> {
        self.state.subscribe()
    }

    /// 現在の状態のスナップショット
    pub fn state(&self) -> LoadState<Q::Item> {
        self.state.borrow().clone()
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    /// 画面の初回表示で読み込む。2回目以降は何もしない
    pub async fn appear(&self, param: Option<Q::Param>) -> LoadOutcome {
        if self.appeared.swap(true, Ordering::AcqRel) {
            return LoadOutcome::Skipped;
        }
        self.load(param).await
    }

    /// 引っ張って更新
    pub async fn refresh(&self, param: Option<Q::Param>) -> LoadOutcome {
        self.load(param).await
    }

    /// 読み込む。状態を更新し終えてから戻る
    pub async fn load(&self, param: Option<Q::Param>) -> LoadOutcome {
        let started = self.state.send_if_modified(|state| {
            if state.is_loading {
                return false;
            }
            state.is_loading = true;
            state.error = None;
            true
        });
        if !started {
            warn!("{}: 読み込み中のため要求をまとめました", self.query.name());
            return LoadOutcome::Coalesced;
        }
        debug!("{}: 読み込み開始 {:?}", self.query.name(), param);
        let mut in_flight = InFlight {
            state: &self.state,
            finished: false,
        };
        match self.query.fetch(param.as_ref()).await {
            Ok(items) => {
                let count = items.len();
                in_flight.finish(|state| state.items = items);
                info!("{}: {}件読み込みました", self.query.name(), count);
                LoadOutcome::Loaded(count)
            }
            Err(failure) => {
                let message = failure.message().to_owned();
                in_flight.finish(|state| state.error = Some(message));
                warn!("{}: 読み込み失敗: {}", self.query.name(), failure);
                LoadOutcome::Failed(failure)
            }
        }
    }
}

/// 実行中の読み込み。完了前に破棄されたら `is_loading` だけ戻す
struct InFlight<'a, T> {
    state: &'a watch::Sender<LoadState<T>>,
    finished: bool,
}

impl<T> InFlight<'_, T> {
    fn finish(&mut self, apply: impl FnOnce(&mut LoadState<T>)) {
        self.state.send_modify(|state| {
            apply(state);
            state.is_loading = false;
        });
        self.finished = true;
    }
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.send_modify(|state| state.is_loading = false);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::AtomicUsize, Arc};
    use std::time::Duration;

    use serde::Deserialize;
    use serde_json::json;
    use tokio::sync::Notify;

    use crate::remote::MemoryRemote;

    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
    struct ServiceTypeRow {
        service_type: String,
    }

    fn row(service_type: &str) -> ServiceTypeRow {
        ServiceTypeRow {
            service_type: service_type.to_owned(),
        }
    }

    async fn service_types() -> (MemoryRemote, ListLoader<TableQuery<ServiceTypeRow, MemoryRemote>>) {
        let remote = MemoryRemote::new();
        remote
            .seed(
                "bookings",
                vec![
                    json!({"id": 1, "service_type": "cleaning"}),
                    json!({"id": 2, "service_type": "repair"}),
                ],
            )
            .await;
        let loader = ListLoader::new(TableQuery::new(remote.clone(), "bookings", "service_type"));
        (remote, loader)
    }

    #[tokio::test]
    async fn test_initial_state() {
        let (_, loader) = service_types().await;
        assert_eq!(loader.state(), LoadState::default());
    }

    #[tokio::test]
    async fn test_load_success() {
        let (remote, loader) = service_types().await;
        assert_eq!(loader.load(None).await, LoadOutcome::Loaded(2));
        assert_eq!(
            loader.state(),
            LoadState {
                items: vec![row("cleaning"), row("repair")],
                is_loading: false,
                error: None,
            }
        );
        assert_eq!(remote.select_count().await, 1);
    }

    #[tokio::test]
    async fn test_load_failure_keeps_items() {
        let (remote, loader) = service_types().await;
        loader.load(None).await;
        remote.fail_with("network timeout").await;
        assert_eq!(
            loader.load(None).await,
            LoadOutcome::Failed(RemoteFailure::new("network timeout"))
        );
        let state = loader.state();
        assert_eq!(state.error.as_deref(), Some("network timeout"));
        assert!(!state.is_loading);
        assert_eq!(state.items, vec![row("cleaning"), row("repair")]);
    }

    #[tokio::test]
    async fn test_load_failure_from_empty() {
        let (remote, loader) = service_types().await;
        remote.fail_with("network timeout").await;
        loader.load(None).await;
        let state = loader.state();
        assert_eq!(state.error.as_deref(), Some("network timeout"));
        assert!(!state.is_loading);
        assert!(state.items.is_empty());
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        let (remote, loader) = service_types().await;
        remote.fail_with("network timeout").await;
        loader.load(None).await;
        remote.recover().await;
        loader.load(None).await;
        assert_eq!(loader.state().error, None);
    }

    #[tokio::test]
    async fn test_load_twice_is_idempotent() {
        let (_, loader) = service_types().await;
        loader.load(None).await;
        let first = loader.state();
        loader.load(None).await;
        assert_eq!(loader.state(), first);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_error() {
        let remote = MemoryRemote::new();
        remote.seed("bookings", Vec::new()).await;
        let loader = ListLoader::new(TableQuery::<ServiceTypeRow, _>::new(
            remote,
            "bookings",
            "service_type",
        ));
        assert_eq!(loader.load(None).await, LoadOutcome::Loaded(0));
        assert_eq!(loader.state(), LoadState::default());
    }

    #[tokio::test]
    async fn test_replaces_items_wholesale() {
        let (remote, loader) = service_types().await;
        loader.load(None).await;
        remote
            .seed("bookings", vec![json!({"id": 5, "service_type": "garden"})])
            .await;
        loader.load(None).await;
        assert_eq!(loader.state().items, vec![row("garden")]);
    }

    #[tokio::test]
    async fn test_subscribers_see_loading_then_result() {
        let (_, loader) = service_types().await;
        let mut rx = loader.subscribe();
        let loader = Arc::new(loader);
        let task = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load(None).await })
        };
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            let done = !state.is_loading;
            seen.push(state);
            if done {
                break;
            }
        }
        task.await.unwrap();
        assert!(!seen.last().unwrap().is_loading);
        assert_eq!(seen.last().unwrap().items.len(), 2);
    }

    #[tokio::test]
    async fn test_appear_loads_once() {
        let (remote, loader) = service_types().await;
        assert_eq!(loader.appear(None).await, LoadOutcome::Loaded(2));
        assert_eq!(loader.appear(None).await, LoadOutcome::Skipped);
        assert_eq!(loader.refresh(None).await, LoadOutcome::Loaded(2));
        assert_eq!(remote.select_count().await, 2);
    }

    struct Gated {
        release: Arc<Notify>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ListQuery for Gated {
        type Item = u32;
        type Param = ();

        fn name(&self) -> &str {
            "gated"
        }

        async fn fetch(&self, _param: Option<&()>) -> Result<Vec<u32>, RemoteFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(vec![1, 2])
        }
    }

    fn gated() -> (Arc<Notify>, Arc<ListLoader<Gated>>) {
        let release = Arc::new(Notify::new());
        let loader = Arc::new(ListLoader::new(Gated {
            release: release.clone(),
            calls: AtomicUsize::new(0),
        }));
        (release, loader)
    }

    #[tokio::test]
    async fn test_reentrant_load_is_coalesced() {
        let (release, loader) = gated();
        let mut rx = loader.subscribe();
        let first = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load(None).await })
        };
        rx.wait_for(|state| state.is_loading).await.unwrap();
        assert_eq!(loader.load(None).await, LoadOutcome::Coalesced);
        assert!(loader.state().is_loading);
        release.notify_one();
        assert_eq!(first.await.unwrap(), LoadOutcome::Loaded(2));
        assert_eq!(loader.query().calls.load(Ordering::SeqCst), 1);
        assert_eq!(loader.state().items, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_dropped_load_resets_loading() {
        let (_release, loader) = gated();
        let result = tokio::time::timeout(Duration::from_millis(20), loader.load(None)).await;
        assert!(result.is_err());
        assert_eq!(loader.state(), LoadState::default());
    }
}
