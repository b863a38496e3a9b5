use derive_more::{Deref, Display};
use tracing::{debug, info};

/// 通知から渡される遷移先。中身は解釈しない
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display, Deref)]
pub struct RouteKey(String);

impl RouteKey {
    /// 空白だけの値は遷移先とみなさない
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }
        Some(Self(raw.to_owned()))
    }
}

/// 画面遷移を担う側
pub trait Navigator {
    fn navigate(&mut self, route: &RouteKey);
}

/// 通知の遷移先を受け取り、画面遷移の準備ができ次第渡す
///
/// 起動直後など `Navigator` が無い間に届いた遷移先は最新の1件だけ保持する。
pub struct RouteInbox<N> {
    navigator: Option<N>,
    pending: Option<RouteKey>,
}

impl<N: Navigator> RouteInbox<N> {
    pub fn new() -> Self {
        Self {
            navigator: None,
            pending: None,
        }
    }

    /// 起動時・実行中に届いた遷移先を受け取る
    pub fn receive(&mut self, raw: Option<&str>) {
        let Some(route) = RouteKey::parse(raw) else {
            return;
        };
        match self.navigator.as_mut() {
            Some(navigator) => {
                info!("遷移します: {}", route);
                navigator.navigate(&route);
            }
            None => {
                debug!("画面の準備前のため保留します: {}", route);
                self.pending = Some(route);
            }
        }
    }

    /// 画面遷移の準備ができた。保留中の遷移先があれば渡す
    pub fn attach(&mut self, mut navigator: N) {
        if let Some(route) = self.pending.take() {
            info!("保留していた遷移先へ遷移します: {}", route);
            navigator.navigate(&route);
        }
        self.navigator = Some(navigator);
    }

    pub fn pending(&self) -> Option<&RouteKey> {
        self.pending.as_ref()
    }

    pub fn navigator(&self) -> Option<&N> {
        self.navigator.as_ref()
    }
}

impl<N: Navigator> Default for RouteInbox<N> {
    fn default() -> Self {
        Self::new()
    }
}
