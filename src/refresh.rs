use tracing::debug;

/// 更新が発火する引っ張り距離 (dp)
pub const TRIGGER_DISTANCE_DP: f32 = 80.0;
/// 下向きの引っ張りにかける減衰
pub const PULL_DAMPING: f32 = 0.5;
/// インジケーターが動ける上限 (発火距離に対する倍率)
pub const MAX_PULL_RATIO: f32 = 1.5;

/// 引っ張って更新のジェスチャー
///
/// 縦方向のドラッグ量をインジケーターの位置に変換し、離した時点で発火距離を
/// 超えていれば更新コールバックを呼ぶ。
#[derive(Clone, Debug, PartialEq)]
pub struct PullToRefresh {
    trigger_distance: f32,
    offset: f32,
    refreshing: bool,
}

impl PullToRefresh {
    /// 発火距離が有限の正数でなければ 0 として扱い、インジケーターは動かない
    pub fn new(trigger_distance: f32) -> Self {
        let trigger_distance = if trigger_distance.is_finite() && trigger_distance > 0.0 {
            trigger_distance
        } else {
            0.0
        };
        Self {
            trigger_distance,
            offset: 0.0,
            refreshing: false,
        }
    }

    /// 画面密度から発火距離 (px) を決める
    pub fn from_density(density: f32) -> Self {
        Self::new(TRIGGER_DISTANCE_DP * density)
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn trigger_distance(&self) -> f32 {
        self.trigger_distance
    }

    pub fn max_offset(&self) -> f32 {
        self.trigger_distance * MAX_PULL_RATIO
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    /// インジケーターの進み具合 (0.0..=1.0)
    pub fn progress(&self) -> f32 {
        if self.trigger_distance <= 0.0 {
            return 0.0;
        }
        (self.offset / self.trigger_distance).clamp(0.0, 1.0)
    }

    /// ドラッグ。`delta` は下向きが正
    pub fn drag(&mut self, delta: f32) {
        if self.refreshing {
            return;
        }
        if !delta.is_finite() {
            return;
        }
        let step = if delta > 0.0 { delta * PULL_DAMPING } else { delta };
        self.offset = (self.offset + step).clamp(0.0, self.max_offset());
    }

    /// 指を離す。発火したら `on_refresh` を1回呼んで `true` を返す
    pub fn release(&mut self, on_refresh: impl FnOnce()) -> bool {
        let triggered = self.offset > self.trigger_distance && !self.refreshing;
        self.offset = 0.0;
        if triggered {
            debug!("引っ張って更新を発火しました");
            on_refresh();
        }
        triggered
    }

    /// 外部の更新中フラグを反映する。`false` になったらインジケーターを戻す
    pub fn set_refreshing(&mut self, refreshing: bool) {
        if self.refreshing && !refreshing {
            self.offset = 0.0;
        }
        self.refreshing = refreshing;
    }
}
