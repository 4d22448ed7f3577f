use serde::{Deserialize, Serialize};

/// A slowly-changing record plus its refresh bookkeeping.
///
/// Pure data. The single-flight and throttling policy that drives these fields
/// lives in the application layer.
///
/// 缓慢变化的数据记录及其刷新状态（纯数据）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshableAggregate<T> {
    pub data: Option<T>,

    /// Wall clock of the last successful refresh
    pub last_refreshed_at_ms: Option<i64>,

    pub refresh_in_flight: bool,
}

impl<T> RefreshableAggregate<T> {
    pub fn empty() -> Self {
        Self {
            data: None,
            last_refreshed_at_ms: None,
            refresh_in_flight: false,
        }
    }

    /// Milliseconds since the last successful refresh, `None` if never refreshed.
    pub fn age_ms(&self, now_ms: i64) -> Option<i64> {
        self.last_refreshed_at_ms
            .map(|last| now_ms.saturating_sub(last).max(0))
    }

    /// Whether a non-forced refresh at `now_ms` falls inside the throttle window.
    pub fn is_fresh(&self, now_ms: i64, min_interval_ms: i64) -> bool {
        matches!(self.age_ms(now_ms), Some(age) if age < min_interval_ms)
    }
}

impl<T> Default for RefreshableAggregate<T> {
    fn default() -> Self {
        Self::empty()
    }
}
