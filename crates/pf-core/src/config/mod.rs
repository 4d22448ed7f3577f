//! # Sync configuration DTO / 同步配置
//!
//! Pure data. Values come from the `[sync]` table of the configuration file;
//! missing keys fall back to [`defaults`]. No validation happens here: a zero
//! refresh interval is a legal fact meaning "never throttle".

mod defaults;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use defaults::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minimum time between two non-forced account refreshes
    /// 两次非强制刷新之间的最小间隔
    pub min_refresh_interval_ms: u64,

    /// How long a placeholder may wait before it is reported as stalled
    /// 占位实体被视为卡住前的等待时间
    pub placeholder_grace_ms: u64,

    /// Passive account poll period
    pub account_poll_interval_ms: u64,

    /// Capacity of each subscription's snapshot channel
    pub feed_buffer: usize,

    /// Initial value of the session-level redirect flag
    pub redirect_on_completion: bool,

    /// Detail route prefix, the entity id is appended as the last segment
    pub detail_route_prefix: String,
}

impl SyncConfig {
    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.min_refresh_interval_ms)
    }

    pub fn placeholder_grace(&self) -> Duration {
        Duration::from_millis(self.placeholder_grace_ms)
    }

    pub fn account_poll_interval(&self) -> Duration {
        Duration::from_millis(self.account_poll_interval_ms)
    }

    /// Route of an entity's detail view, e.g. `/items/p42`.
    pub fn detail_route(&self, entity_id: &crate::ids::EntityId) -> String {
        format!(
            "{}/{}",
            self.detail_route_prefix.trim_end_matches('/'),
            entity_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_route_joins_prefix_and_id() {
        let config = SyncConfig::default();
        assert_eq!(config.detail_route(&"p42".into()), "/items/p42");

        let config = SyncConfig {
            detail_route_prefix: "/papers/".to_string(),
            ..SyncConfig::default()
        };
        assert_eq!(config.detail_route(&"p42".into()), "/papers/p42");
    }

    #[test]
    fn missing_keys_take_defaults() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"min_refresh_interval_ms": 1000}"#).unwrap();
        assert_eq!(config.min_refresh_interval(), Duration::from_secs(1));
        assert_eq!(config.placeholder_grace_ms, DEFAULT_PLACEHOLDER_GRACE_MS);
        assert!(!config.redirect_on_completion);
    }
}
