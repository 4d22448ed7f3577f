use super::SyncConfig;

pub const DEFAULT_MIN_REFRESH_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_PLACEHOLDER_GRACE_MS: u64 = 60_000;
pub const DEFAULT_ACCOUNT_POLL_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_FEED_BUFFER: usize = 32;
pub const DEFAULT_DETAIL_ROUTE_PREFIX: &str = "/items";

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_refresh_interval_ms: DEFAULT_MIN_REFRESH_INTERVAL_MS,
            placeholder_grace_ms: DEFAULT_PLACEHOLDER_GRACE_MS,
            account_poll_interval_ms: DEFAULT_ACCOUNT_POLL_INTERVAL_MS,
            feed_buffer: DEFAULT_FEED_BUFFER,
            redirect_on_completion: false,
            detail_route_prefix: DEFAULT_DETAIL_ROUTE_PREFIX.to_string(),
        }
    }
}
