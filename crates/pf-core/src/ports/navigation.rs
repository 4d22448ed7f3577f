use async_trait::async_trait;

use super::errors::NavigationError;

/// UI navigation side effect.
///
/// 界面跳转端口。
#[async_trait]
pub trait NavigationPort: Send + Sync {
    async fn navigate(&self, route: &str) -> Result<(), NavigationError>;
}
