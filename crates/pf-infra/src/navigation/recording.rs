use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use pf_core::ports::{NavigationError, NavigationPort};
use tracing::info;

/// Navigator for headless runs: logs every route and keeps them in order.
///
/// 无界面运行时使用的导航器：记录所有跳转路由。
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NavigationPort for RecordingNavigator {
    async fn navigate(&self, route: &str) -> Result<(), NavigationError> {
        if route.is_empty() {
            return Err(NavigationError::Failed {
                route: route.to_string(),
                reason: "empty route".to_string(),
            });
        }
        info!(route, "Navigate");
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_routes_in_order() {
        let navigator = RecordingNavigator::new();
        navigator.navigate("/items/a").await.expect("navigate a");
        navigator.navigate("/items/b").await.expect("navigate b");
        assert_eq!(navigator.routes(), vec!["/items/a", "/items/b"]);
    }

    #[tokio::test]
    async fn rejects_empty_route() {
        let navigator = RecordingNavigator::new();
        assert!(navigator.navigate("").await.is_err());
        assert!(navigator.routes().is_empty());
    }
}
