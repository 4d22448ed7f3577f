use async_trait::async_trait;

use super::errors::BackendError;

/// One-shot fetch of a slowly-changing aggregate (e.g. account data).
#[async_trait]
pub trait AggregateFetchPort<T>: Send + Sync
where
    T: Send + 'static,
{
    async fn fetch(&self) -> Result<T, BackendError>;
}
