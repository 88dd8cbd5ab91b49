//! Per-collaborator timeouts.

use ragbot_core::{AppError, AppResult, Upstream};
use std::future::Future;
use std::time::Duration;

/// Await `fut` for at most `limit`.
///
/// An elapsed timer is reported as `service` being unavailable.
pub async fn bounded<T, F>(service: Upstream, limit: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} call timed out after {:?}", service, limit);
            Err(AppError::upstream(
                service,
                format!("timed out after {}ms", limit.as_millis()),
            ))
        }
    }
}
