// Timeout wrapper for outbound calls (store, AI endpoint)

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Both attempts ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation timed out twice")]
pub struct TimedOut;

/// Run `op` under `limit`. A timeout is retried once; any completed
/// result (success or failure) is returned as-is.
pub async fn retry_once_on_timeout<T, F, Fut>(
    what: &str,
    limit: Duration,
    mut op: F,
) -> Result<T, TimedOut>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
{
    if let Ok(out) = tokio::time::timeout(limit, op()).await {
        return Ok(out);
    }
    warn!("{} timed out after {:?}, retrying once", what, limit);

    tokio::time::timeout(limit, op()).await.map_err(|_| TimedOut)
}
