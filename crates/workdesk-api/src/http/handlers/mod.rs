//! HTTP request handlers for the REST API.

pub mod blob;
pub mod chat;
pub mod estimate;
pub mod work_order;

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::http::error::AppError;

/// Run a writer operation on its own task under `timeout`.
///
/// The task outlives the request future, so an in-flight attachment batch
/// always reaches commit or compensation. A dropped connection cancels the
/// token; on timeout the token is cancelled and the handler waits for the
/// rollback to finish before answering.
pub async fn run_detached<T, F, Fut>(timeout: Duration, op: F) -> Result<T, AppError>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    T: Send + 'static,
{
    let cancel = CancellationToken::new();
    let mut handle = tokio::spawn(op(cancel.clone()));
    let on_disconnect = cancel.clone().drop_guard();

    let joined = match tokio::time::timeout(timeout, &mut handle).await {
        Ok(joined) => joined,
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "write deadline passed, cancelling");
            cancel.cancel();
            handle.await
        }
    };

    on_disconnect.disarm();
    joined.map_err(|e| AppError::Internal(format!("write task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    use workdesk_types::error::ResourceError;

    #[tokio::test]
    async fn test_run_detached_returns_result() {
        let value = run_detached(Duration::from_secs(1), |_| async { Ok::<_, AppError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_detached_cancels_on_timeout() {
        let result: Result<(), AppError> = run_detached(Duration::from_secs(1), |cancel| async move {
            cancel.cancelled().await;
            Err::<(), AppError>(ResourceError::Cancelled.into())
        })
        .await;

        assert!(matches!(
            result,
            Err(AppError::Resource(ResourceError::Cancelled))
        ));
    }
}
