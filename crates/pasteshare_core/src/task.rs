//! Offloading of blocking work from async callers.

use crate::error::AppError;

/// Run `work` on the blocking pool and return its result.
///
/// # Errors
/// Returns whatever `work` returns, or [`AppError::Internal`] if the task
/// panicked or was cancelled.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        tracing::error!("Blocking task failed: {}", err);
        AppError::Internal
    })?
}
