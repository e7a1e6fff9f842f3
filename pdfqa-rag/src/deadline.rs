//! Caller-configured time limits around service calls.

use std::future::Future;
use std::time::Duration;

use tracing::error;

use crate::error::{RagError, Result};

/// Run `call`, turning expiry of `limit` into the error built by `on_timeout`.
///
/// The in-flight request is dropped on expiry; nothing is retried.
pub(crate) async fn with_deadline<T, F>(
    limit: Duration,
    call: F,
    on_timeout: impl FnOnce(String) -> RagError,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            let message = format!("timed out after {}s", limit.as_secs_f32());
            error!(timeout_secs = limit.as_secs_f32(), "service call timed out");
            Err(on_timeout(message))
        }
    }
}
