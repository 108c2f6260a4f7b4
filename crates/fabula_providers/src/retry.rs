//! Shared retry executor for the provider adapters.

use crate::ProviderResult;
use fabula_error::{ProviderError, ProviderErrorKind};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_retry2::strategy::{jitter, ExponentialBackoff};
use tokio_retry2::{Retry, RetryError};
use tracing::warn;

/// Initial backoff delay.
const BACKOFF_BASE_MS: u64 = 500;
/// Backoff ceiling.
const BACKOFF_CAP_SECS: u64 = 8;
/// Retries after the first attempt (three attempts total).
const MAX_RETRIES: usize = 2;

/// Run `op` with the adapter retry policy.
///
/// Transient errors are retried up to three attempts with jittered
/// exponential backoff. A malformed 2xx body is retried once, then surfaced.
/// Everything else is permanent and returns immediately.
pub(crate) async fn with_retries<T, F, Fut>(provider: &'static str, mut op: F) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let malformed_retried = AtomicBool::new(false);
    let strategy = ExponentialBackoff::from_millis(BACKOFF_BASE_MS)
        .factor(2)
        .max_delay(Duration::from_secs(BACKOFF_CAP_SECS))
        .map(jitter)
        .take(MAX_RETRIES);

    Retry::spawn(strategy, || {
        let fut = op();
        let malformed_retried = &malformed_retried;
        async move {
            match fut.await {
                Ok(value) => Ok(value),
                Err(err) => {
                    let retry = match &err.kind {
                        ProviderErrorKind::Transient(_) => true,
                        ProviderErrorKind::UpstreamMalformed(_) => {
                            !malformed_retried.swap(true, Ordering::Relaxed)
                        }
                        _ => false,
                    };
                    if retry {
                        warn!(provider, error = %err, "provider call failed, will retry");
                        Err(RetryError::Transient {
                            err,
                            retry_after: None,
                        })
                    } else {
                        Err(RetryError::Permanent(err))
                    }
                }
            }
        }
    })
    .await
}

/// Map a reqwest transport failure to a transient provider error.
#[track_caller]
pub(crate) fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::new(ProviderErrorKind::Transient(format!(
        "request failed: {err}"
    )))
}
