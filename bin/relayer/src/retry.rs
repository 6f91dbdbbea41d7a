//! Bounded, cancellable retries for source chain reads.

use crate::{error::RelayError, metrics::Metrics};
use client::ReaderError;
use config::RelayParams;
use scanner::ScanWindow;
use std::{
    future::Future,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tokio_retry::{strategy::ExponentialBackoff, RetryIf};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How often and how patiently a read is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_backoff: Duration,
    /// Bound on a single attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_params(params: &RelayParams) -> Self {
        Self {
            max_retries: params.max_retries,
            base_delay_ms: params.retry_base_delay_ms.max(1),
            max_backoff: params.max_backoff(),
            attempt_timeout: params.rpc_timeout(),
        }
    }

    fn strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(self.base_delay_ms)
            .max_delay(self.max_backoff)
            .take(self.max_retries)
    }
}

/// Run `call` until it succeeds or no retries are left.
///
/// Only [`ReaderError::is_transient`] failures are retried. Each attempt is
/// bounded by the policy's timeout, which counts as a transient failure.
/// Cancellation interrupts both an in-flight attempt and a backoff wait.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    metrics: &Metrics,
    operation: &'static str,
    window: Option<ScanWindow>,
    mut call: F,
) -> Result<T, RelayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ReaderError>>,
{
    let attempts = AtomicUsize::new(0);
    let timeout = policy.attempt_timeout;

    let action = || {
        let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let fut = call();
        async move {
            let result = match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(ReaderError::Timeout(timeout)),
            };
            if let Err(e) = &result {
                warn!(
                    operation,
                    attempt,
                    window = ?window,
                    transient = e.is_transient(),
                    error = %e,
                    "RPC call failed"
                );
            }
            result
        }
    };

    let retry = RetryIf::spawn(policy.strategy(), action, |e: &ReaderError| {
        e.is_transient()
    });

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(RelayError::Cancelled),
        result = retry => result,
    };

    let attempts = attempts.load(Ordering::Relaxed);
    match result {
        Ok(value) => {
            if attempts > 1 {
                metrics.record_rpc_retries(operation, attempts - 1);
            }
            Ok(value)
        }
        Err(source) if source.is_transient() => Err(RelayError::Transient {
            operation,
            window,
            attempts,
            source,
        }),
        Err(source) => Err(RelayError::Reader {
            operation,
            window,
            source,
        }),
    }
}
