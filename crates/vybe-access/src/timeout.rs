//! Structured timeouts for remote calls
//!
//! Every remote call races against a timer and a cancellation token. The
//! first to settle wins; the loser is dropped, not cancelled at the transport.
//!
//! ```ignore
//! let row = remote_call("tier query", config.query_timeout, &cancel, async {
//!     repo.find_by_user(&user_id).await
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::metrics::{self, Status};
use crate::AccessError;

/// Why a raced call did not produce its own output
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    #[error("{operation} timed out after {after:?}")]
    TimedOut {
        operation: &'static str,
        after: Duration,
    },

    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },
}

impl From<Interrupted> for AccessError {
    fn from(err: Interrupted) -> Self {
        match err {
            Interrupted::TimedOut { operation, after } => Self::Timeout { operation, after },
            Interrupted::Cancelled { operation } => Self::Cancelled { operation },
        }
    }
}

/// Race `future` against `budget` and `cancel`.
pub async fn with_timeout<F>(
    operation: &'static str,
    budget: Duration,
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, Interrupted>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled { operation }),
        result = tokio::time::timeout(budget, future) => {
            result.map_err(|_| Interrupted::TimedOut { operation, after: budget })
        }
    }
}

/// [`with_timeout`] for fallible backend calls, recording call metrics.
///
/// The outer result is the race outcome, the inner one the call's own.
pub async fn remote_call<F, T, E>(
    operation: &'static str,
    budget: Duration,
    cancel: &CancellationToken,
    future: F,
) -> Result<Result<T, E>, Interrupted>
where
    F: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let outcome = with_timeout(operation, budget, cancel, future).await;

    let status = match &outcome {
        Ok(Ok(_)) => Status::Success,
        Ok(Err(_)) => Status::Error,
        Err(Interrupted::TimedOut { .. }) => Status::Timeout,
        Err(Interrupted::Cancelled { .. }) => Status::Cancelled,
    };
    metrics::record_remote_call(operation, status, started.elapsed().as_secs_f64());

    if let Err(interrupted) = &outcome {
        tracing::warn!(operation, error = %interrupted, "remote call interrupted");
    }

    outcome
}
