//! Per-call execution context.

use crate::error::{DbError, DbResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline carried by every call.
///
/// This is the only cancellation channel: drivers race the database future
/// against the token and the deadline. Nothing else imposes a timeout.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl QueryContext {
    /// A context that never cancels or expires.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Drive `fut` to completion unless the context is cancelled or expires first.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> DbResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        if self.is_cancelled() {
            return Err(DbError::cancelled(operation));
        }

        let started = Instant::now();
        if self.deadline.is_some_and(|d| d <= started) {
            return Err(DbError::timeout(operation, 0));
        }

        let timed = async {
            match self.deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(DbError::timeout(
                        operation,
                        started.elapsed().as_millis() as u64,
                    )),
                },
                None => fut.await,
            }
        };

        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(DbError::cancelled(operation)),
                result = timed => result,
            },
            None => timed.await,
        }
    }
}
