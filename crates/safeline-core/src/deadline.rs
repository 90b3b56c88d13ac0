//! Deadlines for external calls
//!
//! Every Directory and IncidentStore call goes through [`Deadline`]. Reads may
//! be retried once after a timeout; commits never are, since a timed-out
//! commit may still have landed.

use crate::error::{LifecycleError, LifecycleResult, StorageResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    limit: Duration,
}

impl Deadline {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Run one call under the deadline
    pub async fn run<T, F>(&self, operation: &'static str, call: F) -> LifecycleResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result.map_err(LifecycleError::from),
            Err(_) => Err(LifecycleError::Timeout {
                operation,
                after_ms: self.limit.as_millis() as u64,
            }),
        }
    }

    /// Run an idempotent read, retrying exactly once on timeout
    pub async fn read<T, F, Fut>(&self, operation: &'static str, mut call: F) -> LifecycleResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        match self.run(operation, call()).await {
            Err(err) if err.is_timeout() => {
                warn!(operation, timeout_ms = self.limit.as_millis() as u64, "Read timed out, retrying once");
                self.run(operation, call()).await
            }
            other => other,
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::from_millis(5_000)
    }
}
