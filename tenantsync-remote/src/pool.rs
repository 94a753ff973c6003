//! Request pool shared by every resource client.
//!
//! Admission control, in order:
//! 1. a concurrency permit (at most `max_concurrent` calls in flight)
//! 2. a slot in the rolling one-second window (at most `max_per_second`
//!    calls started per window)
//!
//! Retryable failures (HTTP 429 and 5xx) re-enter admission after an
//! exponential backoff, up to `max_retries` times.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tenantsync_core::PoolSettings;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::error::RemoteError;

const WINDOW: Duration = Duration::from_secs(1);
const BASE_BACKOFF: Duration = Duration::from_millis(250);

/// Cheap to clone; clones share the same limits.
#[derive(Debug, Clone)]
pub struct RequestPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    permits: Semaphore,
    started: Mutex<VecDeque<Instant>>,
    max_per_window: usize,
    max_retries: u32,
}

impl RequestPool {
    pub fn new(settings: &PoolSettings) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                permits: Semaphore::new(settings.max_concurrent.max(1)),
                started: Mutex::new(VecDeque::new()),
                max_per_window: settings.max_per_second.max(1),
                max_retries: settings.max_retries,
            }),
        }
    }

    /// Run `call` under admission control, retrying retryable failures.
    ///
    /// `call` is invoked once per attempt; `label` only feeds the logs.
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let result = {
                let _permit = self.admit().await?;
                call().await
            };
            match result {
                Err(err) if err.is_retryable() && attempt < self.inner.max_retries => {
                    let delay = retry_delay(&err, attempt);
                    attempt += 1;
                    warn!(
                        label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying remote call"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn admit(&self) -> Result<SemaphorePermit<'_>, RemoteError> {
        let permit = self
            .inner
            .permits
            .acquire()
            .await
            .map_err(|_| RemoteError::Config("request pool is closed".into()))?;

        loop {
            let now = Instant::now();
            let wait = {
                let mut started = self.inner.started.lock().await;
                while started
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= WINDOW)
                {
                    started.pop_front();
                }
                if started.len() < self.inner.max_per_window {
                    started.push_back(now);
                    None
                } else {
                    started
                        .front()
                        .map(|oldest| (*oldest + WINDOW).saturating_duration_since(now))
                }
            };
            match wait {
                None => return Ok(permit),
                Some(delay) => {
                    trace!(delay_ms = delay.as_millis() as u64, "rate window full");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn retry_delay(err: &RemoteError, attempt: u32) -> Duration {
    match err {
        RemoteError::RateLimited { retry_after: Some(hint) } => *hint,
        _ => BASE_BACKOFF * 2u32.saturating_pow(attempt),
    }
}
