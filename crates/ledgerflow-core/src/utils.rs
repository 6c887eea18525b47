/*!
 * Utility functions and helpers for LedgerFlow.
 *
 * This module provides common async utilities used by callers that wrap
 * engine invocations.
 */
use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Run a future with a timeout
///
/// # Arguments
///
/// * `duration` - The timeout duration
/// * `future` - The future to run
///
/// # Returns
///
/// The result of the future, or a timeout error if the timeout is reached
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout("Operation timed out")),
    }
}

/// Run a fallible operation with a bounded number of retries
///
/// # Arguments
///
/// * `retries` - The number of retries after the first attempt
/// * `future_factory` - A function that creates a new future for each attempt
///
/// # Returns
///
/// The first successful result, or the last error if all attempts fail
pub async fn with_retry<F, Fut, T>(retries: usize, mut future_factory: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..=retries {
        if attempt > 0 {
            debug!("Retry {}/{}", attempt, retries);
        }

        match future_factory().await {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error.unwrap_or_else(|| Error::other("Retry loop produced no error")))
}

/// Spawn a task and log any error it returns
///
/// # Arguments
///
/// * `name` - A name for the task, used in log output
/// * `future` - The future to run
pub fn spawn_and_log<F>(name: &str, future: F) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        if let Err(e) = future.await {
            error!("Task '{}' failed: {}", name, e);
        }
    })
}
