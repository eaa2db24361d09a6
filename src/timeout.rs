//! Deadline for remote calls.
use std::{future::Future, time::Duration};

use crate::{error::RemoteApi, Error, Result};

/// Wait for `pending` for at most `timeout`.
///
/// Returns `pending`'s own result if it finishes first, otherwise [`Error::Timeout`]. The deadline
/// timer is dropped as soon as `pending` completes. On timeout, `pending` is dropped, which cancels
/// the wait on the remote call; whether the remote side keeps processing it is up to the transport.
pub async fn with_timeout<T, F>(api: RemoteApi, timeout: Duration, pending: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, pending).await {
        Ok(result) => result,
        Err(_elapsed) => {
            log::debug!(target: "delivery_client",
                        api:display = api,
                        timeout_millis = timeout.as_millis() as u64;
                        "remote call timed out");
            Err(Error::Timeout {
                api,
                timeout_millis: timeout.as_millis() as u64,
            })
        }
    }
}
