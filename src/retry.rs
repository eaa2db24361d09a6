//! Bounded retry of async operations.
use std::future::Future;

/// Run `operation` up to `max_attempts` times, returning the first success.
///
/// Attempts are made back to back, without delay. If every attempt fails, the error from the
/// *last* attempt is returned. `max_attempts` of `0` or `1` means a single attempt.
pub async fn retry<T, E, F, Fut>(max_attempts: u32, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => return Err(err),
            Err(_) => {
                log::debug!(target: "delivery_client",
                            attempt,
                            max_attempts;
                            "attempt failed, retrying");
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::retry;

    #[tokio::test]
    async fn returns_first_success() {
        let calls = &AtomicU32::new(0);
        let result: Result<u32, String> = retry(3, || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("attempt {n}"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), String> = retry(3, || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err(format!("attempt {n}"))
        })
        .await;

        assert_eq!(result, Err("attempt 3".to_owned()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn single_attempt_does_not_retry() {
        for max_attempts in [0, 1] {
            let calls = &AtomicU32::new(0);
            let result: Result<(), &str> = retry(max_attempts, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("nope")
            })
            .await;

            assert_eq!(result, Err("nope"));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn stops_after_success() {
        let calls = &AtomicU32::new(0);
        let result: Result<&str, &str> = retry(5, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("done")
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
