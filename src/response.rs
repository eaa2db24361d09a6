use std::{sync::Arc, time::Duration};

use crate::{
    error::RemoteApi,
    models::{ExecutionServer, Insertion, LogRequest},
    retry::retry,
    timeout::with_timeout,
    Error, ErrorHandler, MetricsApi, Result,
};

/// Result of [`DeliveryClient::deliver`](crate::DeliveryClient::deliver).
///
/// Use `response_insertions` to render the page, then call [`ClientResponse::log`] (or send
/// [`ClientResponse::deferred_log`] from a background task) so logging stays off the response
/// path.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    /// Insertions to show, in order. Every insertion has an `insertion_id`.
    pub response_insertions: Vec<Insertion>,
    /// Whether the delivery service or the client produced the ordering.
    pub execution_server: ExecutionServer,
    /// Client request id shared by the delivery call and the log record.
    pub client_request_id: Option<String>,
    /// Log record to send once the response has been used.
    pub deferred_log: DeferredLog,
}

impl ClientResponse {
    /// `true` if `response_insertions` come from the delivery service.
    pub fn called_delivery_api(&self) -> bool {
        self.execution_server == ExecutionServer::Api
    }

    /// The record [`ClientResponse::log`] will send, if any.
    pub fn log_request(&self) -> Option<&LogRequest> {
        self.deferred_log.log_request()
    }

    /// Send the log record to the metrics service. See [`DeferredLog::send`].
    pub async fn log(&self) -> Result<()> {
        self.deferred_log.send().await
    }
}

/// A log record bundled with everything needed to send it later.
///
/// Cheap to clone and `'static`, so it can be moved into a spawned task.
#[derive(Clone)]
pub struct DeferredLog {
    inner: Option<Arc<DeferredLogInner>>,
}

struct DeferredLogInner {
    log_request: LogRequest,
    metrics_api: Arc<dyn MetricsApi>,
    error_handler: Arc<dyn ErrorHandler>,
    timeout: Duration,
    max_attempts: u32,
}

impl std::fmt::Debug for DeferredLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredLog")
            .field("log_request", &self.log_request())
            .finish_non_exhaustive()
    }
}

impl DeferredLog {
    /// A log that sends nothing.
    pub fn noop() -> DeferredLog {
        DeferredLog { inner: None }
    }

    pub(crate) fn new(
        log_request: LogRequest,
        metrics_api: Arc<dyn MetricsApi>,
        error_handler: Arc<dyn ErrorHandler>,
        timeout: Duration,
        max_attempts: u32,
    ) -> DeferredLog {
        DeferredLog {
            inner: Some(Arc::new(DeferredLogInner {
                log_request,
                metrics_api,
                error_handler,
                timeout,
                max_attempts,
            })),
        }
    }

    /// The record to send, or `None` for a no-op log.
    pub fn log_request(&self) -> Option<&LogRequest> {
        self.inner.as_ref().map(|inner| &inner.log_request)
    }

    /// Send the log record to the metrics service.
    ///
    /// Each attempt is bounded by the metrics timeout. A failure after the last attempt is passed
    /// to the error handler; this returns `Err` only if the handler does. A no-op log returns
    /// immediately.
    pub async fn send(&self) -> Result<()> {
        let Some(inner) = &self.inner else {
            return Ok(());
        };

        let result = retry(inner.max_attempts, || {
            let pending = inner.metrics_api.log(inner.log_request.clone());
            with_timeout(RemoteApi::Metrics, inner.timeout, async move {
                pending
                    .await
                    .map_err(|err| Error::remote_call(RemoteApi::Metrics, err))
            })
        })
        .await;

        match result {
            Ok(_) => {
                log::debug!(target: "delivery_client", "sent log request");
                Ok(())
            }
            Err(err) => {
                log::warn!(target: "delivery_client", "failed to send log request: {err}");
                inner.error_handler.handle_error(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    };
    use std::time::Duration;

    use super::DeferredLog;
    use crate::{
        ApiError, Error, LogErrors, LogRequest, LogResponse, MetricsApi, RethrowErrors,
    };

    fn failing_metrics(calls: Arc<AtomicU32>) -> Arc<dyn MetricsApi> {
        Arc::new(move |_log: LogRequest| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<LogResponse, ApiError>("unavailable".into()) }
        })
    }

    #[tokio::test]
    async fn noop_log_sends_nothing() {
        let log = DeferredLog::noop();
        assert!(log.log_request().is_none());
        assert!(log.send().await.is_ok());
    }

    #[tokio::test]
    async fn sends_log_request() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let metrics: Arc<dyn MetricsApi> = {
            let received = received.clone();
            Arc::new(move |log: LogRequest| {
                received.lock().unwrap().push(log);
                async { Ok::<_, ApiError>(LogResponse::default()) }
            })
        };
        let log_request = LogRequest {
            platform_id: Some(1),
            ..LogRequest::default()
        };
        let log = DeferredLog::new(
            log_request.clone(),
            metrics,
            Arc::new(RethrowErrors),
            Duration::from_secs(1),
            1,
        );

        log.send().await.unwrap();
        assert_eq!(*received.lock().unwrap(), vec![log_request]);
    }

    #[tokio::test]
    async fn failure_goes_to_handler() {
        let calls = Arc::new(AtomicU32::new(0));
        let log = DeferredLog::new(
            LogRequest::default(),
            failing_metrics(calls.clone()),
            Arc::new(RethrowErrors),
            Duration::from_secs(1),
            1,
        );
        assert!(matches!(
            log.send().await,
            Err(Error::RemoteCall { .. })
        ));

        let log = DeferredLog::new(
            LogRequest::default(),
            failing_metrics(calls.clone()),
            Arc::new(LogErrors),
            Duration::from_secs(1),
            1,
        );
        assert!(log.send().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retries_up_to_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let log = DeferredLog::new(
            LogRequest::default(),
            failing_metrics(calls.clone()),
            Arc::new(LogErrors),
            Duration::from_secs(1),
            3,
        );
        assert!(log.send().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_metrics_times_out() {
        let metrics: Arc<dyn MetricsApi> = Arc::new(|_log: LogRequest| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, ApiError>(LogResponse::default())
        });
        let log = DeferredLog::new(
            LogRequest::default(),
            metrics,
            Arc::new(RethrowErrors),
            Duration::from_millis(3000),
            1,
        );
        assert!(matches!(
            log.send().await,
            Err(Error::Timeout {
                timeout_millis: 3000,
                ..
            })
        ));
    }
}
