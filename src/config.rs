use std::{sync::Arc, time::Duration};

use crate::{
    clock::{Clock, SystemClock},
    experiment::TwoArmExperiment,
    models::{CohortArm, CohortMembership, Insertion},
    DeliveryApi, DeliveryClient, ErrorHandler, IdGenerator, MetricsApi,
};

/// Reduces an insertion to the fields a remote call needs.
pub type InsertionCompactor = Arc<dyn Fn(Insertion) -> Insertion + Send + Sync>;

/// Decides whether a cohort membership should get the delivery service ranking.
pub type TreatmentPredicate = Arc<dyn Fn(&CohortMembership) -> bool + Send + Sync>;

/// Configuration for [`DeliveryClient`].
///
/// Built once with every field populated; the client never checks for unset options while
/// handling requests.
///
/// # Examples
/// ```
/// # use std::time::Duration;
/// # use delivery_client::{
/// #     ApiError, ClientConfig, LogErrors, LogRequest, LogResponse, Request, Response,
/// # };
/// let config = ClientConfig::new(
///     |_request: Request| async { Ok::<_, ApiError>(Response::default()) },
///     |_log: LogRequest| async { Ok::<_, ApiError>(LogResponse::default()) },
///     || "some-uuid".to_owned(),
///     LogErrors,
/// )
/// .with_delivery_timeout(Duration::from_millis(100));
/// let client = config.to_client();
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) enabled: bool,
    pub(crate) perform_checks: bool,
    pub(crate) delivery_timeout: Duration,
    pub(crate) metrics_timeout: Duration,
    pub(crate) metrics_retry_attempts: u32,
    pub(crate) default_request_limit: i64,
    pub(crate) max_request_insertions: usize,
    pub(crate) delivery_api: Arc<dyn DeliveryApi>,
    pub(crate) metrics_api: Arc<dyn MetricsApi>,
    pub(crate) id_generator: Arc<dyn IdGenerator>,
    pub(crate) error_handler: Arc<dyn ErrorHandler>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) experiment: Option<Arc<TwoArmExperiment>>,
    pub(crate) compact_delivery_insertion: InsertionCompactor,
    pub(crate) compact_metrics_insertion: InsertionCompactor,
    pub(crate) should_apply_treatment: TreatmentPredicate,
}

impl ClientConfig {
    /// Default value for [`ClientConfig::with_delivery_timeout`].
    pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_millis(250);
    /// Default value for [`ClientConfig::with_metrics_timeout`].
    pub const DEFAULT_METRICS_TIMEOUT: Duration = Duration::from_millis(3000);
    /// Default value for [`ClientConfig::with_metrics_retry_attempts`]. No retry.
    pub const DEFAULT_METRICS_RETRY_ATTEMPTS: u32 = 1;
    /// Default value for [`ClientConfig::with_default_request_limit`].
    pub const DEFAULT_REQUEST_LIMIT: i64 = 10;
    /// Default value for [`ClientConfig::with_max_request_insertions`].
    pub const DEFAULT_MAX_REQUEST_INSERTIONS: usize = 1000;

    /// Create a configuration with the required callbacks and default settings.
    pub fn new(
        delivery_api: impl DeliveryApi + 'static,
        metrics_api: impl MetricsApi + 'static,
        id_generator: impl IdGenerator + 'static,
        error_handler: impl ErrorHandler + 'static,
    ) -> ClientConfig {
        ClientConfig {
            enabled: true,
            perform_checks: true,
            delivery_timeout: Self::DEFAULT_DELIVERY_TIMEOUT,
            metrics_timeout: Self::DEFAULT_METRICS_TIMEOUT,
            metrics_retry_attempts: Self::DEFAULT_METRICS_RETRY_ATTEMPTS,
            default_request_limit: Self::DEFAULT_REQUEST_LIMIT,
            max_request_insertions: Self::DEFAULT_MAX_REQUEST_INSERTIONS,
            delivery_api: Arc::new(delivery_api),
            metrics_api: Arc::new(metrics_api),
            id_generator: Arc::new(id_generator),
            error_handler: Arc::new(error_handler),
            clock: Arc::new(SystemClock),
            experiment: None,
            compact_delivery_insertion: Arc::new(|insertion: Insertion| insertion),
            compact_metrics_insertion: Arc::new(|insertion: Insertion| insertion),
            should_apply_treatment: Arc::new(|membership: &CohortMembership| {
                membership.arm != CohortArm::Control
            }),
        }
    }

    /// When disabled, the client never calls remote services and passes the caller's insertions
    /// through. Defaults to `true`.
    pub fn with_enabled(mut self, enabled: bool) -> ClientConfig {
        self.enabled = enabled;
        self
    }

    /// Validate requests before handling them. Defaults to `true`.
    pub fn with_perform_checks(mut self, perform_checks: bool) -> ClientConfig {
        self.perform_checks = perform_checks;
        self
    }

    /// Time budget for the delivery service call.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> ClientConfig {
        self.delivery_timeout = timeout;
        self
    }

    /// Time budget for each metrics service attempt.
    pub fn with_metrics_timeout(mut self, timeout: Duration) -> ClientConfig {
        self.metrics_timeout = timeout;
        self
    }

    /// Maximum number of attempts to send a log record.
    pub fn with_metrics_retry_attempts(mut self, attempts: u32) -> ClientConfig {
        self.metrics_retry_attempts = attempts;
        self
    }

    /// Page size used when the request sets neither `paging.size` nor `limit`.
    pub fn with_default_request_limit(mut self, limit: i64) -> ClientConfig {
        self.default_request_limit = limit;
        self
    }

    /// Maximum number of insertions sent to the delivery service.
    pub fn with_max_request_insertions(mut self, max: usize) -> ClientConfig {
        self.max_request_insertions = max;
        self
    }

    /// Override the clock used to fill in missing client timestamps.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> ClientConfig {
        self.clock = Arc::new(clock);
        self
    }

    /// Run every request inside `experiment`, keyed on `userInfo.logUserId`.
    pub fn with_experiment(mut self, experiment: TwoArmExperiment) -> ClientConfig {
        self.experiment = Some(Arc::new(experiment));
        self
    }

    /// Compact insertions before they are sent to the delivery service.
    pub fn with_compact_delivery_insertion(
        mut self,
        compact: impl Fn(Insertion) -> Insertion + Send + Sync + 'static,
    ) -> ClientConfig {
        self.compact_delivery_insertion = Arc::new(compact);
        self
    }

    /// Compact insertions before they are sent to the metrics service.
    pub fn with_compact_metrics_insertion(
        mut self,
        compact: impl Fn(Insertion) -> Insertion + Send + Sync + 'static,
    ) -> ClientConfig {
        self.compact_metrics_insertion = Arc::new(compact);
        self
    }

    /// Decide which cohort memberships get the delivery service ranking. By default every arm
    /// except [`CohortArm::Control`] does.
    pub fn with_should_apply_treatment(
        mut self,
        predicate: impl Fn(&CohortMembership) -> bool + Send + Sync + 'static,
    ) -> ClientConfig {
        self.should_apply_treatment = Arc::new(predicate);
        self
    }

    /// Create a new [`DeliveryClient`] using this configuration.
    pub fn to_client(self) -> DeliveryClient {
        DeliveryClient::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApiError, LogErrors, LogRequest, LogResponse, Request, Response};

    fn config() -> ClientConfig {
        ClientConfig::new(
            |_request: Request| async { Ok::<_, ApiError>(Response::default()) },
            |_log: LogRequest| async { Ok::<_, ApiError>(LogResponse::default()) },
            || "id".to_owned(),
            LogErrors,
        )
    }

    #[test]
    fn defaults() {
        let config = config();
        assert!(config.enabled);
        assert!(config.perform_checks);
        assert_eq!(config.delivery_timeout, Duration::from_millis(250));
        assert_eq!(config.metrics_timeout, Duration::from_millis(3000));
        assert_eq!(config.metrics_retry_attempts, 1);
        assert_eq!(config.default_request_limit, 10);
        assert_eq!(config.max_request_insertions, 1000);
        assert!(config.experiment.is_none());
    }

    #[test]
    fn default_compaction_is_identity() {
        let config = config();
        let mut insertion = Insertion::new("a");
        insertion.properties = Some(serde_json::json!({"x": 1}).into());
        assert_eq!(
            (config.compact_delivery_insertion)(insertion.clone()),
            insertion
        );
        assert_eq!((config.compact_metrics_insertion)(insertion.clone()), insertion);
    }

    #[test]
    fn default_predicate_skips_control() {
        let config = config();
        assert!(!(config.should_apply_treatment)(&CohortMembership::new(
            "c",
            CohortArm::Control
        )));
        assert!((config.should_apply_treatment)(&CohortMembership::new(
            "c",
            CohortArm::Treatment
        )));
    }

    #[test]
    fn builder_overrides() {
        let config = config()
            .with_enabled(false)
            .with_perform_checks(false)
            .with_delivery_timeout(Duration::from_millis(10))
            .with_metrics_retry_attempts(3)
            .with_default_request_limit(25);
        assert!(!config.enabled);
        assert!(!config.perform_checks);
        assert_eq!(config.delivery_timeout, Duration::from_millis(10));
        assert_eq!(config.metrics_retry_attempts, 3);
        assert_eq!(config.default_request_limit, 25);
    }
}
