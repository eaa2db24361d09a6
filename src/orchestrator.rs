//! The deliver/log state machine.
//!
//! Every call goes through these states:
//!
//! ```text
//! INIT -> VALIDATED -> { EXPERIMENT_SKIPPED | EXPERIMENT_CONTROL | REMOTE_CALLED } -> RESPONDED
//!                                                                  -> (deferred) LOGGED
//! ```
//!
//! Failures of the delivery call never reach the caller directly: they are reported to the
//! [`ErrorHandler`](crate::ErrorHandler) and the caller's own ordering is served instead.
use std::collections::HashMap;

use crate::{
    config::ClientConfig,
    error::RemoteApi,
    models::{
        CohortMembership, DeliveryRequest, ExecutionServer, Insertion, LogRequest, Paging,
        Request,
    },
    pager::apply_paging_from,
    response::{ClientResponse, DeferredLog},
    timeout::with_timeout,
    validator::validate,
    Error, Result,
};

/// Calls the delivery service when the request qualifies, falling back to the caller's ordering.
pub struct LiveOrchestrator {
    config: ClientConfig,
}

impl LiveOrchestrator {
    /// Create an orchestrator with `config`.
    pub fn new(config: ClientConfig) -> LiveOrchestrator {
        LiveOrchestrator { config }
    }

    /// Rank `delivery_request` and prepare its log record.
    ///
    /// # Errors
    ///
    /// Returns an error only if the configured error handler returns one for a validation or
    /// delivery failure. Otherwise failures are reported to the handler and the caller's
    /// insertions are paged locally.
    pub async fn deliver(&self, delivery_request: DeliveryRequest) -> Result<ClientResponse> {
        self.handle(delivery_request, false).await
    }

    /// Like [`LiveOrchestrator::deliver`], but never calls the delivery service. Use when the
    /// caller has already ranked the insertions and only wants them logged.
    pub async fn prepare_for_logging(
        &self,
        delivery_request: DeliveryRequest,
    ) -> Result<ClientResponse> {
        self.handle(delivery_request, true).await
    }

    async fn handle(
        &self,
        mut delivery_request: DeliveryRequest,
        force_only_log: bool,
    ) -> Result<ClientResponse> {
        self.fill_request_defaults(&mut delivery_request.request);

        if self.config.perform_checks {
            if let Err(err) = validate(&delivery_request) {
                log::warn!(target: "delivery_client", "invalid delivery request: {err}");
                self.config.error_handler.handle_error(err.into())?;
            }
        }

        let only_log = force_only_log || delivery_request.only_log;
        // Log-only requests never enter the experiment.
        let cohort_membership = if only_log {
            None
        } else {
            self.cohort_membership(&delivery_request)
        };
        let paging = effective_paging(
            &delivery_request.request,
            self.config.default_request_limit,
        );

        let apply_treatment = cohort_membership
            .as_ref()
            .map_or(true, |membership| (self.config.should_apply_treatment)(membership));

        log::trace!(target: "delivery_client",
                    only_log,
                    apply_treatment,
                    in_experiment = cohort_membership.is_some();
                    "handling delivery request");

        let mut delivered = None;
        if !only_log && apply_treatment {
            match self.call_delivery_api(&delivery_request, paging).await {
                Ok(insertions) => delivered = Some(insertions),
                Err(err) => {
                    log::warn!(target: "delivery_client",
                               "delivery API call failed, falling back to local ordering: {err}");
                    self.config.error_handler.handle_error(err)?;
                }
            }
        }

        let execution_server = if delivered.is_some() {
            ExecutionServer::Api
        } else {
            ExecutionServer::Sdk
        };
        let mut response_insertions = delivered.unwrap_or_else(|| {
            apply_paging_from(
                &delivery_request.full_insertion,
                delivery_request.insertion_page_type,
                Some(&paging),
                delivery_request.retrieval_insertion_offset,
            )
        });
        assign_insertion_ids(&mut response_insertions, &self.config);

        let log_request = self.build_log_request(
            &delivery_request.request,
            execution_server,
            &response_insertions,
            cohort_membership,
        );
        let deferred_log = match log_request {
            Some(log_request) => DeferredLog::new(
                log_request,
                self.config.metrics_api.clone(),
                self.config.error_handler.clone(),
                self.config.metrics_timeout,
                self.config.metrics_retry_attempts,
            ),
            None => DeferredLog::noop(),
        };

        Ok(ClientResponse {
            response_insertions,
            execution_server,
            client_request_id: delivery_request.request.client_request_id,
            deferred_log,
        })
    }

    fn fill_request_defaults(&self, request: &mut Request) {
        let timing = request.timing.get_or_insert_with(Default::default);
        if timing.client_log_timestamp.is_none() {
            timing.client_log_timestamp = Some(self.config.clock.now_millis());
        }
        request
            .client_info
            .get_or_insert_with(Default::default)
            .fill_defaults();
        if request.client_request_id.is_none() {
            request.client_request_id = Some(self.config.id_generator.generate_id());
        }
    }

    /// Caller-provided membership takes precedence over the configured experiment. Fields the
    /// membership leaves unset are inherited from the request.
    fn cohort_membership(&self, delivery_request: &DeliveryRequest) -> Option<CohortMembership> {
        let request = &delivery_request.request;
        let mut membership = match &delivery_request.experiment {
            Some(membership) => membership.clone(),
            None => {
                let experiment = self.config.experiment.as_ref()?;
                let identity = request.user_info.as_ref()?.log_user_id.as_deref()?;
                experiment.membership(identity)?
            }
        };

        if membership.platform_id.is_none() {
            membership.platform_id = request.platform_id;
        }
        if membership.user_info.is_none() {
            membership.user_info = request.user_info.clone();
        }
        if membership.timing.is_none() {
            membership.timing = request.timing;
        }
        Some(membership)
    }

    async fn call_delivery_api(
        &self,
        delivery_request: &DeliveryRequest,
        paging: Paging,
    ) -> Result<Vec<Insertion>> {
        let mut request = delivery_request.request.clone();
        request.paging = Some(paging);
        request.insertion = delivery_request
            .full_insertion
            .iter()
            .take(self.config.max_request_insertions)
            .map(|insertion| (self.config.compact_delivery_insertion)(insertion.clone()))
            .collect();

        log::debug!(target: "delivery_client",
                    insertions = request.insertion.len();
                    "calling delivery API");

        let pending = self.config.delivery_api.deliver(request);
        let response = with_timeout(RemoteApi::Delivery, self.config.delivery_timeout, async {
            pending
                .await
                .map_err(|err| Error::remote_call(RemoteApi::Delivery, err))
        })
        .await?;

        Ok(expand_insertions(
            &delivery_request.full_insertion,
            response.insertion,
        ))
    }

    /// `None` when there is nothing to log.
    fn build_log_request(
        &self,
        request: &Request,
        execution_server: ExecutionServer,
        response_insertions: &[Insertion],
        cohort_membership: Option<CohortMembership>,
    ) -> Option<LogRequest> {
        let mut log_request = LogRequest {
            platform_id: request.platform_id,
            user_info: request.user_info.clone(),
            timing: request.timing,
            client_info: request.client_info,
            request: Vec::new(),
            cohort_membership: cohort_membership.into_iter().collect(),
        };

        // The delivery service logs the requests it receives.
        if execution_server == ExecutionServer::Sdk {
            let mut logged = request.clone();
            if logged.request_id.is_none() {
                logged.request_id = Some(self.config.id_generator.generate_id());
            }
            logged.insertion = response_insertions
                .iter()
                .map(|insertion| (self.config.compact_metrics_insertion)(insertion.clone()))
                .collect();
            log_request.request.push(logged);
        }

        if log_request.request.is_empty() && log_request.cohort_membership.is_empty() {
            None
        } else {
            Some(log_request)
        }
    }
}

/// Passes the caller's insertions through without calling any remote service.
///
/// Used when the client is disabled.
pub struct NoopOrchestrator {
    config: ClientConfig,
}

impl NoopOrchestrator {
    /// Create a pass-through orchestrator with `config`.
    pub fn new(config: ClientConfig) -> NoopOrchestrator {
        NoopOrchestrator { config }
    }

    /// Page the caller's insertions. Never fails and never logs.
    pub async fn deliver(&self, delivery_request: DeliveryRequest) -> Result<ClientResponse> {
        let paging = effective_paging(
            &delivery_request.request,
            self.config.default_request_limit,
        );
        let mut response_insertions = apply_paging_from(
            &delivery_request.full_insertion,
            delivery_request.insertion_page_type,
            Some(&paging),
            delivery_request.retrieval_insertion_offset,
        );
        assign_insertion_ids(&mut response_insertions, &self.config);

        Ok(ClientResponse {
            response_insertions,
            execution_server: ExecutionServer::Sdk,
            client_request_id: delivery_request.request.client_request_id,
            deferred_log: DeferredLog::noop(),
        })
    }

    /// Same as [`NoopOrchestrator::deliver`].
    pub async fn prepare_for_logging(
        &self,
        delivery_request: DeliveryRequest,
    ) -> Result<ClientResponse> {
        self.deliver(delivery_request).await
    }
}

/// Page size: `paging.size`, then `limit`, then `default_limit`, whichever is set and positive
/// first.
fn effective_paging(request: &Request, default_limit: i64) -> Paging {
    let paging = request.paging.unwrap_or_default();
    let size = paging
        .size
        .filter(|&size| size > 0)
        .or(request.limit.filter(|&limit| limit > 0))
        .unwrap_or(default_limit);
    Paging {
        offset: paging.offset,
        size: Some(size),
    }
}

fn assign_insertion_ids(insertions: &mut [Insertion], config: &ClientConfig) {
    for insertion in insertions {
        if insertion.insertion_id.as_deref().map_or(true, str::is_empty) {
            insertion.insertion_id = Some(config.id_generator.generate_id());
        }
    }
}

/// Re-attach details dropped by compaction. Response insertions without a matching full
/// insertion are passed through unchanged.
fn expand_insertions(full_insertions: &[Insertion], response: Vec<Insertion>) -> Vec<Insertion> {
    let mut by_content_id = HashMap::with_capacity(full_insertions.len());
    for insertion in full_insertions {
        by_content_id
            .entry(insertion.content_id.as_str())
            .or_insert(insertion);
    }

    response
        .into_iter()
        .map(|mut insertion| {
            if insertion.properties.is_none() {
                if let Some(full) = by_content_id.get(insertion.content_id.as_str()) {
                    insertion.properties = full.properties.clone();
                }
            }
            insertion
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{effective_paging, expand_insertions};
    use crate::models::{Insertion, Paging, Properties, Request};

    #[test]
    fn paging_size_precedence() {
        let mut request = Request::default();
        assert_eq!(effective_paging(&request, 10).size, Some(10));

        request.limit = Some(0);
        assert_eq!(effective_paging(&request, 10).size, Some(10));

        request.limit = Some(5);
        assert_eq!(effective_paging(&request, 10).size, Some(5));

        request.paging = Some(Paging {
            offset: Some(3),
            size: Some(2),
        });
        assert_eq!(
            effective_paging(&request, 10),
            Paging {
                offset: Some(3),
                size: Some(2)
            }
        );

        request.paging = Some(Paging {
            offset: None,
            size: Some(-1),
        });
        assert_eq!(effective_paging(&request, 10).size, Some(5));
    }

    #[test]
    fn expand_restores_missing_properties_only() {
        let full = vec![
            Insertion {
                properties: Some(Properties::from(json!({"v": "first"}))),
                ..Insertion::new("a")
            },
            Insertion {
                properties: Some(Properties::from(json!({"v": "duplicate"}))),
                ..Insertion::new("a")
            },
            Insertion {
                properties: Some(Properties::from(json!({"v": "b"}))),
                ..Insertion::new("b")
            },
        ];
        let response = vec![
            Insertion::new("a"),
            Insertion {
                properties: Some(Properties::from(json!({"v": "server"}))),
                ..Insertion::new("b")
            },
            Insertion::new("unknown"),
        ];

        let expanded = expand_insertions(&full, response);

        assert_eq!(
            expanded[0].properties,
            Some(Properties::from(json!({"v": "first"})))
        );
        assert_eq!(
            expanded[1].properties,
            Some(Properties::from(json!({"v": "server"})))
        );
        assert_eq!(expanded[2], Insertion::new("unknown"));
    }
}
