use crate::{
    models::DeliveryRequest,
    orchestrator::{LiveOrchestrator, NoopOrchestrator},
    ClientConfig, ClientResponse, Result,
};

/// A client for the delivery and metrics services.
///
/// In order to create a client instance, first create a [`ClientConfig`]. A disabled
/// configuration produces a pass-through client with the same interface.
///
/// # Examples
/// ```
/// # async fn run(config: delivery_client::ClientConfig) -> delivery_client::Result<()> {
/// # use delivery_client::{DeliveryRequest, Insertion, Request, UserInfo};
/// let client = config.to_client();
/// let response = client
///     .deliver(DeliveryRequest {
///         request: Request {
///             user_info: Some(UserInfo::with_log_user_id("log-user-1")),
///             ..Request::default()
///         },
///         full_insertion: vec![Insertion::new("product-1"), Insertion::new("product-2")],
///         ..DeliveryRequest::default()
///     })
///     .await?;
///
/// // Render `response.response_insertions`, then log what was shown.
/// response.log().await?;
/// # Ok(())
/// # }
/// ```
pub enum DeliveryClient {
    /// Validates, calls remote services, and logs.
    Live(LiveOrchestrator),
    /// Pages the caller's insertions locally and never calls remote services.
    Noop(NoopOrchestrator),
}

impl DeliveryClient {
    /// Create a new `DeliveryClient` using the specified configuration.
    pub fn new(config: ClientConfig) -> DeliveryClient {
        if config.enabled {
            DeliveryClient::Live(LiveOrchestrator::new(config))
        } else {
            log::debug!(target: "delivery_client", "client disabled, using pass-through delivery");
            DeliveryClient::Noop(NoopOrchestrator::new(config))
        }
    }

    /// Rank the request's insertions, via the delivery service when the request qualifies.
    ///
    /// Always produces a result list unless the error handler rejects an error.
    pub async fn deliver(&self, delivery_request: DeliveryRequest) -> Result<ClientResponse> {
        match self {
            DeliveryClient::Live(orchestrator) => orchestrator.deliver(delivery_request).await,
            DeliveryClient::Noop(orchestrator) => orchestrator.deliver(delivery_request).await,
        }
    }

    /// Prepare a log record for insertions the caller already ranked, without calling the
    /// delivery service.
    pub async fn prepare_for_logging(
        &self,
        delivery_request: DeliveryRequest,
    ) -> Result<ClientResponse> {
        match self {
            DeliveryClient::Live(orchestrator) => {
                orchestrator.prepare_for_logging(delivery_request).await
            }
            DeliveryClient::Noop(orchestrator) => {
                orchestrator.prepare_for_logging(delivery_request).await
            }
        }
    }

    /// `true` unless the client was created from a disabled configuration.
    pub fn is_enabled(&self) -> bool {
        matches!(self, DeliveryClient::Live(_))
    }
}
