//! Remote services the client talks to.
//!
//! The client never chooses a transport. Users provide a [`DeliveryApi`] and a [`MetricsApi`],
//! usually as async closures wrapping their HTTP client of choice:
//!
//! ```
//! # use delivery_client::{ApiError, DeliveryApi, Request, Response};
//! let delivery = |request: Request| async move {
//!     // Send `request` to the delivery service here.
//!     Ok::<_, ApiError>(Response::default())
//! };
//! # fn check(_: impl DeliveryApi) {}
//! # check(delivery);
//! ```
use std::{future::Future, pin::Pin};

use crate::{
    error::ApiError,
    models::{LogRequest, LogResponse, Request, Response},
};

/// A boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The ranking service.
pub trait DeliveryApi: Send + Sync {
    /// Rank `request.insertion`.
    fn deliver(&self, request: Request) -> BoxFuture<'static, Result<Response, ApiError>>;
}

impl<F, Fut> DeliveryApi for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, ApiError>> + Send + 'static,
{
    fn deliver(&self, request: Request) -> BoxFuture<'static, Result<Response, ApiError>> {
        Box::pin(self(request))
    }
}

/// The logging service.
pub trait MetricsApi: Send + Sync {
    /// Record what was shown to the user.
    fn log(&self, log_request: LogRequest) -> BoxFuture<'static, Result<LogResponse, ApiError>>;
}

impl<F, Fut> MetricsApi for F
where
    F: Fn(LogRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<LogResponse, ApiError>> + Send + 'static,
{
    fn log(&self, log_request: LogRequest) -> BoxFuture<'static, Result<LogResponse, ApiError>> {
        Box::pin(self(log_request))
    }
}
