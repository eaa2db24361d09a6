//! A client SDK core for a content ranking ("delivery") service and a logging ("metrics") service.
//!
//! # Overview
//!
//! The SDK revolves around a [`DeliveryClient`] that takes a [`DeliveryRequest`] (the caller's
//! candidate insertions plus request metadata) and decides whether to ask the delivery service to
//! rank them or to fall back to the caller's own ordering. The decision can run inside a
//! deterministic two-arm experiment ([`TwoArmExperiment`]). Every remote call is bounded by a
//! timeout.
//!
//! The result is a [`ClientResponse`] carrying the insertions to show and a [`DeferredLog`]. The
//! caller sends the log after it has used the insertions, so logging never blocks the response
//! path.
//!
//! Transports are not part of the SDK: the delivery and metrics services are injected as async
//! callbacks ([`DeliveryApi`], [`MetricsApi`]), together with an [`IdGenerator`] and an
//! [`ErrorHandler`].
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum. Validation and remote-call errors are passed to
//! the configured [`ErrorHandler`], which decides whether they are fatal. [`LogErrors`] logs and
//! continues, serving the caller's ordering when the delivery service fails; [`RethrowErrors`]
//! returns every error to the caller.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate with target
//! `delivery_client`. Consider integrating a `log`-compatible logger implementation for better
//! visibility into SDK operations.

#![warn(rustdoc::missing_crate_level_docs)]

mod api;
mod client;
mod clock;
mod config;
mod error;
mod error_handler;
mod id_generator;
mod models;
mod orchestrator;
mod response;

pub mod experiment;
pub mod hash;
pub mod pager;
pub mod retry;
pub mod timeout;
pub mod validator;

pub use api::{BoxFuture, DeliveryApi, MetricsApi};
pub use client::DeliveryClient;
pub use clock::{Clock, SystemClock};
pub use config::{ClientConfig, InsertionCompactor, TreatmentPredicate};
pub use error::{ApiError, ConfigError, Error, RemoteApi, Result, ValidationError};
pub use error_handler::{ErrorHandler, LogErrors, RethrowErrors};
pub use experiment::{ExperimentConfig, TwoArmExperiment};
pub use id_generator::IdGenerator;
pub use models::{
    ClientInfo, ClientType, CohortArm, CohortMembership, DeliveryRequest, ExecutionServer,
    Insertion, InsertionPageType, LogRequest, LogResponse, Paging, Properties, Request, Response,
    Timing, TrafficType, UserInfo,
};
pub use orchestrator::{LiveOrchestrator, NoopOrchestrator};
pub use response::{ClientResponse, DeferredLog};
