use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Represents a result type for operations in the delivery client.
///
/// This is a standard Rust `Result` type where the error variant is the crate-specific [`Error`]
/// enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by injected remote API callbacks.
pub type ApiError = Box<dyn std::error::Error + Send + Sync>;

/// Enum representing possible errors that can occur in the delivery client.
///
/// Errors are cloneable so the same error can be handed to an
/// [`ErrorHandler`](crate::ErrorHandler) and returned to the caller.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Delivery request is malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Experiment configuration is malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A remote call did not complete within its time budget.
    #[error("{api} call timed out after {timeout_millis}ms")]
    Timeout {
        /// Remote API that timed out.
        api: RemoteApi,
        /// Time budget that was exceeded.
        timeout_millis: u64,
    },

    /// The injected remote API callback returned an error.
    #[error("{api} call failed: {source}")]
    RemoteCall {
        /// Remote API that failed.
        api: RemoteApi,
        /// Error reported by the callback. Wrapped in an `Arc` because boxed errors are not
        /// cloneable.
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    pub(crate) fn remote_call(api: RemoteApi, source: ApiError) -> Error {
        Error::RemoteCall {
            api,
            source: Arc::from(source),
        }
    }
}

/// Remote service a call was made to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteApi {
    /// The ranking service.
    Delivery,
    /// The logging service.
    Metrics,
}

impl std::fmt::Display for RemoteApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RemoteApi::Delivery => "delivery API",
            RemoteApi::Metrics => "metrics API",
        })
    }
}

/// Structural problems found in a delivery request before any remote call is made.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    /// Request ids are assigned by the client.
    #[error("Request.requestId should not be set")]
    RequestIdSet,

    /// Insertion request ids are assigned by the client.
    #[error("Insertion.requestId should not be set (contentId: {content_id:?})")]
    InsertionRequestIdSet {
        /// Content id of the offending insertion.
        content_id: String,
    },

    /// Insertion ids are assigned by the client.
    #[error("Insertion.insertionId should not be set (contentId: {content_id:?})")]
    InsertionIdSet {
        /// Content id of the offending insertion.
        content_id: String,
    },

    /// Every insertion needs a content id.
    #[error("Insertion.contentId should be set (index: {index})")]
    ContentIdMissing {
        /// Index of the offending insertion in the full insertion list.
        index: usize,
    },

    /// Experiment platform id is inherited from the request.
    #[error("Experiment.platformId should not be set")]
    ExperimentPlatformIdSet,

    /// Experiment user info is inherited from the request.
    #[error("Experiment.userInfo should not be set")]
    ExperimentUserInfoSet,

    /// Experiment timing is inherited from the request.
    #[error("Experiment.timing should not be set")]
    ExperimentTimingSet,

    /// Request identity is required.
    #[error("Request.userInfo should be set")]
    UserInfoMissing,

    /// Paging offset points before the first insertion the caller passed in.
    #[error(
        "Request.paging.offset ({offset}) should be >= retrievalInsertionOffset \
         ({retrieval_insertion_offset})"
    )]
    OffsetBeforeRetrievalOffset {
        /// Paging offset on the request.
        offset: i64,
        /// Offset of the first full insertion.
        retrieval_insertion_offset: i64,
    },

    /// Insertions must be passed as full insertions, beside the request.
    #[error("Request.insertion should not be set, use fullInsertion instead")]
    RequestInsertionSet,
}

/// Malformed experiment configuration. Raised at setup time.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Cohort id must be non-empty.
    #[error("cohortId should be set")]
    EmptyCohortId,

    /// More active control buckets than control buckets.
    #[error("numActiveControlBuckets ({active}) should be <= numControlBuckets ({total})")]
    ActiveControlBuckets {
        /// Configured active bucket count.
        active: u32,
        /// Configured bucket count.
        total: u32,
    },

    /// More active treatment buckets than treatment buckets.
    #[error("numActiveTreatmentBuckets ({active}) should be <= numTreatmentBuckets ({total})")]
    ActiveTreatmentBuckets {
        /// Configured active bucket count.
        active: u32,
        /// Configured bucket count.
        total: u32,
    },

    /// Bucket assignment needs at least one bucket.
    #[error("numControlBuckets + numTreatmentBuckets should be > 0")]
    NoBuckets,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_the_field() {
        let err = Error::from(ValidationError::RequestIdSet);
        assert_eq!(err.to_string(), "Request.requestId should not be set");
    }

    #[test]
    fn remote_call_error_keeps_source() {
        let err = Error::remote_call(RemoteApi::Delivery, "connection reset".into());
        assert_eq!(
            err.to_string(),
            "delivery API call failed: connection reset"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn timeout_error_reports_budget() {
        let err = Error::Timeout {
            api: RemoteApi::Metrics,
            timeout_millis: 3000,
        };
        assert_eq!(err.to_string(), "metrics API call timed out after 3000ms");
    }
}
