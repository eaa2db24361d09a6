//! Structural checks on delivery requests, run before any remote call.
use crate::{error::ValidationError, models::DeliveryRequest};

/// Check `delivery_request` and return the first problem found.
///
/// Checks run in this order:
/// 1. `Request.requestId` is unset.
/// 2. Each full insertion has no `requestId`, then no `insertionId` (first offender wins).
/// 3. Each full insertion has a non-empty `contentId`.
/// 4. The experiment override, if any, has no `platformId`, `userInfo`, or `timing`.
/// 5. `Request.userInfo` is set.
/// 6. `Request.paging.offset`, if paging is set, is not before `retrievalInsertionOffset`.
/// 7. `Request.insertion` is empty.
pub fn validate(delivery_request: &DeliveryRequest) -> Result<(), ValidationError> {
    let request = &delivery_request.request;

    if request.request_id.is_some() {
        return Err(ValidationError::RequestIdSet);
    }

    for insertion in &delivery_request.full_insertion {
        if insertion.request_id.is_some() {
            return Err(ValidationError::InsertionRequestIdSet {
                content_id: insertion.content_id.clone(),
            });
        }
        if insertion.insertion_id.is_some() {
            return Err(ValidationError::InsertionIdSet {
                content_id: insertion.content_id.clone(),
            });
        }
    }

    if let Some(index) = delivery_request
        .full_insertion
        .iter()
        .position(|insertion| insertion.content_id.is_empty())
    {
        return Err(ValidationError::ContentIdMissing { index });
    }

    if let Some(experiment) = &delivery_request.experiment {
        if experiment.platform_id.is_some() {
            return Err(ValidationError::ExperimentPlatformIdSet);
        }
        if experiment.user_info.is_some() {
            return Err(ValidationError::ExperimentUserInfoSet);
        }
        if experiment.timing.is_some() {
            return Err(ValidationError::ExperimentTimingSet);
        }
    }

    if request.user_info.is_none() {
        return Err(ValidationError::UserInfoMissing);
    }

    if let Some(paging) = &request.paging {
        let offset = paging.offset.unwrap_or(0);
        if offset < delivery_request.retrieval_insertion_offset {
            return Err(ValidationError::OffsetBeforeRetrievalOffset {
                offset,
                retrieval_insertion_offset: delivery_request.retrieval_insertion_offset,
            });
        }
    }

    if !request.insertion.is_empty() {
        return Err(ValidationError::RequestInsertionSet);
    }

    Ok(())
}
