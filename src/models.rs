//! Request, response, and log record types exchanged with the delivery and metrics services.
use derive_more::{From, Into};
use serde::{Deserialize, Serialize};

/// Opaque properties payload attached to a request or an insertion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct Properties(pub serde_json::Value);

/// Identity of the user a request is made for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Platform user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Anonymized user id used for logging and experiment assignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_user_id: Option<String>,
}

impl UserInfo {
    /// Create user info with only `log_user_id` set.
    pub fn with_log_user_id(log_user_id: impl Into<String>) -> UserInfo {
        UserInfo {
            user_id: None,
            log_user_id: Some(log_user_id.into()),
        }
    }
}

/// Client-side timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    /// Milliseconds since the Unix epoch. Filled in by the client when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_log_timestamp: Option<i64>,
}

/// Kind of client sending the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientType {
    /// A server integrating this SDK.
    PlatformServer,
    /// A client application.
    PlatformClient,
}

/// Whether traffic is real user traffic or mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrafficType {
    /// Real user traffic.
    Production,
    /// Mirrored traffic, not shown to users.
    Shadow,
}

/// Client metadata sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Defaults to [`ClientType::PlatformServer`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_type: Option<ClientType>,
    /// Defaults to [`TrafficType::Production`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_type: Option<TrafficType>,
}

impl ClientInfo {
    pub(crate) fn fill_defaults(&mut self) {
        self.client_type.get_or_insert(ClientType::PlatformServer);
        self.traffic_type.get_or_insert(TrafficType::Production);
    }
}

/// Windowing hints for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    /// Position of the first item of the page. Negative values are treated as `0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    /// Page size. Non-positive values mean "no limit".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

/// One content item as represented to the delivery and metrics services.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insertion {
    /// Stable external identifier of the content.
    pub content_id: String,
    /// Assigned by the client. Must be absent on input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insertion_id: Option<String>,
    /// Back-reference to the request. Must be absent on input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// 0-based rank. Assigned during paging when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    /// Opaque payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
}

impl Insertion {
    /// Create an insertion with only `content_id` set.
    pub fn new(content_id: impl Into<String>) -> Insertion {
        Insertion {
            content_id: content_id.into(),
            ..Insertion::default()
        }
    }
}

/// A delivery request as sent to the delivery service and logged to the metrics service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<ClientInfo>,
    /// Assigned by the client exactly once. Must be absent on input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Client-side id shared by the delivery call and its log record. Assigned when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_case: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    /// Maximum number of insertions to return. Used when `paging.size` is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
    /// Filled by the client from the full insertions. Must be empty on input.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insertion: Vec<Insertion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
}

/// Delivery service response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Ranked insertions, usually compacted.
    #[serde(default)]
    pub insertion: Vec<Insertion>,
}

/// Experiment arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CohortArm {
    Control,
    Treatment,
}

/// Experiment arm a user was assigned to for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortMembership {
    /// Inherited from the request when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<i64>,
    /// Inherited from the request when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
    /// Inherited from the request when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    pub cohort_id: String,
    pub arm: CohortArm,
}

impl CohortMembership {
    /// Create a membership record with no inherited fields set.
    pub fn new(cohort_id: impl Into<String>, arm: CohortArm) -> CohortMembership {
        CohortMembership {
            platform_id: None,
            user_info: None,
            timing: None,
            cohort_id: cohort_id.into(),
            arm,
        }
    }
}

/// Record sent to the metrics service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<ClientInfo>,
    /// Empty when the delivery service was called, as it logs the request itself.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request: Vec<Request>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cohort_membership: Vec<CohortMembership>,
}

/// Metrics service response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogResponse {}

/// How the full insertions relate to the requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsertionPageType {
    /// Insertions cover every position; the page is cut out at `paging.offset`.
    #[default]
    Unpaged,
    /// Insertions are already the requested page.
    PrePaged,
}

/// Which side produced the returned ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionServer {
    /// The delivery service ranked the insertions.
    Api,
    /// The client fell back to the caller's ordering.
    Sdk,
}

/// Input to [`DeliveryClient::deliver`](crate::DeliveryClient::deliver).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeliveryRequest {
    /// Request metadata. `insertion` must be empty; pass insertions in `full_insertion`.
    pub request: Request,
    /// Every candidate insertion with full details.
    pub full_insertion: Vec<Insertion>,
    /// Caller-computed experiment membership. Takes precedence over the configured experiment.
    pub experiment: Option<CohortMembership>,
    /// Skip the delivery service and only log.
    pub only_log: bool,
    pub insertion_page_type: InsertionPageType,
    /// Position of `full_insertion[0]` in the complete result list.
    pub retrieval_insertion_offset: i64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_camel_case_and_skips_unset_fields() {
        let insertion = Insertion {
            content_id: "c1".to_owned(),
            position: Some(3),
            properties: Some(json!({"price": 10}).into()),
            ..Insertion::default()
        };
        assert_eq!(
            serde_json::to_value(&insertion).unwrap(),
            json!({"contentId": "c1", "position": 3, "properties": {"price": 10}})
        );
    }

    #[test]
    fn parses_delivery_response() {
        let response: Response = serde_json::from_str(
            r#"
              {
                "requestId": "r1",
                "insertion": [
                  {"contentId": "a", "insertionId": "i1", "position": 0},
                  {"contentId": "b", "insertionId": "i2", "position": 1}
                ]
              }
            "#,
        )
        .unwrap();
        assert_eq!(response.request_id.as_deref(), Some("r1"));
        assert_eq!(response.insertion.len(), 2);
        assert_eq!(response.insertion[1].content_id, "b");
    }

    #[test]
    fn cohort_arm_uses_screaming_case() {
        let membership = CohortMembership::new("HOLD_OUT", CohortArm::Treatment);
        assert_eq!(
            serde_json::to_value(&membership).unwrap(),
            json!({"cohortId": "HOLD_OUT", "arm": "TREATMENT"})
        );
    }

    #[test]
    fn client_info_defaults_do_not_override() {
        let mut info = ClientInfo {
            client_type: None,
            traffic_type: Some(TrafficType::Shadow),
        };
        info.fill_defaults();
        assert_eq!(info.client_type, Some(ClientType::PlatformServer));
        assert_eq!(info.traffic_type, Some(TrafficType::Shadow));
    }
}
