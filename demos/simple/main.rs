use std::sync::atomic::{AtomicU64, Ordering};

use delivery_client::{
    ApiError, ClientConfig, DeliveryRequest, ExperimentConfig, Insertion, LogErrors, LogRequest,
    LogResponse, Request, Response, UserInfo,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> delivery_client::Result<()> {
    // Configure env_logger to see SDK logs.
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("delivery_client"))
        .init();

    let counter = AtomicU64::new(0);
    let client = ClientConfig::new(
        // Stand-in for an HTTP call to the delivery service: ranks insertions in reverse.
        |request: Request| async move {
            let mut insertion = request.insertion;
            insertion.reverse();
            Ok::<_, ApiError>(Response {
                request_id: Some("server-request".to_owned()),
                insertion,
            })
        },
        |log_request: LogRequest| async move {
            println!("Logging: {}", serde_json::to_string(&log_request).unwrap_or_default());
            Ok::<_, ApiError>(LogResponse::default())
        },
        move || format!("id-{}", counter.fetch_add(1, Ordering::Relaxed)),
        LogErrors,
    )
    .with_experiment(ExperimentConfig::two_arm_5050("HOLD_OUT", 50, 50).prepare()?)
    .to_client();

    let response = client
        .deliver(DeliveryRequest {
            request: Request {
                user_info: Some(UserInfo::with_log_user_id("test-user")),
                ..Request::default()
            },
            full_insertion: vec![
                Insertion::new("product-1"),
                Insertion::new("product-2"),
                Insertion::new("product-3"),
            ],
            ..DeliveryRequest::default()
        })
        .await?;

    println!(
        "Ranked by {:?}: {:?}",
        response.execution_server,
        response
            .response_insertions
            .iter()
            .map(|insertion| insertion.content_id.as_str())
            .collect::<Vec<_>>()
    );

    // Send the log once the response has been used.
    response.log().await
}
