//! Delivery classification against a local fake APNs gateway.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use islandpet::models::PetAttributes;
use islandpet::push::{ApnsClient, ApnsCredentials, DeliveryError};

const TEST_KEY: &str = include_str!("fixtures/AuthKey_TEST123456.p8");

fn test_client(base_url: &str, timeout: Duration) -> ApnsClient {
    let credentials = Arc::new(
        ApnsCredentials::from_pem("TEAM42", "TEST123456", TEST_KEY.as_bytes())
            .expect("Failed to load test key"),
    );
    ApnsClient::new(base_url, "com.example.islandpet", credentials, timeout)
        .expect("Failed to build client")
}

async fn spawn_gateway(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Gateway died");
    });
    format!("http://{}", addr)
}

fn canned(status: StatusCode, body: &'static str) -> Router {
    Router::new().route(
        "/3/device/{token}",
        post(move || async move { (status, body) }),
    )
}

const STATE: PetAttributes = PetAttributes {
    hunger: 42,
    happiness: 58,
};

#[tokio::test]
async fn a_200_response_is_a_successful_delivery() {
    let url = spawn_gateway(canned(StatusCode::OK, "")).await;
    let client = test_client(&url, Duration::from_secs(1));

    client.deliver("tok", &STATE).await.expect("Delivery failed");
}

#[tokio::test]
async fn sends_the_live_activity_request_shape() {
    let seen: Arc<Mutex<Option<(String, HeaderMap, serde_json::Value)>>> =
        Arc::new(Mutex::new(None));
    let recorder = seen.clone();

    let app = Router::new().route(
        "/3/device/{token}",
        post(
            move |Path(token): Path<String>, headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let recorder = recorder.clone();
                async move {
                    *recorder.lock().unwrap() = Some((token, headers, body));
                    StatusCode::OK
                }
            },
        ),
    );
    let url = spawn_gateway(app).await;
    let client = test_client(&url, Duration::from_secs(1));

    client
        .deliver("device-token-1", &STATE)
        .await
        .expect("Delivery failed");

    let (token, headers, body) = seen.lock().unwrap().take().expect("Gateway saw no request");
    assert_eq!(token, "device-token-1");
    assert_eq!(
        headers.get("apns-topic").unwrap(),
        "com.example.islandpet.push-type.liveactivity"
    );
    assert_eq!(headers.get("apns-push-type").unwrap(), "liveactivity");

    let auth = headers
        .get("authorization")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let assertion = auth.strip_prefix("Bearer ").expect("Not a bearer token");
    assert_eq!(assertion.split('.').count(), 3);

    assert_eq!(body["aps"]["event"], "update");
    assert!(body["aps"]["timestamp"].is_i64());
    assert_eq!(body["aps"]["content-state"]["hunger"], 42);
    assert_eq!(body["aps"]["content-state"]["happiness"], 58);
}

#[tokio::test]
async fn a_bad_device_token_is_permanently_invalid() {
    let url = spawn_gateway(canned(
        StatusCode::BAD_REQUEST,
        r#"{"reason":"BadDeviceToken"}"#,
    ))
    .await;
    let client = test_client(&url, Duration::from_secs(1));

    let err = client.deliver("tok", &STATE).await.unwrap_err();
    match err {
        DeliveryError::TokenInvalid { reason } => assert_eq!(reason, "BadDeviceToken"),
        other => panic!("Expected TokenInvalid, got {:?}", other),
    }
}

#[tokio::test]
async fn an_unregistered_token_is_permanently_invalid() {
    let url = spawn_gateway(canned(StatusCode::GONE, r#"{"reason":"Unregistered"}"#)).await;
    let client = test_client(&url, Duration::from_secs(1));

    let err = client.deliver("tok", &STATE).await.unwrap_err();
    assert!(matches!(err, DeliveryError::TokenInvalid { .. }));
}

#[tokio::test]
async fn an_expired_token_is_permanently_invalid() {
    let url = spawn_gateway(canned(
        StatusCode::BAD_REQUEST,
        r#"{"reason":"ExpiredToken"}"#,
    ))
    .await;
    let client = test_client(&url, Duration::from_secs(1));

    let err = client.deliver("tok", &STATE).await.unwrap_err();
    assert!(matches!(err, DeliveryError::TokenInvalid { .. }));
}

#[tokio::test]
async fn a_server_error_is_transient() {
    let url = spawn_gateway(canned(
        StatusCode::INTERNAL_SERVER_ERROR,
        r#"{"reason":"InternalServerError"}"#,
    ))
    .await;
    let client = test_client(&url, Duration::from_secs(1));

    let err = client.deliver("tok", &STATE).await.unwrap_err();
    match err {
        DeliveryError::Transient { status, body } => {
            assert_eq!(status, Some(500));
            assert!(body.contains("InternalServerError"));
        }
        other => panic!("Expected Transient, got {:?}", other),
    }
}

#[tokio::test]
async fn a_timed_out_delivery_is_transient() {
    let app = Router::new().route(
        "/3/device/{token}",
        post(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            StatusCode::OK
        }),
    );
    let url = spawn_gateway(app).await;
    let client = test_client(&url, Duration::from_millis(50));

    let err = client.deliver("tok", &STATE).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Transient { status: None, .. }));
}

#[tokio::test]
async fn an_unreachable_gateway_is_transient() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = test_client(&url, Duration::from_millis(250));

    let err = client.deliver("tok", &STATE).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Transient { .. }));
}
