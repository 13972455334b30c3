mod support;

use axum::{
    extract::Query,
    http::{header::HOST, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use sop_probe::{
    api::ApiClient,
    config::{ApiConfig, TlsVerification},
    error::ProbeError,
};
use std::{collections::HashMap, time::Duration};
use support::{closed_port, StubServer};

const PATH: &str = "/FPORTAL/GoodsOut/GetAssetInfoWithParams?sn={sn}";

fn api_config(port: u16, host_header: Option<&str>) -> ApiConfig {
    ApiConfig {
        host: "127.0.0.1".to_string(),
        port,
        path_template: PATH.to_string(),
        timeout: Duration::from_secs(5),
        use_system_proxy: false,
        host_header: host_header.map(str::to_string),
        verification: TlsVerification::Disabled,
    }
}

async fn asset_info(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "result": [
            {
                "TABLES": "WIP STATUS",
                "SN": query.get("sn"),
                "MODEL_NAME": "ModelX",
                "WIP_GROUP": "PACK"
            }
        ]
    }))
}

#[tokio::test]
async fn falls_through_to_plain_http() {
    let server = StubServer::spawn(
        Router::new().route("/FPORTAL/GoodsOut/GetAssetInfoWithParams", get(asset_info)),
    )
    .await;
    let client = ApiClient::new(api_config(server.addr.port(), None)).expect("client builds");

    let payload = client.fetch("ABC123").await.expect("http candidate succeeds");

    assert_eq!(payload["status"], "OK");
    assert_eq!(payload["result"][0]["SN"], "ABC123");
    assert_eq!(payload["result"][0]["MODEL_NAME"], "ModelX");
}

#[tokio::test]
async fn non_json_body_is_wrapped_with_status() {
    let server = StubServer::spawn(Router::new().route(
        "/FPORTAL/GoodsOut/GetAssetInfoWithParams",
        get(|| async { "maintenance window" }),
    ))
    .await;
    let client = ApiClient::new(api_config(server.addr.port(), None)).expect("client builds");

    let payload = client.fetch("ABC123").await.expect("text body still succeeds");

    assert_eq!(payload, json!({"status": 200, "text": "maintenance window"}));
}

#[tokio::test]
async fn host_header_is_sent_on_every_attempt() {
    let server = StubServer::spawn(Router::new().route(
        "/FPORTAL/GoodsOut/GetAssetInfoWithParams",
        get(|headers: HeaderMap| async move {
            let host = headers
                .get(HOST)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            Json(json!({ "host": host }))
        }),
    ))
    .await;
    let client = ApiClient::new(api_config(server.addr.port(), Some("assets.corp.local")))
        .expect("client builds");

    let payload = client.fetch("ABC123").await.expect("request succeeds");

    assert_eq!(payload["host"], "assets.corp.local");
}

#[tokio::test]
async fn error_status_counts_as_a_failed_attempt() {
    let server = StubServer::spawn(Router::new().route(
        "/FPORTAL/GoodsOut/GetAssetInfoWithParams",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    ))
    .await;
    let port = server.addr.port();
    let client = ApiClient::new(api_config(port, None)).expect("client builds");

    let err = client.fetch("ABC123").await.expect_err("500 must not succeed");

    let failure = match err {
        ProbeError::TransportExhausted(failure) => failure,
        other => panic!("expected transport failure, got {other:?}"),
    };
    assert!(failure.last_error.starts_with(&format!("http://127.0.0.1:{port}/")));
    assert!(failure.last_error.contains("500"));
}

#[tokio::test]
async fn exhausted_candidates_report_every_url() {
    let port = closed_port().await;
    let client = ApiClient::new(api_config(port, None)).expect("client builds");

    let err = client.fetch("SN-9").await.expect_err("nothing is listening");

    let failure = match err {
        ProbeError::TransportExhausted(failure) => failure,
        other => panic!("expected transport failure, got {other:?}"),
    };
    let suffix = "/FPORTAL/GoodsOut/GetAssetInfoWithParams?sn=SN-9";
    assert_eq!(
        failure.attempted,
        vec![
            format!("https://127.0.0.1{suffix}"),
            format!("https://127.0.0.1:{port}{suffix}"),
            format!("http://127.0.0.1:{port}{suffix}"),
        ]
    );
    assert!(failure.last_error.starts_with(&format!("http://127.0.0.1:{port}")));
    assert!(failure.settings.contains(&format!("port={port}")));
    assert!(failure.settings.contains("verify=off"));
}

#[tokio::test]
async fn missing_placeholder_fails_before_any_request() {
    let mut config = api_config(closed_port().await, None);
    config.path_template = "/assets".to_string();
    let client = ApiClient::new(config).expect("client builds");

    let err = client.fetch("ABC123").await.expect_err("template is invalid");

    assert!(matches!(err, ProbeError::Config(_)));
}
