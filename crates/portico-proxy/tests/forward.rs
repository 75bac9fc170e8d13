use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use http::Method;
use portico_proxy::prelude::*;
use serde_json::{json, Value};
use url::Url;

async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("upstream addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve upstream");
    });
    addr
}

fn endpoint_at(addr: SocketAddr, path: &str, method: Method, timeout: Duration) -> CapabilityEndpoint {
    CapabilityEndpoint {
        name: "chat".into(),
        base_url: Url::parse(&format!("http://{addr}")).expect("base url"),
        upstream_path: path.into(),
        method,
        timeout,
    }
}

fn forwarder() -> ReqwestForwarder {
    ForwarderBuilder::default().build().expect("build forwarder")
}

async fn echo_completions(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "choices": [{ "message": { "content": "ok" } }],
        "echo": body,
    }))
}

#[tokio::test]
async fn relays_success_status_and_body_verbatim() {
    let addr = spawn_upstream(Router::new().route(
        "/v1/chat/completions",
        post(echo_completions),
    ))
    .await;
    let endpoint = endpoint_at(
        addr,
        "/v1/chat/completions",
        Method::POST,
        Duration::from_secs(5),
    );

    let payload = json!({ "model": "x", "messages": [{ "role": "user", "content": "hi" }] });
    let response = forwarder()
        .forward(&endpoint, ForwardRequest::json(payload.clone()))
        .await
        .expect("forward ok");

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["echo"], payload);
    assert_eq!(response.body["choices"][0]["message"]["content"], "ok");
}

#[tokio::test]
async fn relays_downstream_error_status_as_success() {
    async fn reject() -> (StatusCode, Json<Value>) {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": "model not loaded" })),
        )
    }
    let addr = spawn_upstream(Router::new().route("/v1/chat/completions", post(reject))).await;
    let endpoint = endpoint_at(
        addr,
        "/v1/chat/completions",
        Method::POST,
        Duration::from_secs(5),
    );

    let response = forwarder()
        .forward(&endpoint, ForwardRequest::json(json!({})))
        .await
        .expect("4xx relays as success");
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["detail"], "model not loaded");
}

#[tokio::test]
async fn query_passthrough_for_get_capabilities() {
    #[derive(serde::Deserialize)]
    struct TitleParams {
        url: String,
    }
    async fn title(Query(params): Query<TitleParams>) -> Json<Value> {
        Json(json!({ "title": format!("page at {}", params.url) }))
    }
    let addr = spawn_upstream(Router::new().route("/title", get(title))).await;
    let mut endpoint = endpoint_at(addr, "/title", Method::GET, Duration::from_secs(5));
    endpoint.name = "browser_title".into();

    let response = forwarder()
        .forward(&endpoint, ForwardRequest::query("url=https://example.com"))
        .await
        .expect("forward ok");
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["title"], "page at https://example.com");
}

#[tokio::test]
async fn unreachable_upstream_is_a_typed_failure() {
    // Bind then drop to get a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let endpoint = endpoint_at(
        addr,
        "/v1/chat/completions",
        Method::POST,
        Duration::from_secs(5),
    );
    let start = Instant::now();
    let err = forwarder()
        .forward(&endpoint, ForwardRequest::json(json!({})))
        .await
        .expect_err("nothing is listening");
    assert!(matches!(err, ProxyError::Unreachable { .. }), "got {err}");
    assert!(start.elapsed() < Duration::from_secs(5), "no retry loop");
    assert_eq!(err.error_obj().code.id, "NET.UPSTREAM_UNREACHABLE");
}

#[tokio::test]
async fn slow_upstream_times_out_at_the_configured_bound() {
    async fn stall() -> Json<Value> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Json(json!({}))
    }
    let addr = spawn_upstream(Router::new().route("/v1/chat/completions", post(stall))).await;
    let endpoint = endpoint_at(
        addr,
        "/v1/chat/completions",
        Method::POST,
        Duration::from_millis(500),
    );

    let start = Instant::now();
    let err = forwarder()
        .forward(&endpoint, ForwardRequest::json(json!({})))
        .await
        .expect_err("must time out");
    let elapsed = start.elapsed();
    assert!(matches!(err, ProxyError::Timeout { .. }), "got {err}");
    assert!(elapsed >= Duration::from_millis(400), "fired too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "fired too late: {elapsed:?}");
    assert_eq!(err.error_obj().code.id, "NET.UPSTREAM_TIMEOUT");
}

#[tokio::test]
async fn non_json_upstream_body_is_malformed() {
    async fn plain() -> &'static str {
        "upstream speaks html, not json"
    }
    let addr = spawn_upstream(Router::new().route("/v1/chat/completions", post(plain))).await;
    let endpoint = endpoint_at(
        addr,
        "/v1/chat/completions",
        Method::POST,
        Duration::from_secs(5),
    );

    let err = forwarder()
        .forward(&endpoint, ForwardRequest::json(json!({})))
        .await
        .expect_err("body is not json");
    assert!(matches!(err, ProxyError::MalformedUpstreamBody { .. }), "got {err}");
    assert_eq!(err.error_obj().code.id, "NET.UPSTREAM_MALFORMED");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_forwards_do_not_serialize() {
    async fn slow() -> Json<Value> {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Json(json!({ "speed": "slow" }))
    }
    async fn fast() -> Json<Value> {
        Json(json!({ "speed": "fast" }))
    }
    let slow_addr = spawn_upstream(Router::new().route("/v1/chat/completions", post(slow))).await;
    let fast_addr = spawn_upstream(Router::new().route("/ocr", post(fast))).await;

    let slow_endpoint = endpoint_at(
        slow_addr,
        "/v1/chat/completions",
        Method::POST,
        Duration::from_secs(10),
    );
    let mut fast_endpoint = endpoint_at(fast_addr, "/ocr", Method::POST, Duration::from_secs(10));
    fast_endpoint.name = "ocr".into();

    let client = forwarder();
    let slow_call = client.forward(&slow_endpoint, ForwardRequest::json(json!({})));
    let fast_call = async {
        let start = Instant::now();
        let response = client
            .forward(&fast_endpoint, ForwardRequest::json(json!({})))
            .await
            .expect("fast forward");
        (response, start.elapsed())
    };

    let (slow_result, (fast_response, fast_latency)) = tokio::join!(slow_call, fast_call);
    assert_eq!(fast_response.body["speed"], "fast");
    assert!(
        fast_latency < Duration::from_millis(500),
        "fast call waited on slow call: {fast_latency:?}"
    );
    assert_eq!(slow_result.expect("slow forward").body["speed"], "slow");
}
