use std::{
    collections::HashMap,
    env,
    net::SocketAddr,
    path::Path as FsPath,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::body::{to_bytes, Body};
use axum::{
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use config::Config;
use portico_errors::prelude::*;
use portico_proxy::prelude::{
    Body as ProxyBody, CapabilitiesConfig, CapabilityRegistry, Forwarder, ForwardRequest,
    ForwardResponse, ForwarderBuilder, PoolPolicy,
};
use portico_tasks::prelude::{
    builtin_registry, TaskBroker, TaskDispatcher, TaskId, TaskState, TasksConfig, WorkerPool,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Cap on relayed request bodies. Downstream payloads (chat transcripts,
/// page dumps) stay well under this.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = GatewayConfig::load()?;
    let state = AppState::new(config.clone()).await?;

    let (stop_tx, stop_rx) = watch::channel(false);
    if config.tasks.run_inline_worker() {
        let pool = state.build_worker_pool();
        let rx = stop_rx.clone();
        info!(queue = %config.tasks.queue, "starting inline worker pool");
        tokio::spawn(async move {
            if let Err(err) = pool.run(rx).await {
                error!("inline worker pool stopped: {err}");
            }
        });
    }
    drop(stop_rx);

    let routes = Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/metrics", get(metrics))
        .route("/routes", get(list_routes))
        .route("/v1/tasks", post(task_submit))
        .route("/v1/tasks/:id", get(task_poll))
        .route("/*path", any(dynamic_dispatch));

    let app = routes
        .with_state(state.clone())
        .layer(from_fn_with_state(state.clone(), metrics_middleware));

    let addr: SocketAddr = format!("{}:{}", config.server.address, config.server.port)
        .parse()
        .context("invalid server address/port")?;

    info!(%addr, "gateway listening");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server failure")?;

    let _ = stop_tx.send(true);
    Ok(())
}

fn init_tracing() {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .finish(),
    )
    .is_err()
    {
        // Subscriber already set by tests or external runtime.
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct GatewayConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    capabilities: CapabilitiesConfig,
    #[serde(default)]
    proxy: ProxyConfig,
    #[serde(default)]
    tasks: TasksConfig,
}

impl GatewayConfig {
    fn load() -> anyhow::Result<Self> {
        let config_file = env::var("GATEWAY_CONFIG_FILE")
            .unwrap_or_else(|_| "config/gateway.local.toml".to_string());

        let mut builder = Config::builder()
            .set_default("server.address", ServerConfig::default_address())?
            .set_default("server.port", ServerConfig::default_port())?;

        if FsPath::new(&config_file).exists() {
            builder = builder.add_source(config::File::from(FsPath::new(&config_file)));
        }

        builder = builder.add_source(config::Environment::with_prefix("GATEWAY").separator("__"));

        let config: GatewayConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ServerConfig {
    #[serde(default = "ServerConfig::default_address")]
    address: String,
    #[serde(default = "ServerConfig::default_port")]
    port: u16,
}

impl ServerConfig {
    fn default_address() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            port: Self::default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ProxyConfig {
    #[serde(default = "ProxyConfig::default_max_idle_per_host")]
    max_idle_per_host: usize,
    #[serde(default = "ProxyConfig::default_connect_timeout_ms")]
    connect_timeout_ms: u64,
}

impl ProxyConfig {
    fn default_max_idle_per_host() -> usize {
        32
    }

    fn default_connect_timeout_ms() -> u64 {
        10_000
    }

    fn pool_policy(&self) -> PoolPolicy {
        PoolPolicy {
            max_idle_per_host: self.max_idle_per_host,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            ..PoolPolicy::default()
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: Self::default_max_idle_per_host(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    config: Arc<GatewayConfig>,
    version: VersionInfo,
    capabilities: Arc<CapabilityRegistry>,
    forwarder: Arc<dyn Forwarder>,
    dispatcher: TaskDispatcher,
    broker: Arc<dyn TaskBroker>,
    results: Arc<dyn portico_tasks::prelude::ResultStore>,
    metrics: GatewayMetrics,
}

impl AppState {
    async fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let capabilities = Arc::new(
            config
                .capabilities
                .build_registry()
                .map_err(|err| anyhow::anyhow!("capability config: {err}"))?,
        );

        let forwarder: Arc<dyn Forwarder> = Arc::new(
            ForwarderBuilder::default()
                .with_policy(config.proxy.pool_policy())
                .build()
                .map_err(|err| anyhow::anyhow!("http client: {err}"))?,
        );

        let (broker, results) = config
            .tasks
            .build_backends()
            .await
            .map_err(|err| anyhow::anyhow!("task backends: {err}"))?;
        let dispatcher = TaskDispatcher::new(
            broker.clone(),
            results.clone(),
            config.tasks.queue.clone(),
            config.tasks.result_ttl_ms,
        );

        Ok(Self {
            config: Arc::new(config),
            version: VersionInfo::from_env(),
            capabilities,
            forwarder,
            dispatcher,
            broker,
            results,
            metrics: GatewayMetrics::default(),
        })
    }

    fn build_worker_pool(&self) -> WorkerPool {
        let registry = builtin_registry(self.forwarder.clone(), self.capabilities.clone());
        WorkerPool::new(
            self.broker.clone(),
            self.results.clone(),
            Arc::new(registry),
            self.config.tasks.worker_pool_config(),
        )
    }
}

#[derive(Clone)]
struct VersionInfo {
    version: String,
    commit: Option<String>,
}

impl VersionInfo {
    fn from_env() -> Self {
        Self {
            version: env::var("GATEWAY_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            commit: env::var("GIT_COMMIT_HASH").ok(),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
struct VersionResponse {
    version: String,
    commit: Option<String>,
}

async fn version(State(state): State<AppState>) -> impl IntoResponse {
    Json(VersionResponse {
        version: state.version.version.clone(),
        commit: state.version.commit.clone(),
    })
}

#[derive(Serialize)]
struct RouteInfo {
    name: String,
    route: String,
    method: String,
    upstream: String,
}

async fn list_routes(State(state): State<AppState>) -> impl IntoResponse {
    let routes: Vec<_> = state
        .capabilities
        .entries()
        .iter()
        .map(|entry| RouteInfo {
            name: entry.endpoint.name.clone(),
            route: entry.route.clone(),
            method: entry.endpoint.method.to_string(),
            upstream: entry.endpoint.base_url.to_string(),
        })
        .collect();
    Json(routes)
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.snapshot().await;
    Json(snapshot)
}

/// Relay handler for every configured capability route: select the
/// endpoint by path, pass the payload through, echo the downstream
/// answer. Only transport failures are translated.
async fn dynamic_dispatch(State(state): State<AppState>, req: Request<Body>) -> Response {
    let path = req.uri().path().to_string();
    let Some(endpoint) = state.capabilities.lookup_route(&path).cloned() else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "route_not_registered",
                "path": path,
            })),
        )
            .into_response();
    };

    if *req.method() != endpoint.method {
        let obj = ErrorBuilder::new(codes::SCHEMA_VALIDATION)
            .http_status(405)
            .user_msg("Method not allowed for this route.")
            .dev_msg(format!("route {path} expects {}", endpoint.method))
            .build();
        return error_response(obj);
    }

    let query = req.uri().query().map(ToString::to_string);
    let body_bytes = match to_bytes(req.into_body(), MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            let obj = ErrorBuilder::new(codes::SCHEMA_VALIDATION)
                .user_msg("Request body could not be read.")
                .dev_msg(format!("read body: {err}"))
                .build();
            return error_response(obj);
        }
    };
    let body = if body_bytes.is_empty() {
        ProxyBody::Empty
    } else {
        match serde_json::from_slice::<Value>(&body_bytes) {
            Ok(value) => ProxyBody::Json(value),
            Err(err) => {
                let obj = ErrorBuilder::new(codes::SCHEMA_VALIDATION)
                    .user_msg("Request body is not valid JSON.")
                    .dev_msg(format!("parse body: {err}"))
                    .build();
                return error_response(obj);
            }
        }
    };

    let request = ForwardRequest {
        method: None,
        path: None,
        query,
        body,
    };

    match state.forwarder.forward(&endpoint, request).await {
        Ok(response) => relay_response(response),
        Err(err) => {
            let obj = err.error_obj();
            warn!(
                capability = %endpoint.name,
                code = %obj.code,
                "relay failed: {}",
                obj.message_dev.as_deref().unwrap_or(&obj.message_user)
            );
            error_response(obj)
        }
    }
}

fn relay_response(response: ForwardResponse) -> Response {
    (response.status, Json(response.body)).into_response()
}

fn error_response(obj: ErrorObj) -> Response {
    let status =
        StatusCode::from_u16(obj.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(obj.to_public())).into_response()
}

#[derive(Deserialize)]
struct TaskSubmitPayload {
    operation: String,
    #[serde(default)]
    args: Value,
}

async fn task_submit(
    State(state): State<AppState>,
    Json(payload): Json<TaskSubmitPayload>,
) -> Response {
    if payload.operation.is_empty() {
        let obj = ErrorBuilder::new(codes::SCHEMA_VALIDATION)
            .user_msg("Task operation name is required.")
            .build();
        return error_response(obj);
    }

    match state
        .dispatcher
        .enqueue(&payload.operation, payload.args)
        .await
    {
        Ok(id) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "task_id": id,
                "status": "pending",
            })),
        )
            .into_response(),
        Err(err) => {
            let obj = err.into_inner();
            warn!(code = %obj.code, "task enqueue failed: {}",
                obj.message_dev.as_deref().unwrap_or(&obj.message_user));
            error_response(obj)
        }
    }
}

async fn task_poll(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = TaskId(id);
    match state.dispatcher.poll(&id).await {
        Ok(TaskState::Pending) => Json(json!({
            "task_id": id,
            "status": "pending",
        }))
        .into_response(),
        Ok(TaskState::Succeeded(result)) => Json(json!({
            "task_id": id,
            "status": "succeeded",
            "result": result,
        }))
        .into_response(),
        Ok(TaskState::Failed { code, message }) => Json(json!({
            "task_id": id,
            "status": "failed",
            "error": { "code": code, "message": message },
        }))
        .into_response(),
        Ok(TaskState::Unknown) => {
            let obj = ErrorBuilder::new(codes::TASK_UNKNOWN)
                .user_msg("Task is unknown or has expired.")
                .dev_msg(format!("no record for task {id}"))
                .build();
            error_response(obj)
        }
        Err(err) => error_response(err.into_inner()),
    }
}

async fn metrics_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status();
    state.metrics.record(&path, status, start.elapsed()).await;
    Ok(response)
}

#[derive(Clone, Default)]
struct GatewayMetrics {
    inner: Arc<tokio::sync::Mutex<MetricsInner>>,
}

#[derive(Default)]
struct MetricsInner {
    total_requests: u64,
    total_errors: u64,
    routes: HashMap<String, RouteStats>,
}

#[derive(Default)]
struct RouteStats {
    request_count: u64,
    error_count: u64,
    total_latency_ms: u64,
}

impl GatewayMetrics {
    async fn record(&self, route: &str, status: StatusCode, latency: Duration) {
        let mut inner = self.inner.lock().await;
        inner.total_requests += 1;
        if status.is_client_error() || status.is_server_error() {
            inner.total_errors += 1;
        }
        let stats = inner.routes.entry(route.to_string()).or_default();
        stats.request_count += 1;
        if status.is_client_error() || status.is_server_error() {
            stats.error_count += 1;
        }
        stats.total_latency_ms += latency.as_millis() as u64;
    }

    async fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().await;
        let routes = inner
            .routes
            .iter()
            .map(|(route, stats)| RouteMetrics {
                route: route.clone(),
                requests: stats.request_count,
                errors: stats.error_count,
                avg_latency_ms: if stats.request_count > 0 {
                    Some(stats.total_latency_ms as f64 / stats.request_count as f64)
                } else {
                    None
                },
            })
            .collect();
        MetricsSnapshot {
            total_requests: inner.total_requests,
            total_errors: inner.total_errors,
            routes,
        }
    }
}

#[derive(Serialize)]
struct MetricsSnapshot {
    total_requests: u64,
    total_errors: u64,
    routes: Vec<RouteMetrics>,
}

#[derive(Serialize)]
struct RouteMetrics {
    route: String,
    requests: u64,
    errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    avg_latency_ms: Option<f64>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
