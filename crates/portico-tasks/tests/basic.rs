use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use portico_proxy::prelude::*;
use portico_tasks::prelude::*;
use serde_json::{json, Value};
use tokio::sync::watch;
use url::Url;

fn memory_dispatcher() -> (TaskDispatcher, Arc<InMemoryBroker>, Arc<InMemoryResultStore>) {
    let broker = Arc::new(InMemoryBroker::default());
    let results = Arc::new(InMemoryResultStore::default());
    let dispatcher = TaskDispatcher::new(broker.clone(), results.clone(), "test.queue", 60_000);
    (dispatcher, broker, results)
}

#[tokio::test]
async fn enqueue_then_poll_is_pending_without_workers() {
    let (dispatcher, _, _) = memory_dispatcher();
    let id = dispatcher.enqueue("ping", Value::Null).await.unwrap();
    assert_eq!(dispatcher.poll(&id).await.unwrap(), TaskState::Pending);
}

#[tokio::test]
async fn polling_an_unissued_id_is_unknown() {
    let (dispatcher, _, _) = memory_dispatcher();
    let ghost = TaskId::new_random();
    assert_eq!(dispatcher.poll(&ghost).await.unwrap(), TaskState::Unknown);
}

#[tokio::test]
async fn broker_delivers_in_fifo_order_and_acks_settle() {
    let broker = InMemoryBroker::default();
    let first = TaskEnvelope::new("ping", json!(1));
    let second = TaskEnvelope::new("ping", json!(2));
    broker.publish("q", &first).await.unwrap();
    broker.publish("q", &second).await.unwrap();

    let delivery = broker.pull("q", "w1", 60_000).await.unwrap().unwrap();
    assert_eq!(delivery.task.id, first.id);
    assert_eq!(delivery.task.attempts, 1);
    broker.ack("q", &delivery).await.unwrap();

    let delivery = broker.pull("q", "w1", 60_000).await.unwrap().unwrap();
    assert_eq!(delivery.task.id, second.id);
    broker.ack("q", &delivery).await.unwrap();

    assert!(broker.pull("q", "w1", 60_000).await.unwrap().is_none());
}

#[tokio::test]
async fn expired_lease_redelivers_the_envelope() {
    let broker = InMemoryBroker::default();
    let task = TaskEnvelope::new("ping", Value::Null);
    broker.publish("q", &task).await.unwrap();

    let delivery = broker.pull("q", "w1", 50).await.unwrap().unwrap();
    assert_eq!(delivery.task.attempts, 1);
    // Never acked; lease lapses.
    tokio::time::sleep(Duration::from_millis(80)).await;

    let redelivered = broker.pull("q", "w2", 60_000).await.unwrap().unwrap();
    assert_eq!(redelivered.task.id, task.id);
    assert_eq!(redelivered.task.attempts, 2);
    broker.ack("q", &redelivered).await.unwrap();
}

#[tokio::test]
async fn recover_requeues_in_flight_deliveries() {
    let broker = InMemoryBroker::default();
    let task = TaskEnvelope::new("ping", Value::Null);
    broker.publish("q", &task).await.unwrap();
    let _abandoned = broker.pull("q", "w1", 60_000).await.unwrap().unwrap();

    assert_eq!(broker.recover("q").await.unwrap(), 1);
    let delivery = broker.pull("q", "w2", 60_000).await.unwrap().unwrap();
    assert_eq!(delivery.task.id, task.id);
}

#[tokio::test]
async fn result_records_expire_after_ttl() {
    let results = InMemoryResultStore::default();
    let id = TaskId::new_random();
    results
        .put(TaskRecord::pending(id.clone()), 20)
        .await
        .unwrap();
    assert!(results.get(&id).await.unwrap().is_some());
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(results.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_operation_fails_with_stable_code() {
    let registry = OperationRegistry::default();
    let err = registry.dispatch("no.such.op", Value::Null).await.unwrap_err();
    assert_eq!(err.into_inner().code.id, "TASK.OP_UNKNOWN");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_pool_round_trip_with_ping() {
    let (dispatcher, broker, results) = memory_dispatcher();

    let mut registry = OperationRegistry::default();
    registry.register("ping", Arc::new(PingOp));

    let pool = WorkerPool::new(
        broker,
        results,
        Arc::new(registry),
        WorkerPoolConfig {
            queue: "test.queue".into(),
            workers: 2,
            poll_interval: Duration::from_millis(10),
            ..WorkerPoolConfig::default()
        },
    );
    let (stop_tx, stop_rx) = watch::channel(false);
    let pool_handle = tokio::spawn(async move { pool.run(stop_rx).await });

    let id = dispatcher.enqueue("ping", Value::Null).await.unwrap();

    let mut state = TaskState::Pending;
    for _ in 0..100 {
        state = dispatcher.poll(&id).await.unwrap();
        if state != TaskState::Pending {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state, TaskState::Succeeded(json!("pong")));

    stop_tx.send(true).unwrap();
    pool_handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_operation_reports_failed_state() {
    let (dispatcher, broker, results) = memory_dispatcher();
    // Registry without the requested operation: task must fail, worker
    // must survive.
    let pool = WorkerPool::new(
        broker,
        results,
        Arc::new(OperationRegistry::default()),
        WorkerPoolConfig {
            queue: "test.queue".into(),
            workers: 1,
            poll_interval: Duration::from_millis(10),
            ..WorkerPoolConfig::default()
        },
    );
    let (stop_tx, stop_rx) = watch::channel(false);
    let pool_handle = tokio::spawn(async move { pool.run(stop_rx).await });

    let id = dispatcher.enqueue("no.such.op", Value::Null).await.unwrap();

    let mut state = TaskState::Pending;
    for _ in 0..100 {
        state = dispatcher.poll(&id).await.unwrap();
        if state != TaskState::Pending {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    match state {
        TaskState::Failed { code, .. } => assert_eq!(code, "TASK.OP_UNKNOWN"),
        other => panic!("expected failed state, got {other:?}"),
    }

    stop_tx.send(true).unwrap();
    pool_handle.await.unwrap().unwrap();
}

struct CannedForwarder {
    status: u16,
}

#[async_trait]
impl Forwarder for CannedForwarder {
    async fn forward(
        &self,
        endpoint: &CapabilityEndpoint,
        request: ForwardRequest,
    ) -> Result<ForwardResponse, ProxyError> {
        let body = match request.body {
            Body::Json(value) => value,
            _ => Value::Null,
        };
        Ok(ForwardResponse {
            status: http::StatusCode::from_u16(self.status).unwrap(),
            body: json!({
                "capability": endpoint.name,
                "query": request.query,
                "payload": body,
            }),
            elapsed: Duration::from_millis(1),
        })
    }
}

fn single_capability_registry() -> Arc<CapabilityRegistry> {
    let endpoint = CapabilityEndpoint {
        name: "browser_title".into(),
        base_url: Url::parse("http://127.0.0.1:8200").unwrap(),
        upstream_path: "/title".into(),
        method: http::Method::GET,
        timeout: Duration::from_secs(60),
    };
    Arc::new(CapabilityRegistry::new(vec![RegisteredCapability {
        route: "/v1/browser/title".into(),
        endpoint: Arc::new(endpoint),
    }]))
}

#[tokio::test]
async fn capability_invoke_forwards_and_records_the_relay() {
    let op = CapabilityInvokeOp::new(
        Arc::new(CannedForwarder { status: 200 }),
        single_capability_registry(),
    );
    let result = op
        .run(json!({
            "capability": "browser_title",
            "query": "url=https://example.com",
        }))
        .await
        .unwrap();
    assert_eq!(result["status"], 200);
    assert_eq!(result["body"]["capability"], "browser_title");
    assert_eq!(result["body"]["query"], "url=https://example.com");
}

#[tokio::test]
async fn capability_invoke_rejects_unknown_capability() {
    let op = CapabilityInvokeOp::new(
        Arc::new(CannedForwarder { status: 200 }),
        single_capability_registry(),
    );
    let err = op
        .run(json!({ "capability": "no-such-backend" }))
        .await
        .unwrap_err();
    assert_eq!(err.into_inner().code.id, "SCHEMA.VALIDATION");
}
