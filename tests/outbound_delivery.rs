mod common;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trumpet::config::{Options, ToastOptions};
use trumpet::outbound;
use trumpet::render::{NtfyToastSink, WebhookCallback};
use trumpet::retry::RetryConfig;
use trumpet::{Pipeline, RawBatch};

use common::{spawn_server, wait_until};

/// Collects POSTed bodies, failing the first `failures` requests with 503
#[derive(Default)]
struct Receiver {
    failures: Mutex<usize>,
    bodies: Mutex<Vec<(String, Value, Option<String>)>>,
}

impl Receiver {
    fn bodies(&self) -> Vec<(String, Value, Option<String>)> {
        self.bodies.lock().unwrap().clone()
    }
}

async fn record(
    route: &'static str,
    receiver: Arc<Receiver>,
    headers: HeaderMap,
    body: Value,
) -> StatusCode {
    {
        let mut failures = receiver.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return StatusCode::SERVICE_UNAVAILABLE;
        }
    }
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    receiver
        .bodies
        .lock()
        .unwrap()
        .push((route.to_string(), body, auth));
    StatusCode::OK
}

async fn serve(receiver: Arc<Receiver>) -> String {
    let app = Router::new()
        .route(
            "/hook",
            post(|State(r): State<Arc<Receiver>>, headers: HeaderMap, Json(body): Json<Value>| {
                record("hook", r, headers, body)
            }),
        )
        .route(
            "/",
            post(|State(r): State<Arc<Receiver>>, headers: HeaderMap, Json(body): Json<Value>| {
                record("toast", r, headers, body)
            }),
        )
        .with_state(receiver);
    format!("http://{}", spawn_server(app).await)
}

fn batch(value: Value) -> RawBatch {
    RawBatch::from_value(value).unwrap()
}

#[tokio::test]
async fn test_webhook_receives_each_new_batch_after_retry() {
    let receiver = Arc::new(Receiver {
        failures: Mutex::new(1),
        ..Default::default()
    });
    let base = serve(receiver.clone()).await;

    let (queue, worker) = outbound::channel(RetryConfig::linear(3, 10), Duration::from_secs(2)).unwrap();
    let worker_task = tokio::spawn(worker.run());

    let pipeline = Pipeline::builder()
        .callback(WebhookCallback::new(format!("{base}/hook"), queue))
        .build();

    pipeline.process_batch(batch(json!({"a": {"message": "one", "type": "info"}})));
    pipeline.process_batch(batch(json!({"a": {"message": "one", "type": "info"}})));
    pipeline.process_batch(batch(json!([{"message": "by index"}])));

    assert!(wait_until(Duration::from_secs(5), || receiver.bodies().len() == 2).await);
    drop(pipeline);
    tokio::time::timeout(Duration::from_secs(2), worker_task)
        .await
        .expect("worker drains once the pipeline is gone")
        .unwrap();

    let bodies = receiver.bodies();
    assert_eq!(bodies[0].0, "hook");
    assert_eq!(
        bodies[0].1,
        json!([{"id": "a", "title": "one", "message": "one", "type": "info", "timestamp": null}])
    );
    assert_eq!(bodies[1].1[0]["id"], "0");
    assert_eq!(bodies[1].1[0]["type"], "");
}

#[tokio::test]
async fn test_toast_sink_publishes_when_enabled() {
    let receiver = Arc::new(Receiver::default());
    let base = serve(receiver.clone()).await;

    let (queue, worker) = outbound::channel(RetryConfig::linear(0, 10), Duration::from_secs(2)).unwrap();
    tokio::spawn(worker.run());

    let toast = ToastOptions {
        server_url: format!("{base}/"),
        topic: "alerts".into(),
        auth_token: Some("tk_secret".into()),
        ..Default::default()
    };
    let pipeline = Pipeline::builder()
        .toast_sink(NtfyToastSink::new(&toast, queue))
        .build();

    // Toasts are only used once the pipeline is configured for them
    pipeline.process_batch(batch(json!({"skip": {"message": "terminal only"}})));

    // Already stopped, so the driver started by init exits without polling
    pipeline.stop();
    pipeline
        .init(&Options {
            use_toast: Some(true),
            toast: Some(toast.clone()),
            ..Default::default()
        })
        .unwrap();
    pipeline.process_batch(batch(json!({"t1": {"message": "deploy done", "type": "success"}})));

    assert!(wait_until(Duration::from_secs(5), || receiver.bodies().len() == 1).await);
    pipeline.shutdown().await.unwrap();

    let (route, body, auth) = receiver.bodies().remove(0);
    assert_eq!(route, "toast");
    assert_eq!(body["topic"], "alerts");
    assert_eq!(body["message"], "deploy done");
    assert_eq!(body["tags"], json!(["success"]));
    assert_eq!(body["priority"], 3);
    assert_eq!(auth.as_deref(), Some("Bearer tk_secret"));
}
