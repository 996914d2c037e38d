mod common;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trumpet::config::{Options, TransportKind};
use trumpet::{AppError, Pipeline};

use common::{spawn_server, wait_until, RecordingCallback, RecordingSink};

/// Remembers the `Last-Event-ID` sent on every connection
#[derive(Default)]
struct EventServer {
    connections: Mutex<Vec<Option<String>>>,
}

impl EventServer {
    fn connections(&self) -> Vec<Option<String>> {
        self.connections.lock().unwrap().clone()
    }
}

async fn events(
    State(server): State<Arc<EventServer>>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let connection = {
        let mut connections = server.connections.lock().unwrap();
        connections.push(
            headers
                .get("last-event-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        );
        connections.len() - 1
    };

    let events = if connection == 0 {
        vec![
            Event::default()
                .event("trumpet")
                .id("1")
                .data(r#"{"n1": {"message": "one", "type": "info", "timestamp": 1}}"#),
            Event::default().event("other").data(r#"{"x": {"message": "nope"}}"#),
            Event::default().data(r#"{"m": {"message": "default event name"}}"#),
            Event::default().event("trumpet").data("not json"),
            Event::default()
                .event("trumpet")
                .id("2")
                .retry(Duration::from_millis(50))
                .data(r#"{"n2": {"message": "two", "type": "warn", "timestamp": "2024-01-01"}}"#),
        ]
    } else {
        vec![Event::default()
            .event("trumpet")
            .data(r#"{"n2": {"message": "two"}, "n3": {"message": "three"}}"#)]
    };

    // The stream ends after these events, closing the connection
    Sse::new(stream::iter(events.into_iter().map(Ok)))
}

fn options(base_url: String) -> Options {
    Options {
        server_base_url: Some(base_url),
        notifications_endpoint: Some("events".to_string()),
        api_type: Some(TransportKind::Sse),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_trumpet_events_dispatched_and_stream_reconnects() {
    let server = Arc::new(EventServer::default());
    let app = Router::new()
        .route("/events", get(events))
        .with_state(server.clone());
    let addr = spawn_server(app).await;

    let sink = RecordingSink::default();
    let callback = RecordingCallback::default();
    let pipeline = Pipeline::builder()
        .render_sink(sink.clone())
        .callback(callback.clone())
        .build();
    pipeline.init(&options(format!("http://{addr}/"))).unwrap();

    assert!(wait_until(Duration::from_secs(5), || sink.len() == 3).await);
    assert!(wait_until(Duration::from_secs(5), || server.connections().len() >= 3).await);
    pipeline.shutdown().await.unwrap();

    assert_eq!(sink.ids(), vec!["n1", "n2", "n3"]);
    assert_eq!(
        callback.batches(),
        vec![
            vec!["n1".to_string()],
            vec!["n2".to_string()],
            vec!["n3".to_string()]
        ]
    );

    let connections = server.connections();
    assert_eq!(connections[0], None);
    assert_eq!(connections[1].as_deref(), Some("2"));
}

#[tokio::test]
async fn test_error_status_ends_the_driver() {
    let app = Router::new();
    let addr = spawn_server(app).await;

    let sink = RecordingSink::default();
    let pipeline = Pipeline::builder().render_sink(sink.clone()).build();
    pipeline.init(&options(format!("http://{addr}/"))).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), pipeline.join())
        .await
        .expect("driver should give up on a 404");
    assert!(matches!(
        result,
        Err(AppError::HttpStatus {
            status_code: 404,
            ..
        })
    ));
    assert_eq!(sink.len(), 0);
}

#[tokio::test]
async fn test_stop_closes_open_stream() {
    async fn endless() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        Sse::new(stream::pending::<Result<Event, Infallible>>())
    }

    let app = Router::new().route("/events", get(endless));
    let addr = spawn_server(app).await;

    let pipeline = Pipeline::builder().build();
    pipeline.init(&options(format!("http://{addr}/"))).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    tokio::time::timeout(Duration::from_secs(1), pipeline.shutdown())
        .await
        .expect("stop should end a connected SSE driver")
        .unwrap();
}
