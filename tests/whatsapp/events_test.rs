//! Tests for `src/whatsapp/events.rs` against a scripted `/events/poll`.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use wa_relay::whatsapp::events::{spawn_event_listener, WhatsAppEvent};

/// Poll responses served in order; an exhausted script answers `[]` after
/// a short pause.
#[derive(Clone, Default)]
struct PollScript {
    responses: Arc<Mutex<VecDeque<(StatusCode, Value)>>>,
    polls: Arc<AtomicUsize>,
}

impl PollScript {
    fn new(responses: Vec<(StatusCode, Value)>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            polls: Arc::default(),
        }
    }

    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

async fn poll(State(script): State<PollScript>) -> (StatusCode, Json<Value>) {
    script.polls.fetch_add(1, Ordering::SeqCst);
    let next = script.responses.lock().expect("script lock").pop_front();
    match next {
        Some((status, body)) => (status, Json(body)),
        None => {
            tokio::time::sleep(Duration::from_millis(100)).await;
            (StatusCode::OK, Json(json!([])))
        }
    }
}

async fn serve_script(listener: TcpListener, script: PollScript) {
    let app = Router::new()
        .route("/events/poll", get(poll))
        .with_state(script);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
}

async fn spawn_bridge(script: PollScript) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind bridge");
    let addr = listener.local_addr().expect("bridge address");
    serve_script(listener, script).await;
    format!("http://{addr}")
}

async fn next_event(rx: &mut mpsc::Receiver<WhatsAppEvent>, wait: Duration) -> WhatsAppEvent {
    tokio::time::timeout(wait, rx.recv())
        .await
        .expect("event within deadline")
        .expect("listener alive")
}

fn chat(id: &str, body: &str) -> Value {
    json!({ "type": "message", "id": id, "from": "123@c.us", "kind": "chat", "body": body })
}

#[tokio::test]
async fn events_are_forwarded_in_order() {
    let script = PollScript::new(vec![
        (
            StatusCode::OK,
            json!([{ "type": "qr", "code": "2@abc" }, { "type": "ready" }]),
        ),
        (StatusCode::OK, json!([chat("m1", "first"), chat("m2", "second")])),
    ]);
    let base = spawn_bridge(script).await;
    let (tx, mut rx) = mpsc::channel(8);
    let handle = spawn_event_listener(base, Duration::from_secs(5), tx);

    let wait = Duration::from_secs(5);
    assert_eq!(
        next_event(&mut rx, wait).await,
        WhatsAppEvent::PairingChallenge {
            code: "2@abc".to_owned()
        }
    );
    assert_eq!(next_event(&mut rx, wait).await, WhatsAppEvent::SessionReady);
    for expected in ["first", "second"] {
        let WhatsAppEvent::MessageReceived(message) = next_event(&mut rx, wait).await else {
            panic!("expected a message event");
        };
        assert_eq!(message.body, expected);
    }
    handle.abort();
}

#[tokio::test]
async fn unknown_events_do_not_hide_messages_in_the_same_batch() {
    let script = PollScript::new(vec![(
        StatusCode::OK,
        json!([
            { "type": "message_ack", "id": "m0", "ack": 3 },
            chat("m1", "keep me"),
            { "type": "call", "from": "123@c.us" },
        ]),
    )]);
    let base = spawn_bridge(script).await;
    let (tx, mut rx) = mpsc::channel(8);
    let handle = spawn_event_listener(base, Duration::from_secs(5), tx);

    let WhatsAppEvent::MessageReceived(message) = next_event(&mut rx, Duration::from_secs(5)).await
    else {
        panic!("expected the chat message");
    };
    assert_eq!(message.body, "keep me");
    assert!(
        tokio::time::timeout(Duration::from_millis(300), rx.recv())
            .await
            .is_err(),
        "only the chat message is forwarded"
    );
    handle.abort();
}

#[tokio::test]
async fn listener_stops_once_consumer_is_gone() {
    let script = PollScript::new(vec![(StatusCode::OK, json!([{ "type": "ready" }]))]);
    let base = spawn_bridge(script).await;
    let (tx, mut rx) = mpsc::channel(8);
    let handle = spawn_event_listener(base, Duration::from_secs(5), tx);

    assert_eq!(
        next_event(&mut rx, Duration::from_secs(5)).await,
        WhatsAppEvent::SessionReady
    );
    drop(rx);

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("listener exits after the receiver is dropped")
        .expect("listener task did not panic");
}

#[tokio::test]
async fn non_success_response_is_retried() {
    let script = PollScript::new(vec![
        (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": "starting" })),
        (StatusCode::OK, json!([{ "type": "ready" }])),
    ]);
    let base = spawn_bridge(script.clone()).await;
    let (tx, mut rx) = mpsc::channel(8);
    let handle = spawn_event_listener(base, Duration::from_secs(5), tx);

    assert_eq!(
        next_event(&mut rx, Duration::from_secs(15)).await,
        WhatsAppEvent::SessionReady
    );
    assert!(script.polls() >= 2);
    handle.abort();
}

#[tokio::test]
async fn listener_reconnects_after_transport_error() {
    let addr: SocketAddr = {
        let free = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
        free.local_addr().expect("local_addr")
    };
    let (tx, mut rx) = mpsc::channel(8);
    let handle = spawn_event_listener(format!("http://{addr}"), Duration::from_secs(5), tx);

    // The first poll hits a closed port; the bridge comes up afterwards.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let listener = TcpListener::bind(addr).await.expect("rebind bridge port");
    let script = PollScript::new(vec![(StatusCode::OK, json!([{ "type": "ready" }]))]);
    serve_script(listener, script).await;

    assert_eq!(
        next_event(&mut rx, Duration::from_secs(10)).await,
        WhatsAppEvent::SessionReady
    );
    handle.abort();
}

#[tokio::test]
async fn zero_poll_timeout_still_delivers_events() {
    let script = PollScript::new(vec![(StatusCode::OK, json!([{ "type": "ready" }]))]);
    let base = spawn_bridge(script).await;
    let (tx, mut rx) = mpsc::channel(8);
    let handle = spawn_event_listener(base, Duration::ZERO, tx);

    assert_eq!(
        next_event(&mut rx, Duration::from_secs(5)).await,
        WhatsAppEvent::SessionReady
    );
    handle.abort();
}
