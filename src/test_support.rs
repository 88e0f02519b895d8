use crate::config::PredictionServiceConfig;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use std::{sync::Arc, time::Duration};
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

pub const FAKE_JPEG: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg-payload";

#[derive(Clone)]
struct ServerState {
    status: StatusCode,
    body: &'static str,
    delay: Duration,
    captured: Arc<Mutex<Option<oneshot::Sender<(HeaderMap, Bytes)>>>>,
}

async fn handle_predict(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], &'static str) {
    if let Some(tx) = state.captured.lock().await.take() {
        let _ = tx.send((headers, body));
    }
    tokio::time::sleep(state.delay).await;
    (
        state.status,
        [(header::CONTENT_TYPE, "application/json")],
        state.body,
    )
}

pub fn service_config(port: u16, timeout_ms: u64) -> PredictionServiceConfig {
    PredictionServiceConfig {
        scheme: "http".into(),
        host: "127.0.0.1".into(),
        port,
        path: "/predict".into(),
        timeout_ms,
    }
}

/// Serves a canned `/predict` answer on an ephemeral port. The receiver
/// yields the headers and body of the first request.
pub async fn spawn_prediction_server(
    status: StatusCode,
    body: &'static str,
    delay: Duration,
) -> (PredictionServiceConfig, oneshot::Receiver<(HeaderMap, Bytes)>) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel();
    let state = ServerState {
        status,
        body,
        delay,
        captured: Arc::new(Mutex::new(Some(tx))),
    };
    let app = Router::new()
        .route("/predict", post(handle_predict))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (service_config(port, 2_000), rx)
}
