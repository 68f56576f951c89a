//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
    routing::any,
    Router,
};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

/// What a recording backend saw for one request.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct Received {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Requests seen by a recording backend, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Received>>>);

#[allow(dead_code)]
impl Recorder {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Received> {
        self.0.lock().unwrap().last().cloned()
    }
}

/// Serve `app` on an ephemeral local port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a backend that records every request and answers `status` with `body`.
pub async fn start_recording_backend(status: u16, body: &'static str) -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();

    async fn record(
        State((recorder, status, reply)): State<(Recorder, u16, &'static str)>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> (axum::http::StatusCode, &'static str) {
        recorder.0.lock().unwrap().push(Received {
            method,
            uri,
            headers,
            body,
        });
        (axum::http::StatusCode::from_u16(status).unwrap(), reply)
    }

    let app = Router::new()
        .route("/", any(record))
        .route("/{*path}", any(record))
        .with_state((recorder.clone(), status, body));

    (serve(app).await, recorder)
}

/// Start a backend that reads each request and closes the connection without
/// answering.
#[allow(dead_code)]
pub async fn start_hangup_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            drop(stream);
        }
    });
    addr
}

/// Start a backend that waits `delay` before answering 200.
#[allow(dead_code)]
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    let app = Router::new().route(
        "/{*path}",
        any(move || async move {
            tokio::time::sleep(delay).await;
            "late"
        }),
    );
    serve(app).await
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
