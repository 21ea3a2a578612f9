//! Shared helpers for the restwire conformance test suite.
//!
//! Provides [`spawn_echo_server`]: an in-process axum server on an ephemeral
//! port that reflects every request back as JSON, so tests can assert on
//! exactly what the client put on the wire. [`EchoServer::spawn`] also counts
//! the requests that arrive, for tests that must prove nothing was sent.
//!
//! | Route | Response |
//! |-------|----------|
//! | `ANY /echo/{*rest}` | 200, JSON description of the request |
//! | `GET /status/{code}` | `{code}`, text body `status {code}` |
//! | `GET /number` | 200, `42` as `application/json` |
//! | `GET /empty` | 204, no body |

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Request};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::middleware::map_request;
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::{json, Map, Value};

/// Start the echo server and return its base URL, e.g.
/// `http://127.0.0.1:51234/`. The trailing slash makes it usable as a
/// client base URL directly.
///
/// The server runs in a background `tokio` task for the rest of the test.
///
/// # Panics
///
/// Panics if the TCP listener cannot be bound.
pub async fn spawn_echo_server() -> String {
    EchoServer::spawn().await.base_url
}

/// A running echo server and the number of requests it has received.
pub struct EchoServer {
    pub base_url: String,
    requests: Arc<AtomicUsize>,
}

impl EchoServer {
    /// # Panics
    ///
    /// Panics if the TCP listener cannot be bound.
    pub async fn spawn() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("get local addr");

        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();
        let app = router().layer(map_request(move |req: Request| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                req
            }
        }));

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("echo server error");
        });

        Self {
            base_url: format!("http://{addr}/"),
            requests,
        }
    }

    /// Requests received so far, on any route.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// A base URL with nothing listening behind it.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");
    drop(listener);
    format!("http://{addr}/")
}

fn router() -> Router {
    Router::new()
        .route("/echo/{*rest}", any(echo))
        .route("/status/{code}", get(status))
        .route("/number", get(number))
        .route("/empty", get(empty))
}

/// Reflect the request. Header names are lower-cased; repeated headers
/// become arrays in arrival order.
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let mut reflected = Map::new();
    for name in headers.keys() {
        let values: Vec<Value> = headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let value = match <[Value; 1]>::try_from(values) {
            Ok([single]) => single,
            Err(many) => Value::Array(many),
        };
        reflected.insert(name.as_str().to_string(), value);
    }

    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "headers": reflected,
        "body": String::from_utf8_lossy(&body),
        "body_length": body.len(),
    }))
}

async fn status(Path(code): Path<u16>) -> (StatusCode, String) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, format!("status {code}"))
}

async fn number() -> ([(header::HeaderName, &'static str); 1], &'static str) {
    ([(header::CONTENT_TYPE, "application/json")], "42")
}

async fn empty() -> StatusCode {
    StatusCode::NO_CONTENT
}
