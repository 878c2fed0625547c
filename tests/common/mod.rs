//! Shared helpers for integration tests
//!
//! `StubServer` is a small axum app answering canned JSON so the inventory
//! binaries can run end to end without a real cloud.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tokio::runtime::Runtime;

/// A canned response for one method + path
///
/// A path carrying a query (`/v2/images?marker=x`) only answers that exact
/// query; a bare path answers any query no more specific route claims.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: &'static str,
    pub path: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Route {
    pub fn json(method: &'static str, path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method,
            path: path.into(),
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

/// A request the stub received
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Header names are lowercased
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == &name.to_lowercase())
            .map(|(_, v)| v.as_str())
    }
}

struct StubState {
    routes: Vec<Route>,
    requests: Mutex<Vec<Recorded>>,
}

pub struct StubServer {
    pub addr: SocketAddr,
    state: Arc<StubState>,
    // Dropping the runtime shuts the server down
    _runtime: Runtime,
}

impl StubServer {
    /// Binds to an ephemeral port, builds the routes from the base URL and serves them
    pub fn start(build: impl FnOnce(&str) -> Vec<Route>) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("stub runtime");
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .expect("bind stub server");
        let addr = listener.local_addr().expect("stub address");

        let state = Arc::new(StubState {
            routes: build(&format!("http://{}", addr)),
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .fallback(answer)
            .with_state(Arc::clone(&state));

        runtime.spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            state,
            _runtime: runtime,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().expect("requests lock").clone()
    }
}

async fn answer(
    State(state): State<Arc<StubState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    state.requests.lock().expect("requests lock").push(Recorded {
        method: method.to_string(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let matches = |route: &&Route, wanted: &str| route.method == method.as_str() && route.path == wanted;
    let route = state
        .routes
        .iter()
        .find(|r| matches(r, target.as_str()))
        .or_else(|| state.routes.iter().find(|r| matches(r, path.as_str())));
    let Some(route) = route else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "not found"})),
        )
            .into_response();
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in &route.headers {
        response_headers.insert(
            HeaderName::from_bytes(name.as_bytes()).expect("stub header name"),
            HeaderValue::from_str(value).expect("stub header value"),
        );
    }
    let status = StatusCode::from_u16(route.status).expect("stub status");
    (status, response_headers, route.body.clone()).into_response()
}

/// Runs a binary with a clean environment apart from `envs`
pub fn run_bin(bin: &str, args: &[&str], envs: &[(&str, &str)], cwd: Option<&std::path::Path>) -> Output {
    let mut cmd = Command::new(bin);
    cmd.args(args);
    for var in [
        "OS_CLOUD",
        "OS_PRIVATE",
        "OS_REFRESH",
        "OS_DEBUG",
        "OS_AUTH_URL",
        "OS_CLIENT_CONFIG_FILE",
        "JETI_OPENSHIFT_USERNAME",
        "JETI_OPENSHIFT_PASSWORD",
        "JETI_OPENSHIFT_BROKER",
        "HTTP_PROXY",
        "HTTPS_PROXY",
        "http_proxy",
        "https_proxy",
        "ALL_PROXY",
        "all_proxy",
    ] {
        cmd.env_remove(var);
    }
    cmd.envs(envs.iter().copied());
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    cmd.output().expect("failed to execute binary")
}

/// Runs a binary feeding `stdin`
pub fn run_with_stdin(bin: &str, stdin: &str) -> Output {
    use std::process::Stdio;

    let mut child = Command::new(bin)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn binary");
    child
        .stdin
        .take()
        .expect("stdin pipe")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait for binary")
}
