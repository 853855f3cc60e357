//! A minimal in-process stand-in for the store's REST interface.
//!
//! Documents live in a map keyed by their raw (still percent-encoded)
//! request path below `/rest/`. Posted queries are answered from the cache
//! lookup convention (`document-uri($cachedDoc) = '{db}/{name}'`) or from
//! registered `(substring, response)` rules; anything else gets an empty
//! body. Queries matching a `failing` substring get a 400.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode, Uri};
use axum::Router;

#[derive(Default)]
pub struct MockState {
    pub databases: BTreeSet<String>,
    pub documents: BTreeMap<String, String>,
    pub queries: Vec<String>,
    pub rules: Vec<(String, String)>,
    pub failing: Vec<String>,
    pub requests: Vec<(String, String)>,
    pub optimized: Vec<String>,
    pub authorization: Option<String>,
}

pub type Shared = Arc<Mutex<MockState>>;

impl MockState {
    fn answer(&self, query: &str) -> String {
        const LOOKUP: &str = "document-uri($cachedDoc) = '";
        if let Some(start) = query.find(LOOKUP) {
            let rest = &query[start + LOOKUP.len()..];
            let name = rest.split('\'').next().unwrap_or_default();
            return self.documents.get(name).cloned().unwrap_or_default();
        }
        self.rules
            .iter()
            .find(|(pattern, _)| query.contains(pattern.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_default()
    }
}

/// Undo the request envelope, including split CDATA sections.
pub fn unwrap_query(body: &str) -> String {
    let start = body.find("<![CDATA[").map(|i| i + 9).unwrap_or(0);
    let end = body.rfind("]]></text>").unwrap_or(body.len());
    body[start..end].replace("]]]]><![CDATA[>", "]]>")
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let mut state = state.lock().unwrap();
    state.authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let path = uri
        .path()
        .trim_start_matches("/rest")
        .trim_matches('/')
        .to_string();
    state.requests.push((method.to_string(), path.clone()));

    let is_database = !path.is_empty() && !path.contains('/');
    match method {
        Method::POST if path.is_empty() => {
            let query = unwrap_query(&body);
            let failed = state.failing.iter().any(|p| query.contains(p.as_str()));
            let answer = state.answer(&query);
            state.queries.push(query);
            if failed {
                (StatusCode::BAD_REQUEST, format!("Stopped at line 1: {}", "x".repeat(800)))
            } else {
                (StatusCode::OK, answer)
            }
        }
        Method::GET if is_database && uri.query() == Some("command=optimize") => {
            state.optimized.push(path);
            (StatusCode::OK, String::new())
        }
        Method::GET if is_database => {
            if state.databases.contains(&path) {
                (StatusCode::OK, String::new())
            } else {
                (StatusCode::NOT_FOUND, format!("Database '{}' was not found.", path))
            }
        }
        Method::PUT if is_database => {
            state.databases.insert(path);
            (StatusCode::CREATED, String::new())
        }
        Method::PUT => {
            state.documents.insert(path, body);
            (StatusCode::CREATED, String::new())
        }
        Method::DELETE if is_database => {
            if state.databases.remove(&path) {
                let prefix = format!("{}/", path);
                state.documents.retain(|name, _| !name.starts_with(&prefix));
                (StatusCode::OK, String::new())
            } else {
                (StatusCode::NOT_FOUND, String::new())
            }
        }
        Method::DELETE => match state.documents.remove(&path) {
            Some(_) => (StatusCode::OK, String::new()),
            None => (StatusCode::NOT_FOUND, String::new()),
        },
        _ => (StatusCode::BAD_REQUEST, "unsupported request".to_string()),
    }
}

fn app(state: Shared) -> Router {
    Router::new().fallback(handle).with_state(state)
}

/// Serve on an ephemeral port from inside a running tokio runtime.
pub async fn start(state: Shared) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });
    addr
}

/// Serve from a background thread with its own runtime, for blocking tests.
pub fn start_in_background(state: Shared) -> SocketAddr {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app(state)).await.unwrap();
        });
    });
    rx.recv().unwrap()
}

pub fn store_url(addr: SocketAddr) -> String {
    format!("http://{}/rest/", addr)
}
