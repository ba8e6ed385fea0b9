//! Shared utilities for integration testing.
//!
//! Mock nodes are plain TCP listeners speaking just enough HTTP/1.1 for the
//! client: one request per connection, `Connection: close` on every answer.

#![allow(dead_code)]

use reqwest::StatusCode;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// A request as seen by a mock node.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MockRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What a mock node answers.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
    /// Close the connection without answering.
    pub hang_up: bool,
    /// Wait before answering.
    pub delay: Option<Duration>,
}

impl MockResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            hang_up: false,
            delay: None,
        }
    }

    pub fn ok() -> Self {
        Self::json(200, "{}")
    }

    pub fn hang_up() -> Self {
        Self {
            status: 0,
            body: String::new(),
            headers: Vec::new(),
            hang_up: true,
            delay: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A running mock node.
#[derive(Clone)]
pub struct MockNode {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<MockRequest>>>,
}

impl MockNode {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests received so far, excluding `HEAD /` probes.
    pub fn calls(&self) -> Vec<MockRequest> {
        self.requests()
            .into_iter()
            .filter(|r| !(r.method == "HEAD" && r.path == "/"))
            .collect()
    }
}

async fn read_request<R: tokio::io::AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Option<MockRequest> {
    let mut line = String::new();
    reader.read_line(&mut line).await.ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }

    let len = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0; len];
    reader.read_exact(&mut body).await.ok()?;

    Some(MockRequest {
        method,
        path,
        headers,
        body,
    })
}

/// Start a programmable mock node on an ephemeral port.
pub async fn start_programmable_node<F>(f: F) -> MockNode
where
    F: Fn(&MockRequest) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let log = requests.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    let log = log.clone();
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(socket);
                        let Some(request) = read_request(&mut reader).await else {
                            return;
                        };
                        log.lock().unwrap().push(request.clone());
                        let response = f(&request);
                        let mut socket = reader.into_inner();
                        if let Some(delay) = response.delay {
                            tokio::time::sleep(delay).await;
                        }
                        if response.hang_up {
                            let _ = socket.shutdown().await;
                            return;
                        }

                        let reason = StatusCode::from_u16(response.status)
                            .ok()
                            .and_then(|s| s.canonical_reason())
                            .unwrap_or("Unknown");
                        let mut out = format!(
                            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                            response.status,
                            reason,
                            response.body.len()
                        );
                        for (k, v) in &response.headers {
                            out.push_str(&format!("{k}: {v}\r\n"));
                        }
                        out.push_str("\r\n");
                        if request.method != "HEAD" {
                            out.push_str(&response.body);
                        }
                        let _ = socket.write_all(out.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockNode { addr, requests }
}

/// Start a mock node that answers every request with `200 {}`.
pub async fn start_mock_node() -> MockNode {
    start_programmable_node(|_| MockResponse::ok()).await
}

/// An address nothing listens on.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// An HTTP client that ignores proxy environment variables.
pub fn test_http() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// A `/_nodes/http` body listing `nodes` as `(id, "host:port")`.
pub fn nodes_http_body(nodes: &[(&str, String)]) -> String {
    let entries: Vec<String> = nodes
        .iter()
        .map(|(id, addr)| format!(r#""{id}":{{"name":"{id}","http":{{"publish_address":"{addr}"}}}}"#))
        .collect();
    format!(r#"{{"cluster_name":"elasticsearch","nodes":{{{}}}}}"#, entries.join(","))
}
