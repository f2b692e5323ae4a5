//! Test utilities and fixtures for songbridge tests.
//!
//! This module provides a scripted HTTP server, config presets, and
//! request factories to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use songbridge::test_utils::{Reply, TestServer};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let server = TestServer::start(vec![("/ping", vec![Reply::text(200, "pong")])]).await;
//!     let url = server.url("/ping");
//!     // ... test logic
//! }
//! ```

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::config::NetworkConfig;
use crate::model::{DownloadRequest, OutputDestination, Quality, TrackMetadata};

/// A canned HTTP response.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Complete response with a correct Content-Length
    Full {
        status: u16,
        content_type: &'static str,
        body: Vec<u8>,
    },
    /// Declares `declared_len` bytes, sends only `body`, then closes
    Short { declared_len: usize, body: Vec<u8> },
    /// Declares `declared_len` bytes, sends `body`, then holds the connection open
    Stall { declared_len: usize, body: Vec<u8> },
}

impl Reply {
    pub fn text(status: u16, body: &str) -> Self {
        Self::Full {
            status,
            content_type: "text/plain",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn json(status: u16, body: &str) -> Self {
        Self::Full {
            status,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn bytes(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Self::Full {
            status,
            content_type,
            body,
        }
    }
}

/// A request as seen by the [`TestServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path including the query string
    pub path: String,
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

struct Route {
    prefix: String,
    replies: Mutex<VecDeque<Reply>>,
}

impl Route {
    /// Replies are consumed in order; the last one repeats forever.
    fn next_reply(&self) -> Reply {
        let mut replies = self.replies.lock();
        if replies.len() > 1 {
            replies.pop_front().unwrap_or_else(|| Reply::text(500, "empty route"))
        } else {
            replies
                .front()
                .cloned()
                .unwrap_or_else(|| Reply::text(500, "empty route"))
        }
    }
}

/// Minimal scripted HTTP/1.1 server on a random local port.
///
/// Routes match by path prefix, first match wins. Unmatched paths get 404.
/// The server stops when dropped.
pub struct TestServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(routes: Vec<(&str, Vec<Reply>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("Failed to read local addr");

        let routes: Arc<Vec<Route>> = Arc::new(
            routes
                .into_iter()
                .map(|(prefix, replies)| Route {
                    prefix: prefix.to_string(),
                    replies: Mutex::new(replies.into()),
                })
                .collect(),
        );
        let requests = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let requests = Arc::clone(&requests);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let routes = Arc::clone(&routes);
                    let requests = Arc::clone(&requests);
                    tokio::spawn(async move {
                        let _ = handle_connection(stream, routes, requests).await;
                    });
                }
            })
        };

        Self {
            addr,
            requests,
            task,
        }
    }

    /// Root URL, e.g. `http://127.0.0.1:4321`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Snapshot of every request received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Requests whose path starts with `prefix`
    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    routes: Arc<Vec<Route>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    requests.lock().push(RecordedRequest {
        method,
        path: path.clone(),
        headers,
        body,
    });

    let reply = routes
        .iter()
        .find(|route| path.starts_with(&route.prefix))
        .map(Route::next_reply)
        .unwrap_or_else(|| Reply::text(404, "no route"));

    match reply {
        Reply::Full {
            status,
            content_type,
            body,
        } => {
            let head = format!(
                "HTTP/1.1 {status} Test\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).await?;
            stream.write_all(&body).await?;
            stream.shutdown().await?;
        }
        Reply::Short { declared_len, body } => {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: {declared_len}\r\nConnection: close\r\n\r\n"
            );
            stream.write_all(head.as_bytes()).await?;
            stream.write_all(&body).await?;
            stream.shutdown().await?;
        }
        Reply::Stall { declared_len, body } => {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: {declared_len}\r\n\r\n"
            );
            stream.write_all(head.as_bytes()).await?;
            stream.write_all(&body).await?;
            stream.flush().await?;
            tokio::time::sleep(Duration::from_secs(300)).await;
        }
    }

    Ok(())
}

/// Network settings for tests: generous rate limit, fast retries.
pub fn test_network_config() -> NetworkConfig {
    NetworkConfig {
        request_timeout_secs: 5,
        requests_per_second: 1000,
        max_retries: 2,
        retry_base_delay_ms: 10,
        retry_max_delay_ms: 40,
        ..NetworkConfig::default()
    }
}

/// Creates mock track metadata with sensible defaults.
pub fn mock_metadata() -> TrackMetadata {
    TrackMetadata {
        title: "Test Song".to_string(),
        artist: "Test Artist".to_string(),
        album: "Test Album".to_string(),
        album_artist: "Test Artist".to_string(),
        release_date: "2021-03-05".to_string(),
        track_number: 3,
        disc_number: 1,
        duration: Some(Duration::from_secs(215)),
    }
}

/// Creates a download request for a Spotify track, writing into `dir`.
///
/// Use struct update syntax to customize:
///
/// ```ignore
/// let request = DownloadRequest {
///     isrc: Some("USRC17607839".into()),
///     ..mock_request(dir.path())
/// };
/// ```
pub fn mock_request(dir: &Path) -> DownloadRequest {
    DownloadRequest {
        item_id: "item-1".to_string(),
        spotify_id: Some("4uLU6hMCjMI75M1A2tKUQC".to_string()),
        deezer_id: None,
        isrc: None,
        metadata: mock_metadata(),
        quality: Quality::Mp3320,
        output: OutputDestination::Directory {
            dir: dir.to_path_buf(),
            filename_template: None,
        },
        embed_lyrics: false,
        cover_url: None,
        max_quality_cover: false,
        skip_existing: false,
    }
}
