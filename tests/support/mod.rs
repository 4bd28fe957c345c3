//! Loopback HTTP backend for end-to-end tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request as seen by the backend.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub target: String,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

/// What the backend sends back for one request.
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
    pub chunked: bool,
}

impl Reply {
    pub fn ok(data: serde_json::Value) -> Self {
        Self::json(200, serde_json::json!({"code": 0, "message": "success", "data": data}))
    }

    pub fn ok_empty(message: &str) -> Self {
        Self::json(200, serde_json::json!({"code": 0, "message": message}))
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({"code": status, "message": message}))
    }

    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
            chunked: false,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sends the body with `Transfer-Encoding: chunked`, split into
    /// 256-byte chunks.
    pub fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }
}

type Route = dyn Fn(&Seen) -> Reply + Send + Sync;

/// Serves one request per connection, answering with `route`.
pub struct Backend {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Backend {
    pub async fn start<F>(route: F) -> Self
    where
        F: Fn(&Seen) -> Reply + Send + Sync + 'static,
    {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let route: Arc<Route> = Arc::new(route);

        {
            let connections = Arc::clone(&connections);
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    connections.fetch_add(1, Ordering::SeqCst);
                    let route = Arc::clone(&route);
                    let seen = Arc::clone(&seen);
                    tokio::spawn(async move {
                        let _ = serve(stream, route, seen).await;
                    });
                }
            });
        }

        Self {
            addr,
            connections,
            seen,
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    /// Number of requests whose request line matches `method target`.
    pub fn hits(&self, method: &str, target: &str) -> usize {
        self.seen()
            .iter()
            .filter(|s| s.method == method && s.target == target)
            .count()
    }
}

async fn serve(
    mut stream: TcpStream,
    route: Arc<Route>,
    seen: Arc<Mutex<Vec<Seen>>>,
) -> std::io::Result<()> {
    let mut buf = BytesMut::with_capacity(4096);

    let request = loop {
        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }

        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut raw = httparse::Request::new(&mut headers);
        let Ok(httparse::Status::Complete(offset)) = raw.parse(&buf) else {
            continue;
        };

        let header = |name: &str| {
            raw.headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| String::from_utf8_lossy(h.value).into_owned())
        };
        let length: usize = header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        if buf.len() < offset + length {
            continue;
        }

        break Seen {
            method: raw.method.unwrap_or_default().to_owned(),
            target: raw.path.unwrap_or_default().to_owned(),
            authorization: header("authorization"),
            body: buf[offset..offset + length].to_vec(),
        };
    };

    seen.lock().unwrap().push(request.clone());
    let reply = route(&request);
    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    if reply.chunked {
        let head = format!(
            "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
            reply.status
        );
        stream.write_all(head.as_bytes()).await?;
        for chunk in reply.body.as_bytes().chunks(256) {
            stream
                .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                .await?;
            stream.write_all(chunk).await?;
            stream.write_all(b"\r\n").await?;
            stream.flush().await?;
        }
        stream.write_all(b"0\r\n\r\n").await?;
    } else {
        let response = format!(
            "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            reply.status,
            reply.body.len(),
            reply.body
        );
        stream.write_all(response.as_bytes()).await?;
    }
    stream.shutdown().await
}

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn model_json(id: &str, title: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "user_id": "u-1",
        "title": title,
        "description": null,
        "file_path": format!("{id}.glb"),
        "file_size": 1024,
        "image_url": null,
        "tags": ["scifi"],
        "is_public": true,
        "status": "approved",
        "update_status": "idle",
        "pending_changes": null,
        "downloads": 0,
        "rejection_reason": null,
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-01T00:00:00Z"
    })
}

pub fn page_json(items: Vec<serde_json::Value>) -> serde_json::Value {
    let total = items.len();
    serde_json::json!({
        "items": items,
        "total": total,
        "page": 1,
        "page_size": 12,
        "total_pages": 1
    })
}
