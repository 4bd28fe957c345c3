//! Outbound HTTP/1.1 request builder.
//!
//! Builds a request with a fluent API and serializes it into a byte buffer
//! for writing to a TCP stream.

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use super::{Headers, Method};

/// An HTTP/1.1 request, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use hubcache::http::{Method, Request};
///
/// let request = Request::new(Method::Get, "/api/models?page=1")
///     .header("Host", "hub.local")
///     .bearer("secret");
///
/// let bytes = request.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("GET /api/models?page=1 HTTP/1.1\r\n"));
/// assert!(text.contains("Authorization: Bearer secret\r\n"));
/// assert!(text.contains("Connection: close\r\n"));
/// assert!(text.ends_with("\r\n\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    headers: Headers,
    body: Bytes,
    keep_alive: bool,
}

impl Request {
    /// Creates a request for `target` (path plus optional query) with an
    /// empty body. Connections default to `close`.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Headers::new(),
            body: Bytes::new(),
            keep_alive: false,
        }
    }

    /// Sets a header, replacing earlier values for the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Sets `Authorization: Bearer <token>`.
    #[must_use]
    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    /// Serializes `payload` as the JSON body and sets `Content-Type`.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error if `payload` cannot be encoded.
    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.body = Bytes::from(serde_json::to_vec(payload)?);
        Ok(self.header("Content-Type", "application/json"))
    }

    /// Sets a raw body.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Controls whether `Connection: keep-alive` or `Connection: close` is sent.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Serializes the request in HTTP/1.1 wire format.
    ///
    /// Adds `Connection` and, when the body is non-empty or the method
    /// normally carries one, `Content-Length`.
    pub fn into_bytes(mut self) -> BytesMut {
        let connection = if self.keep_alive { "keep-alive" } else { "close" };
        self.headers.set("Connection", connection);

        if !self.body.is_empty() || self.method.expects_body() {
            self.headers
                .set("Content-Length", self.body.len().to_string());
        }

        let estimated_size = 64 + self.target.len() + self.headers.len() * 48 + self.body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(format!("{} {} HTTP/1.1\r\n", self.method, self.target).as_bytes());
        buf.put(self.headers.to_string().as_bytes());
        buf.put(&b"\r\n"[..]);
        buf.put(self.body);

        buf
    }
}
