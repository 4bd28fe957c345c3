//! Inbound HTTP/1.1 response parsing using the [`httparse`] crate.

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::{Headers, StatusCode};

/// Errors that can occur while parsing an HTTP/1.1 response head.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("response is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("malformed chunk in chunked body")]
    InvalidChunk,
}

/// A parsed HTTP/1.1 response.
///
/// Created by [`Response::parse`] from a raw byte buffer.
///
/// # Examples
///
/// ```
/// use hubcache::http::{Response, StatusCode};
///
/// let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 11\r\n\r\n{\"code\":0}\n";
/// let (response, offset) = Response::parse(raw).unwrap();
///
/// assert_eq!(response.status(), StatusCode::OK);
/// assert_eq!(response.content_length(), Some(11));
/// assert_eq!(&raw[offset..], b"{\"code\":0}\n");
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    reason: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Maximum number of headers accepted per response.
    const MAX_HEADERS: usize = 64;

    /// Parses a response from `buf`.
    ///
    /// Returns the response and the offset at which the body begins. The
    /// response's body holds everything in `buf` after the head; callers
    /// that know the body length trim it with
    /// [`truncate_body`](Self::truncate_body).
    ///
    /// # Errors
    ///
    /// - [`WireError::Incomplete`] if the head has not fully arrived.
    /// - [`WireError::Parse`] if the data is malformed.
    /// - [`WireError::MissingField`] if the status line lacks a code or version.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), WireError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw = httparse::Response::new(&mut headers);

        let body_offset = match raw.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(WireError::Incomplete),
        };

        let status = raw
            .code
            .map(StatusCode::from_u16)
            .ok_or(WireError::MissingField { field: "status" })?;
        let version = raw
            .version
            .ok_or(WireError::MissingField { field: "version" })?;
        let reason = raw.reason.unwrap_or_default().to_owned();

        let mut header_map = Headers::with_capacity(raw.headers.len());
        for header in raw.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.append(header.name, value);
            }
        }

        Ok((
            Self {
                status,
                reason,
                version,
                headers: header_map,
                body: Bytes::copy_from_slice(&buf[body_offset..]),
            },
            body_offset,
        ))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase as sent by the server.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// `Content-Length` parsed as `usize`, if present and valid.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }

    /// `true` if the body uses chunked transfer coding.
    pub fn is_chunked(&self) -> bool {
        self.headers.has_token("transfer-encoding", "chunked")
    }

    /// Replaces the body, e.g. with one reassembled by [`decode_chunked`].
    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    /// Drops body bytes past `len`.
    pub fn truncate_body(&mut self, len: usize) {
        self.body.truncate(len);
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the deserializer's error if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Reassembles a `Transfer-Encoding: chunked` body from `buf`, which starts
/// right after the response head.
///
/// Returns `Ok(None)` until the last chunk and the trailer section have
/// arrived. Chunk extensions and trailers are accepted and dropped.
///
/// # Errors
///
/// [`WireError::InvalidChunk`] for a bad chunk size line or a chunk not
/// followed by CRLF, [`WireError::Parse`] for a malformed trailer.
pub fn decode_chunked(buf: &[u8]) -> Result<Option<Bytes>, WireError> {
    let mut body = BytesMut::new();
    let mut pos = 0;

    loop {
        let (size_line, size) = match httparse::parse_chunk_size(&buf[pos..]) {
            Ok(httparse::Status::Complete(pair)) => pair,
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(_) => return Err(WireError::InvalidChunk),
        };
        pos += size_line;

        if size == 0 {
            let mut trailers = [httparse::EMPTY_HEADER; Response::MAX_HEADERS];
            return match httparse::parse_headers(&buf[pos..], &mut trailers)? {
                httparse::Status::Complete(_) => Ok(Some(body.freeze())),
                httparse::Status::Partial => Ok(None),
            };
        }

        let end = usize::try_from(size)
            .ok()
            .and_then(|size| pos.checked_add(size))
            .ok_or(WireError::InvalidChunk)?;
        if buf.len() < end.saturating_add(2) {
            return Ok(None);
        }
        if &buf[end..end + 2] != b"\r\n" {
            return Err(WireError::InvalidChunk);
        }

        body.extend_from_slice(&buf[pos..end]);
        pos = end + 2;
    }
}
