//! [`ApiClient`]: one TCP connection per request, JSON envelopes in and out.

use std::sync::Arc;

use bytes::BytesMut;
use serde::de::{DeserializeOwned, IgnoredAny};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::{ApiError, ApiFuture, ClientConfig, Marketplace};
use crate::http::{Method, Request, Response, WireError, decode_chunked};
use crate::types::{
    Announcement, ApiResponse, DownloadTicket, Favorite, Model, ModelDetail, ModelId, ModelUpdate,
    NewModel, Page, PageQuery, UserId,
};

/// Initial read buffer capacity per response.
const INITIAL_BUF_SIZE: usize = 4096;

/// Marketplace API client.
///
/// Cheap to clone; clones share one configuration.
///
/// # Examples
///
/// ```rust,no_run
/// use hubcache::client::{ApiClient, ClientConfig, Marketplace};
/// use hubcache::types::PageQuery;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = ApiClient::new(ClientConfig::new("127.0.0.1:8080"))?;
///     let page = client.list_models(PageQuery::first()).await?;
///     println!("{} models", page.total);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
}

impl ApiClient {
    /// Creates a client after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the configuration is invalid.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Starts a request for `route` under the base path with the standard
    /// headers and, if configured, the bearer token.
    pub fn request(&self, method: Method, route: &str) -> Request {
        let request = Request::new(method, self.config.url(route))
            .header("Host", self.config.addr.as_str())
            .header("Accept", "application/json");
        match &self.config.token {
            Some(token) => request.bearer(token),
            None => request,
        }
    }

    /// Sends `request` and returns the raw response, applying the configured
    /// request timeout.
    ///
    /// # Errors
    ///
    /// Transport failures ([`ApiError::Connect`], [`ApiError::Io`],
    /// [`ApiError::TimedOut`]) and malformed or oversized responses.
    pub async fn send(&self, request: Request) -> Result<Response, ApiError> {
        let method = request.method();
        let target = request.target().to_owned();

        let outcome = match self.config.request_timeout {
            Some(after) => tokio::time::timeout(after, self.exchange(request))
                .await
                .unwrap_or_else(|_| Err(ApiError::TimedOut { after })),
            None => self.exchange(request).await,
        };

        match &outcome {
            Ok(response) => {
                debug!(%method, target = %target, status = %response.status(), "request completed")
            }
            Err(e) => warn!(%method, target = %target, error = %e, "request failed"),
        }
        outcome
    }

    async fn exchange(&self, request: Request) -> Result<Response, ApiError> {
        let addr = self.config.addr.as_str();
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ApiError::Connect {
                addr: addr.to_owned(),
                source,
            })?;

        stream.write_all(&request.into_bytes()).await?;
        stream.flush().await?;

        read_response(&mut stream, self.config.max_response_bytes).await
    }

    /// Sends `request` and unwraps the envelope, returning its `data`.
    ///
    /// # Errors
    ///
    /// Everything [`send`](Self::send) reports, plus [`ApiError::Status`]
    /// for non-2xx responses, [`ApiError::Backend`] for non-zero envelope
    /// codes and [`ApiError::Decode`] for bodies of the wrong shape.
    pub async fn call<T: DeserializeOwned>(&self, request: Request) -> Result<Option<T>, ApiError> {
        let response = self.send(request).await?;
        decode_envelope(&response)
    }

    /// Like [`call`](Self::call) but requires `data` to be present.
    pub async fn data<T: DeserializeOwned>(&self, request: Request) -> Result<T, ApiError> {
        self.call(request).await?.ok_or(ApiError::MissingData)
    }

    fn fetch<T>(&self, request: Request) -> ApiFuture<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.clone();
        Box::pin(async move { client.data(request).await })
    }

    fn execute(&self, request: Request) -> ApiFuture<()> {
        let client = self.clone();
        Box::pin(async move { client.call::<IgnoredAny>(request).await.map(|_| ()) })
    }

    fn fetch_json<T, B>(&self, method: Method, route: &str, body: &B) -> ApiFuture<T>
    where
        T: DeserializeOwned + Send + 'static,
        B: serde::Serialize,
    {
        match self.request(method, route).json(body) {
            Ok(request) => self.fetch(request),
            Err(e) => Box::pin(std::future::ready(Err(ApiError::Encode(e)))),
        }
    }
}

fn model_route(id: &ModelId, suffix: &str) -> String {
    format!("/models/{}{suffix}", urlencoding::encode(id.as_str()))
}

impl Marketplace for ApiClient {
    fn list_models(&self, query: PageQuery) -> ApiFuture<Page<Model>> {
        let route = format!("/models?{}", query.to_query_string());
        self.fetch(self.request(Method::Get, &route))
    }

    fn list_user_models(&self, user: UserId, query: PageQuery) -> ApiFuture<Page<Model>> {
        let route = format!(
            "/users/{}/models?{}",
            urlencoding::encode(user.as_str()),
            query.to_query_string()
        );
        self.fetch(self.request(Method::Get, &route))
    }

    fn get_model(&self, id: ModelId) -> ApiFuture<ModelDetail> {
        self.fetch(self.request(Method::Get, &model_route(&id, "")))
    }

    fn list_announcements(&self) -> ApiFuture<Vec<Announcement>> {
        self.fetch(self.request(Method::Get, "/announcements"))
    }

    fn list_favorites(&self, query: PageQuery) -> ApiFuture<Page<Favorite>> {
        let route = format!("/favorites?{}", query.to_query_string());
        self.fetch(self.request(Method::Get, &route))
    }

    fn create_model(&self, model: NewModel) -> ApiFuture<Model> {
        self.fetch_json(Method::Post, "/models", &model)
    }

    fn update_model(&self, id: ModelId, update: ModelUpdate) -> ApiFuture<Model> {
        self.fetch_json(Method::Put, &model_route(&id, ""), &update)
    }

    fn delete_model(&self, id: ModelId) -> ApiFuture<()> {
        self.execute(self.request(Method::Delete, &model_route(&id, "")))
    }

    fn add_favorite(&self, id: ModelId) -> ApiFuture<()> {
        self.execute(self.request(Method::Post, &model_route(&id, "/favorite")))
    }

    fn remove_favorite(&self, id: ModelId) -> ApiFuture<()> {
        self.execute(self.request(Method::Delete, &model_route(&id, "/favorite")))
    }

    fn record_download(&self, id: ModelId) -> ApiFuture<DownloadTicket> {
        self.fetch(self.request(Method::Post, &model_route(&id, "/download")))
    }
}

/// Reads one response from `stream`.
///
/// The body is delimited by chunked transfer coding, by `Content-Length`,
/// or by end of stream when neither is present.
async fn read_response<S>(stream: &mut S, limit: usize) -> Result<Response, ApiError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE.min(limit));

    loop {
        let bytes_read = stream.read_buf(&mut buf).await?;
        let eof = bytes_read == 0;

        if buf.len() > limit {
            return Err(ApiError::ResponseTooLarge { limit });
        }

        let (mut response, body_offset) = match Response::parse(&buf) {
            Ok(pair) => pair,
            Err(WireError::Incomplete) if eof => return Err(ApiError::Incomplete),
            Err(WireError::Incomplete) => continue,
            Err(e) => return Err(e.into()),
        };

        if response.is_chunked() {
            // A finished chunked body always ends in CRLF.
            if !eof && !buf.ends_with(b"\r\n") {
                continue;
            }
            match decode_chunked(&buf[body_offset..])? {
                Some(body) => {
                    response.set_body(body);
                    return Ok(response);
                }
                None if eof => return Err(ApiError::Incomplete),
                None => continue,
            }
        }

        match response.content_length() {
            Some(len) => {
                let total_needed = body_offset.saturating_add(len);
                if total_needed > limit {
                    return Err(ApiError::ResponseTooLarge { limit });
                }
                if buf.len() >= total_needed {
                    response.truncate_body(len);
                    return Ok(response);
                }
                if eof {
                    return Err(ApiError::Incomplete);
                }
            }
            None if eof => return Ok(response),
            None => {}
        }
    }
}

fn decode_envelope<T: DeserializeOwned>(response: &Response) -> Result<Option<T>, ApiError> {
    let status = response.status();

    if !status.is_success() {
        let message = response
            .json::<ApiResponse<IgnoredAny>>()
            .ok()
            .map(|envelope| envelope.message)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| response.reason().to_owned());
        return Err(ApiError::Status { status, message });
    }

    if response.body().is_empty() {
        return Ok(None);
    }

    let envelope: ApiResponse<T> = response.json()?;
    if !envelope.is_success() {
        return Err(ApiError::Backend {
            code: envelope.code,
            message: envelope.message,
        });
    }
    Ok(envelope.data)
}
