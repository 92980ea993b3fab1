//! HTTP transport seam.
//!
//! The relay never talks to sockets itself; it hands an [`OutboundRequest`]
//! to a [`Transport`]. [`ReqwestTransport`] is the default.

use crate::error::{Error, Result};
use crate::request::OutboundRequest;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, trace};

/// Stream of raw body bytes.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Fully read single-shot response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw body.
    pub body: Bytes,
}

/// Streaming response whose body arrives incrementally.
pub struct StreamResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body chunks in arrival order.
    pub body: ByteStream,
}

impl StreamResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Next body chunk, or `None` at end of body.
    ///
    /// Fails with a connection error if nothing arrives within `idle_timeout`.
    pub async fn next_chunk(&mut self, idle_timeout: Duration) -> Result<Option<Bytes>> {
        match tokio::time::timeout(idle_timeout, self.body.next()).await {
            Ok(chunk) => chunk.transpose(),
            Err(_) => Err(Error::connection(format!(
                "no data received for {}ms",
                idle_timeout.as_millis()
            ))),
        }
    }

    /// Drain the remaining body into one buffer, bounding each read by
    /// `idle_timeout`.
    pub async fn collect_body(mut self, idle_timeout: Duration) -> Result<Bytes> {
        let mut buffer = Vec::new();
        while let Some(chunk) = self.next_chunk(idle_timeout).await? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buffer))
    }
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Executes outbound requests on the host HTTP stack.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a request and read the whole body.
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse>;

    /// Issue a request and return once response headers arrive.
    async fn open_stream(&self, request: OutboundRequest) -> Result<StreamResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse> {
        (**self).send(request).await
    }

    async fn open_stream(&self, request: OutboundRequest) -> Result<StreamResponse> {
        (**self).open_stream(request).await
    }
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a default client.
    ///
    /// Fails if the HTTP client (TLS backend included) cannot be initialized.
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::configuration(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Reuse an existing client (connection pool, TLS, proxy settings).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn request(&self, request: OutboundRequest) -> reqwest::RequestBuilder {
        self.http
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse> {
        let timeout = request.timeout;
        debug!(url = %request.url, "Sending request");

        let response = self.request(request).timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        trace!(status, bytes = body.len(), "Received response");
        Ok(TransportResponse { status, body })
    }

    async fn open_stream(&self, request: OutboundRequest) -> Result<StreamResponse> {
        let timeout = request.timeout;
        debug!(url = %request.url, "Opening stream");

        // Bounds the wait for headers; body reads are bounded per chunk by
        // the session.
        let response = tokio::time::timeout(timeout, self.request(request).send())
            .await
            .map_err(|_| {
                Error::connection(format!(
                    "no response headers within {}ms",
                    timeout.as_millis()
                ))
            })??;

        let status = response.status().as_u16();
        trace!(status, "Stream opened");

        Ok(StreamResponse {
            status,
            body: response.bytes_stream().map(|r| r.map_err(Error::from)).boxed(),
        })
    }
}
