//! Dispatcher client.

use crate::config::{Backend, DEFAULT_CHAT_PATH};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::registry::SessionRegistry;
use crate::request::{OutboundRequest, RequestBuilder};
use crate::session::{SessionId, StreamingSession};
use crate::streaming::ChatStream;
use crate::transport::{ReqwestTransport, Transport, TransportResponse};
use futures::channel::mpsc;
use futures::stream::{self, StreamExt};
use relay_core::{ApiErrorResponse, ChatQuery, ChatResult, ChatStreamResult};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, debug_span, field, instrument, Instrument, Span};
use url::Url;

/// Client for a chat relay gateway.
///
/// Every call fetches fresh credentials, builds one request for the
/// configured backend and sends it once. Failures are returned, never
/// retried.
///
/// # Example
///
/// ```rust,no_run
/// use chat_relay::{ChatMessage, ChatQuery, Client, SupabaseConfig, StaticToken};
///
/// #[tokio::main]
/// async fn main() -> Result<(), chat_relay::Error> {
///     let client = Client::new(SupabaseConfig::new(
///         "https://project.supabase.co/functions/v1",
///         StaticToken::new("access-token"),
///     ))?;
///
///     let query = ChatQuery::new("gpt-4o", vec![ChatMessage::user("Hello!")]);
///     let result = client.chat(&query).await?;
///
///     println!("{}", result.content());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    backend: Backend,
    builder: Box<dyn RequestBuilder>,
    chat_url: Url,
    transport: Arc<dyn Transport>,
    sessions: Arc<SessionRegistry>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client for `backend` over the default transport.
    pub fn new(backend: impl Into<Backend>) -> Result<Self> {
        Self::builder().backend(backend).build()
    }

    /// The configured backend.
    pub fn backend(&self) -> &Backend {
        &self.inner.backend
    }

    /// Endpoint every request is sent to.
    pub fn chat_url(&self) -> &Url {
        &self.inner.chat_url
    }

    /// Number of streaming sessions still in flight.
    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Registry of in-flight streaming sessions.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    /// Send a chat completion request and decode the reply.
    ///
    /// An empty body is [`Error::EmptyResponse`] whatever the status. A body
    /// that is not a [`ChatResult`] but is an error envelope becomes
    /// [`Error::Api`]; anything else is [`Error::Decode`].
    #[instrument(skip(self, query), fields(model = %query.model, backend = self.inner.backend.name()))]
    pub async fn chat(&self, query: &ChatQuery) -> Result<ChatResult> {
        let request = self.prepare(query).await?;

        debug!(url = %request.url, "Sending chat request");
        let response = self.inner.transport.send(request).await?;

        decode_response(&response)
    }

    /// Callback form of [`chat`](Self::chat), run on the current tokio
    /// runtime. `completion` is called exactly once.
    pub fn chat_with_callback<F>(&self, query: ChatQuery, completion: F)
    where
        F: FnOnce(Result<ChatResult>) + Send + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move {
            completion(client.chat(&query).await);
        });
    }

    /// Start a streaming chat completion on the current tokio runtime.
    ///
    /// `on_result` sees every decoded chunk as `Ok` in wire order and every
    /// frame that failed to decode as `Err`. `on_complete` runs exactly once
    /// after the last `on_result` call, with `None` on a clean end of
    /// stream. By then the session has left the registry.
    pub fn chat_stream_with_callbacks<R, C>(&self, query: ChatQuery, on_result: R, on_complete: C)
    where
        R: Fn(Result<ChatStreamResult>) + Send + Sync + 'static,
        C: FnOnce(Option<Error>) + Send + 'static,
    {
        let span = debug_span!(
            "chat_stream",
            model = %query.model,
            backend = self.inner.backend.name(),
            session = field::Empty,
        );
        let client = self.clone();

        tokio::spawn(
            async move {
                match client.prepare(&query.make_streamable()).await {
                    Ok(request) => {
                        client.start_session(request, on_result, on_complete);
                    }
                    Err(e) => {
                        debug!(error = %e, "Streaming request not sent");
                        on_complete(Some(e));
                    }
                }
            }
            .instrument(span),
        );
    }

    /// Stream a chat completion.
    ///
    /// Nothing is sent until the stream is first polled. Per-frame decode
    /// failures appear as `Err` items and the stream carries on; a
    /// terminating failure is the last item.
    ///
    /// ```rust,no_run
    /// # use chat_relay::{ChatMessage, ChatQuery, Client};
    /// use futures::StreamExt;
    ///
    /// # async fn example(client: &Client) {
    /// let query = ChatQuery::new("gpt-4o", vec![ChatMessage::user("Tell me a story")]);
    /// let mut stream = client.chat_stream(query);
    ///
    /// while let Some(chunk) = stream.next().await {
    ///     match chunk {
    ///         Ok(chunk) => print!("{}", chunk.content()),
    ///         Err(e) => eprintln!("Error: {e}"),
    ///     }
    /// }
    /// # }
    /// ```
    pub fn chat_stream(&self, query: ChatQuery) -> ChatStream {
        let client = self.clone();
        let receiver = stream::once(async move {
            let (tx, rx) = mpsc::unbounded();
            let done = tx.clone();
            client.chat_stream_with_callbacks(
                query,
                move |item| {
                    let _ = tx.unbounded_send(item);
                },
                move |error| {
                    if let Some(e) = error {
                        let _ = done.unbounded_send(Err(e));
                    }
                    done.close_channel();
                },
            );
            rx
        });

        ChatStream::new(receiver.flatten())
    }

    /// Acquire credentials and build the request for `query`.
    async fn prepare(&self, query: &ChatQuery) -> Result<OutboundRequest> {
        let inner = &self.inner;
        let credential = Credential::acquire(
            inner.backend.token_provider(),
            inner.backend.user_id_provider(),
        )
        .await?;

        let payload = serde_json::to_value(query).map_err(Error::Encode)?;
        let extra_fields = inner.builder.extra_fields(&credential);
        let request = inner.builder.build(
            payload,
            &inner.chat_url,
            &credential,
            inner.backend.timeout(),
            extra_fields,
        )?;

        debug!(builder = inner.builder.name(), stream = query.stream, "Request built");
        Ok(request)
    }

    /// Register and start a session that deregisters itself on completion.
    fn start_session<R, C>(&self, request: OutboundRequest, on_result: R, on_complete: C) -> SessionId
    where
        R: Fn(Result<ChatStreamResult>) + Send + Sync + 'static,
        C: FnOnce(Option<Error>) + Send + 'static,
    {
        let on_chunk = Arc::new(on_result);
        let on_error = Arc::clone(&on_chunk);
        let registry = Arc::downgrade(&self.inner.sessions);

        let session = Arc::new(
            StreamingSession::<ChatStreamResult>::new(request)
                .on_chunk(move |chunk| on_chunk(Ok(chunk)))
                .on_error(move |e| on_error(Err(e)))
                .on_complete(move |id, error| {
                    if let Some(registry) = registry.upgrade() {
                        registry.remove_all(id);
                    }
                    on_complete(error);
                }),
        );

        let id = session.id();
        Span::current().record("session", field::display(id));
        self.inner.sessions.add(session.clone());

        if let Err(e) = session.start(Arc::clone(&self.inner.transport)) {
            session.finish(Some(e));
        }
        id
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("backend", &self.inner.backend)
            .field("chat_url", &self.inner.chat_url.as_str())
            .field("sessions", &self.inner.sessions)
            .finish_non_exhaustive()
    }
}

/// Decode a single-shot response body.
fn decode_response<T: DeserializeOwned>(response: &TransportResponse) -> Result<T> {
    if response.body.is_empty() {
        return Err(Error::EmptyResponse);
    }

    serde_json::from_slice::<T>(&response.body).or_else(|e| {
        match serde_json::from_slice::<ApiErrorResponse>(&response.body) {
            Ok(api) => Err(Error::api(response.status, api)),
            Err(_) => Err(Error::Decode(e)),
        }
    })
}

/// Builder for creating a [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    backend: Option<Backend>,
    transport: Option<Arc<dyn Transport>>,
    chat_path: Option<String>,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend. Required.
    #[must_use]
    pub fn backend(mut self, backend: impl Into<Backend>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    /// Use a custom transport instead of [`ReqwestTransport`].
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Override the endpoint path appended to the base URL.
    #[must_use]
    pub fn chat_path(mut self, path: impl Into<String>) -> Self {
        self.chat_path = Some(path.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        let backend = self
            .backend
            .ok_or_else(|| Error::configuration("backend is required"))?;
        let chat_url = backend.endpoint(self.chat_path.as_deref().unwrap_or(DEFAULT_CHAT_PATH))?;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        debug!(backend = backend.name(), url = %chat_url, "Client created");

        Ok(Client {
            inner: Arc::new(ClientInner {
                builder: backend.request_builder(),
                backend,
                chat_url,
                transport,
                sessions: Arc::new(SessionRegistry::new()),
            }),
        })
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("backend", &self.backend)
            .field("custom_transport", &self.transport.is_some())
            .field("chat_path", &self.chat_path)
            .finish()
    }
}
