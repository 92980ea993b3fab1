//! Streaming session: one chunked HTTP exchange, framed and decoded.
//!
//! A session moves `Idle → Active → CompletedSuccess | CompletedError` and
//! never leaves a terminal state. Decoded frames go to `on_chunk` in wire
//! order; a frame that fails to decode goes to `on_error` and the session
//! keeps reading. The completion callback runs exactly once per started
//! session, after every frame available at end-of-stream was delivered.

use crate::error::{Error, Result};
use crate::request::OutboundRequest;
use crate::sse::{Frame, SseFramer};
use crate::transport::Transport;
use parking_lot::Mutex;
use relay_core::ApiErrorResponse;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Identity of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not started.
    Idle,
    /// Exchange in flight.
    Active,
    /// Stream ended normally.
    CompletedSuccess,
    /// Stream ended with an error.
    CompletedError,
}

impl SessionState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::CompletedSuccess | Self::CompletedError)
    }
}

/// Type-erased view of a session, as held by the registry.
pub trait SessionHandle: Send + Sync {
    /// Session identity.
    fn id(&self) -> SessionId;
    /// Current lifecycle state.
    fn state(&self) -> SessionState;
}

type ChunkHandler<T> = Box<dyn Fn(T) + Send + Sync>;
type ErrorHandler = Box<dyn Fn(Error) + Send + Sync>;
type CompletionHandler = Box<dyn FnOnce(SessionId, Option<Error>) + Send>;

/// One in-flight streaming exchange decoding frames into `T`.
pub struct StreamingSession<T> {
    id: SessionId,
    request: Mutex<Option<OutboundRequest>>,
    state: Mutex<SessionState>,
    on_chunk: ChunkHandler<T>,
    on_error: ErrorHandler,
    on_complete: Mutex<Option<CompletionHandler>>,
}

impl<T> StreamingSession<T> {
    /// Create an idle session for `request` with no-op callbacks.
    pub fn new(request: OutboundRequest) -> Self {
        Self {
            id: SessionId::new(),
            request: Mutex::new(Some(request)),
            state: Mutex::new(SessionState::Idle),
            on_chunk: Box::new(|_| {}),
            on_error: Box::new(|_| {}),
            on_complete: Mutex::new(None),
        }
    }

    /// Called with every decoded frame.
    #[must_use]
    pub fn on_chunk(mut self, f: impl Fn(T) + Send + Sync + 'static) -> Self {
        self.on_chunk = Box::new(f);
        self
    }

    /// Called for each frame that could not be decoded.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(Error) + Send + Sync + 'static) -> Self {
        self.on_error = Box::new(f);
        self
    }

    /// Called once when the exchange ends; `None` means success.
    #[must_use]
    pub fn on_complete(
        mut self,
        f: impl FnOnce(SessionId, Option<Error>) + Send + 'static,
    ) -> Self {
        *self.on_complete.get_mut() = Some(Box::new(f));
        self
    }

    /// Session identity.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Move to a terminal state and fire the completion callback.
    /// A no-op once the session is already terminal.
    pub(crate) fn finish(&self, error: Option<Error>) {
        let completion = {
            let mut state = self.state.lock();
            if state.is_terminal() {
                return;
            }
            *state = if error.is_some() {
                SessionState::CompletedError
            } else {
                SessionState::CompletedSuccess
            };
            self.on_complete.lock().take()
        };

        debug!(session = %self.id, failed = error.is_some(), "Streaming session completed");
        if let Some(complete) = completion {
            complete(self.id, error);
        }
    }
}

impl<T> StreamingSession<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Start the exchange on the current tokio runtime.
    ///
    /// Fails if the session was already started.
    pub fn start(self: &Arc<Self>, transport: Arc<dyn Transport>) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != SessionState::Idle {
                return Err(Error::streaming(format!(
                    "session {} already started",
                    self.id
                )));
            }
            *state = SessionState::Active;
        }
        let request = self
            .request
            .lock()
            .take()
            .ok_or_else(|| Error::streaming("session has no request"))?;

        debug!(session = %self.id, url = %request.url, "Streaming session started");
        let session = Arc::clone(self);
        tokio::spawn(async move { session.run(transport, request).await });
        Ok(())
    }

    async fn run(self: Arc<Self>, transport: Arc<dyn Transport>, request: OutboundRequest) {
        let guard = FinishOnDrop(self.as_ref());
        let outcome = self.exchange(transport.as_ref(), request).await;
        self.finish(outcome.err());
        drop(guard);
    }

    async fn exchange(&self, transport: &dyn Transport, request: OutboundRequest) -> Result<()> {
        let idle_timeout = request.timeout;
        let mut response = transport.open_stream(request).await?;
        if !response.is_success() {
            let status = response.status;
            let body = response.collect_body(idle_timeout).await?;
            return Err(match serde_json::from_slice::<ApiErrorResponse>(&body) {
                Ok(api) => Error::api(status, api),
                Err(_) => Error::Status {
                    status,
                    body: String::from_utf8_lossy(&body).into_owned(),
                },
            });
        }

        let mut framer = SseFramer::new();
        while let Some(bytes) = response.next_chunk(idle_timeout).await? {
            for frame in framer.push(&bytes) {
                self.deliver(frame);
            }
        }
        for frame in framer.finish() {
            self.deliver(frame);
        }
        Ok(())
    }

    fn deliver(&self, frame: Frame) {
        match frame {
            Frame::Data(payload) => match serde_json::from_str::<T>(&payload) {
                Ok(chunk) => {
                    trace!(session = %self.id, "Delivering chunk");
                    (self.on_chunk)(chunk);
                }
                Err(e) => {
                    trace!(session = %self.id, error = %e, "Undecodable frame");
                    let error = serde_json::from_str::<ApiErrorResponse>(&payload)
                        .map_or_else(|_| Error::Decode(e), Error::from);
                    (self.on_error)(error);
                }
            },
            Frame::Invalid(message) => (self.on_error)(Error::streaming(message)),
        }
    }
}

impl<T> SessionHandle for StreamingSession<T> {
    fn id(&self) -> SessionId {
        self.id
    }

    fn state(&self) -> SessionState {
        *self.state.lock()
    }
}

impl<T> fmt::Debug for StreamingSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingSession")
            .field("id", &self.id)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

/// Reports an abnormal end if the session task is torn down (panic or
/// runtime shutdown) before it finished on its own.
struct FinishOnDrop<'a, T>(&'a StreamingSession<T>);

impl<T> Drop for FinishOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0
            .finish(Some(Error::streaming("session ended before completion")));
    }
}
