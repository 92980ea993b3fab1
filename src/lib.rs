//! # Chat Relay
//!
//! Client library for chat-completion relays that sit in front of an LLM API
//! and authenticate callers with a platform credential.
//!
//! ## Features
//!
//! - Two backends: Firebase functions (App Check header) and Supabase edge
//!   functions (bearer token, optional `user_id` in the body)
//! - Fresh credentials fetched for every request through a [`TokenProvider`]
//! - Single-shot and streaming chat completions, as futures, callbacks or a
//!   [`futures::Stream`]
//! - Server-sent event framing with per-frame error reporting
//! - Registry of in-flight streaming sessions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chat_relay::{ChatMessage, ChatQuery, Client, FirebaseConfig, token_fn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_relay::Error> {
//!     let client = Client::new(FirebaseConfig::new(
//!         "https://us-central1-my-app.cloudfunctions.net",
//!         token_fn(|| async { Ok("app-check-token".to_string()) }),
//!     ))?;
//!
//!     let query = ChatQuery::new("gpt-4o", vec![ChatMessage::user("Hello, world!")]);
//!     let result = client.chat(&query).await?;
//!
//!     println!("Response: {}", result.content());
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! ```rust,no_run
//! use chat_relay::{ChatMessage, ChatQuery, Client, SupabaseConfig, StaticToken};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_relay::Error> {
//!     let client = Client::new(
//!         SupabaseConfig::new("https://project.supabase.co/functions/v1", StaticToken::new("jwt"))
//!             .with_user_id_provider(StaticToken::new("user-42")),
//!     )?;
//!
//!     let query = ChatQuery::new("gpt-4o", vec![ChatMessage::user("Tell me a story")]);
//!     let mut stream = client.chat_stream(query);
//!
//!     while let Some(chunk) = stream.next().await {
//!         match chunk {
//!             Ok(chunk) => print!("{}", chunk.content()),
//!             Err(e) => eprintln!("Error: {}", e),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod client;
mod config;
mod credential;
mod error;
pub mod logging;
mod registry;
mod request;
mod session;
mod sse;
mod streaming;
mod transport;


pub use client::{Client, ClientBuilder};
pub use config::{Backend, FirebaseConfig, SupabaseConfig, DEFAULT_CHAT_PATH, DEFAULT_TIMEOUT};
pub use credential::{
    token_fn, CallbackTokenProvider, Credential, FnTokenProvider, StaticToken, TokenCallback,
    TokenProvider,
};
pub use error::{BoxError, Error, Result};
pub use registry::SessionRegistry;
pub use request::{
    FirebaseRequestBuilder, OutboundRequest, RequestBuilder, SupabaseRequestBuilder,
    APP_CHECK_HEADER, USER_ID_FIELD,
};
pub use session::{SessionHandle, SessionId, SessionState, StreamingSession};
pub use sse::{Frame, SseFramer, DONE_SENTINEL};
pub use streaming::{ChatStream, StreamSummary};
pub use transport::{ByteStream, ReqwestTransport, StreamResponse, Transport, TransportResponse};

// Re-export payload types for convenience
pub use relay_core::{
    ApiError, ApiErrorResponse, ChatChoice, ChatMessage, ChatQuery, ChatResult, ChatStreamResult,
    ResponseMessage, Role, StreamChoice, StreamDelta, Usage,
};
