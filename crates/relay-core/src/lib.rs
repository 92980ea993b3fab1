//! # Relay Core
//!
//! Payload records exchanged with a chat relay backend.
//!
//! The relay client treats these as opaque serializable values: it encodes a
//! [`ChatQuery`] into the request body and decodes either a [`ChatResult`],
//! a sequence of [`ChatStreamResult`] frames, or an [`ApiErrorResponse`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod query;
pub mod result;
pub mod stream;

pub use error::{ApiError, ApiErrorResponse};
pub use query::{ChatMessage, ChatQuery, Role};
pub use result::{ChatChoice, ChatResult, ResponseMessage, Usage};
pub use stream::{ChatStreamResult, StreamChoice, StreamDelta};
