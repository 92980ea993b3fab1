//! Mock relay backends for integration testing
//!
//! Wiremock servers that answer `POST /chat` the way a Firebase function or a
//! Supabase edge function in front of an LLM API would.

use crate::fixtures::{chat_response, error_body};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Mock relay server
pub struct MockRelay {
    pub server: MockServer,
    chat_path: String,
}

impl MockRelay {
    /// Start a relay whose chat endpoint is `/chat`
    pub async fn new() -> Self {
        Self::with_prefix("").await
    }

    /// Start a relay whose chat endpoint is `<prefix>/chat`
    pub async fn with_prefix(prefix: &str) -> Self {
        Self {
            server: MockServer::start().await,
            chat_path: format!("{prefix}/chat"),
        }
    }

    /// Base URL to configure a client with
    pub fn url(&self) -> String {
        let prefix = self.chat_path.trim_end_matches("/chat");
        format!("{}{}", self.server.uri(), prefix)
    }

    /// Every request the relay received, in arrival order
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Number of requests received
    pub async fn calls(&self) -> usize {
        self.requests().await.len()
    }

    fn chat(&self) -> wiremock::MockBuilder {
        Mock::given(method("POST")).and(path(self.chat_path.as_str()))
    }

    /// Setup a successful completion for any request
    pub async fn mock_chat(&self, model: &str, content: &str) {
        self.chat()
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_response(model, content))
                    .append_header("Content-Type", "application/json"),
            )
            .mount(&self.server)
            .await;
    }

    /// Setup a completion that only answers when `name: value` is present
    pub async fn mock_chat_requiring_header(&self, name: &str, value: &str, content: &str) {
        self.chat()
            .and(header(name, value))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("gpt-4o", content)))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Setup a completion that only answers when the body carries `user_id`
    pub async fn mock_chat_for_user(&self, user_id: &str, content: &str) {
        self.chat()
            .and(body_partial_json(json!({ "user_id": user_id })))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("gpt-4o", content)))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Setup a completion that returns after a delay
    pub async fn mock_chat_delayed(&self, content: &str, delay: Duration) {
        self.chat()
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_response("gpt-4o", content))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Setup a structured error response
    pub async fn mock_error(&self, status: u16, error_type: &str, message: &str) {
        self.chat()
            .respond_with(ResponseTemplate::new(status).set_body_json(error_body(error_type, message)))
            .mount(&self.server)
            .await;
    }

    /// Setup a zero-length body
    pub async fn mock_empty(&self, status: u16) {
        self.chat()
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Setup an arbitrary raw body
    pub async fn mock_raw(&self, status: u16, body: &str) {
        self.chat()
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Setup a server-sent event stream for streaming requests
    pub async fn mock_stream(&self, body: String) {
        self.chat()
            .and(body_partial_json(json!({ "stream": true })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .append_header("Content-Type", "text/event-stream"),
            )
            .mount(&self.server)
            .await;
    }

    /// Setup a non-success answer to a streaming request
    pub async fn mock_stream_failure(&self, status: u16, body: Value) {
        self.chat()
            .and(body_partial_json(json!({ "stream": true })))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}

/// Header value of a received request, if present and valid UTF-8
pub fn header_value<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

/// Body of a received request as JSON
pub fn body_json(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap_or(Value::Null)
}

/// Relay that answers with 200 headers and `first_frame`, then keeps the
/// connection open without sending anything else. Returns its base URL.
pub async fn stalling_relay(first_frame: String) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stalling relay");
    let addr = listener.local_addr().expect("Failed to read local address");

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let frame = first_frame.clone();
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n{:x}\r\n{frame}\r\n",
                    frame.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(3600)).await;
                drop(socket);
            });
        }
    });

    format!("http://{addr}")
}
