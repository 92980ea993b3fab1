//! Test helper utilities for integration tests

use chat_relay::{
    token_fn, BoxError, ChatQuery, ChatStreamResult, Client, Error, FirebaseConfig,
    FnTokenProvider, StaticToken, SupabaseConfig,
};
use once_cell::sync::Lazy;
use std::future::{ready, Ready};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Upper bound on how long a test waits for a terminal callback
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if let Ok(filter) = std::env::var("TEST_LOG") {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Client for a Firebase relay at `base_url`
pub fn firebase_client(base_url: &str, token: &str) -> Client {
    Client::new(FirebaseConfig::new(base_url, StaticToken::new(token)))
        .expect("Failed to create client")
}

/// Client for a Supabase relay at `base_url`
pub fn supabase_client(base_url: &str, token: &str, user_id: Option<&str>) -> Client {
    let mut config = SupabaseConfig::new(base_url, StaticToken::new(token));
    if let Some(user_id) = user_id {
        config = config.with_user_id_provider(StaticToken::new(user_id));
    }
    Client::new(config).expect("Failed to create client")
}

/// Provider that returns `value` and counts how often it was asked
pub fn counting_token(
    value: &'static str,
) -> (
    FnTokenProvider<impl Fn() -> Ready<Result<String, BoxError>> + Send + Sync>,
    Arc<AtomicUsize>,
) {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let provider = token_fn(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        ready(Ok::<_, BoxError>(value.to_string()))
    });
    (provider, count)
}

/// What one streaming call delivered
#[derive(Debug)]
pub struct StreamOutcome {
    /// Every `on_result` item in delivery order
    pub items: Vec<Result<ChatStreamResult, Error>>,
    /// The terminal callback argument
    pub terminal: Option<Error>,
    /// How many times the terminal callback fired
    pub terminal_calls: usize,
}

impl StreamOutcome {
    /// Concatenated content of the successful items
    pub fn content(&self) -> String {
        self.items
            .iter()
            .filter_map(|item| item.as_ref().ok())
            .map(ChatStreamResult::content)
            .collect()
    }

    /// Number of per-frame errors
    pub fn frame_errors(&self) -> usize {
        self.items.iter().filter(|item| item.is_err()).count()
    }
}

enum Event {
    Item(Result<ChatStreamResult, Error>),
    Terminal(Option<Error>),
}

/// Run a callback-style streaming call and record everything it delivered
pub async fn run_stream(client: &Client, query: ChatQuery) -> StreamOutcome {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let terminal_tx = tx.clone();

    client.chat_stream_with_callbacks(
        query,
        move |item| {
            let _ = tx.send(Event::Item(item));
        },
        move |error| {
            let _ = terminal_tx.send(Event::Terminal(error));
        },
    );

    let mut outcome = StreamOutcome {
        items: Vec::new(),
        terminal: None,
        terminal_calls: 0,
    };

    loop {
        match tokio::time::timeout(TEST_TIMEOUT, rx.recv()).await {
            Ok(Some(Event::Item(item))) => outcome.items.push(item),
            Ok(Some(Event::Terminal(error))) => {
                outcome.terminal_calls += 1;
                outcome.terminal = error;
                // Anything still queued arrived after the terminal callback.
                tokio::task::yield_now().await;
                while let Ok(event) = rx.try_recv() {
                    match event {
                        Event::Item(_) => panic!("item delivered after terminal callback"),
                        Event::Terminal(_) => outcome.terminal_calls += 1,
                    }
                }
                return outcome;
            }
            Ok(None) => return outcome,
            Err(_) => panic!("terminal callback did not fire within {TEST_TIMEOUT:?}"),
        }
    }
}
