//! Backend configuration.
//!
//! Exactly one [`Backend`] variant drives a client. Configuration is plain
//! in-process data: nothing is read from files or the environment.

use crate::credential::TokenProvider;
use crate::error::{Error, Result};
use crate::request::{FirebaseRequestBuilder, RequestBuilder, SupabaseRequestBuilder};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default request timeout (60 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Path of the chat endpoint, appended to the base URL.
pub const DEFAULT_CHAT_PATH: &str = "/chat";

/// Gateway A: Firebase functions guarded by App Check.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// App Check token source
    pub(crate) token_provider: Arc<dyn TokenProvider>,
    /// Functions base URL
    pub(crate) base_url: String,
    /// Request timeout
    pub(crate) timeout: Duration,
}

impl FirebaseConfig {
    /// Create a configuration with the default timeout.
    pub fn new(base_url: impl Into<String>, token_provider: impl TokenProvider + 'static) -> Self {
        Self {
            token_provider: Arc::new(token_provider),
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Gateway B: Supabase edge functions with bearer auth.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Access token source
    pub(crate) token_provider: Arc<dyn TokenProvider>,
    /// Optional source of the `user_id` body field
    pub(crate) user_id_provider: Option<Arc<dyn TokenProvider>>,
    /// Functions base URL
    pub(crate) base_url: String,
    /// Request timeout
    pub(crate) timeout: Duration,
}

impl SupabaseConfig {
    /// Create a configuration with the default timeout and no user id.
    pub fn new(base_url: impl Into<String>, token_provider: impl TokenProvider + 'static) -> Self {
        Self {
            token_provider: Arc::new(token_provider),
            user_id_provider: None,
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Send a `user_id` fetched from `provider` with every request.
    #[must_use]
    pub fn with_user_id_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.user_id_provider = Some(Arc::new(provider));
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("has_user_id_provider", &self.user_id_provider.is_some())
            .finish_non_exhaustive()
    }
}

/// The gateway a client talks to.
#[derive(Debug, Clone)]
pub enum Backend {
    /// App Check header authentication.
    Firebase(FirebaseConfig),
    /// Bearer authentication with optional `user_id`.
    Supabase(SupabaseConfig),
}

impl Backend {
    /// Short backend name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Firebase(_) => "firebase",
            Self::Supabase(_) => "supabase",
        }
    }

    /// Configured base URL, as given.
    pub fn base_url(&self) -> &str {
        match self {
            Self::Firebase(c) => &c.base_url,
            Self::Supabase(c) => &c.base_url,
        }
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        match self {
            Self::Firebase(c) => c.timeout,
            Self::Supabase(c) => c.timeout,
        }
    }

    pub(crate) fn token_provider(&self) -> &dyn TokenProvider {
        match self {
            Self::Firebase(c) => c.token_provider.as_ref(),
            Self::Supabase(c) => c.token_provider.as_ref(),
        }
    }

    /// Secondary identifier source; only Supabase has one.
    pub(crate) fn user_id_provider(&self) -> Option<&dyn TokenProvider> {
        match self {
            Self::Firebase(_) => None,
            Self::Supabase(c) => c.user_id_provider.as_deref(),
        }
    }

    pub(crate) fn request_builder(&self) -> Box<dyn RequestBuilder> {
        match self {
            Self::Firebase(_) => Box::new(FirebaseRequestBuilder),
            Self::Supabase(_) => Box::new(SupabaseRequestBuilder),
        }
    }

    /// Join `path` onto the base URL.
    ///
    /// The path is appended to whatever path the base already has, so
    /// `https://host/api` + `/chat` is `https://host/api/chat`.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url().trim_end_matches('/');
        let url = Url::parse(&format!("{base}{path}")).map_err(|e| {
            Error::configuration(format!("Invalid base URL '{}': {e}", self.base_url()))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration(format!(
                "Unsupported URL scheme '{}' in base URL",
                url.scheme()
            )));
        }
        Ok(url)
    }
}

impl From<FirebaseConfig> for Backend {
    fn from(config: FirebaseConfig) -> Self {
        Self::Firebase(config)
    }
}

impl From<SupabaseConfig> for Backend {
    fn from(config: SupabaseConfig) -> Self {
        Self::Supabase(config)
    }
}
