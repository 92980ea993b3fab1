//! Credential acquisition.
//!
//! Every call fetches a fresh token from the configured [`TokenProvider`];
//! caching, if wanted, belongs inside the provider.

use crate::error::{BoxError, Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Asynchronous source of a credential string.
///
/// Used for both the authentication token and, on backends that take one,
/// the secondary user identifier.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Produce a value for one outbound request.
    async fn fetch(&self) -> std::result::Result<String, BoxError>;
}

#[async_trait]
impl<P: TokenProvider + ?Sized> TokenProvider for Arc<P> {
    async fn fetch(&self) -> std::result::Result<String, BoxError> {
        (**self).fetch().await
    }
}

/// Token and optional secondary identifier for one request.
pub struct Credential {
    token: SecretString,
    user_id: Option<String>,
}

impl Credential {
    /// Create a credential from a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
            user_id: None,
        }
    }

    /// Attach a secondary identifier.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// The raw token, for header injection.
    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// The secondary identifier, if one was fetched.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Fetch a token, then (only if `user_id` is given) the secondary id.
    pub(crate) async fn acquire(
        token: &dyn TokenProvider,
        user_id: Option<&dyn TokenProvider>,
    ) -> Result<Self> {
        let mut credential = Self::new(token.fetch().await.map_err(Error::Credential)?);
        if let Some(provider) = user_id {
            credential.user_id = Some(provider.fetch().await.map_err(Error::Credential)?);
        }
        Ok(credential)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// A fixed token, for tests and long-lived service keys.
#[derive(Clone)]
pub struct StaticToken(SecretString);

impl StaticToken {
    /// Wrap a token value.
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::new(token.into()))
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken([REDACTED])")
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn fetch(&self) -> std::result::Result<String, BoxError> {
        Ok(self.0.expose_secret().clone())
    }
}

/// Provider backed by an async closure. See [`token_fn`].
pub struct FnTokenProvider<F> {
    f: F,
}

/// Build a provider from an async closure.
///
/// ```rust
/// use chat_relay::token_fn;
///
/// let provider = token_fn(|| async { Ok("app-check-token".to_string()) });
/// # let _ = provider;
/// ```
pub fn token_fn<F, Fut>(f: F) -> FnTokenProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<String, BoxError>> + Send,
{
    FnTokenProvider { f }
}

#[async_trait]
impl<F, Fut> TokenProvider for FnTokenProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<String, BoxError>> + Send,
{
    async fn fetch(&self) -> std::result::Result<String, BoxError> {
        (self.f)().await
    }
}

/// One-shot completion handed to a [`CallbackTokenProvider`] factory.
pub type TokenCallback = Box<dyn FnOnce(String) + Send>;

/// Adapts a completion-callback token factory.
///
/// Platform attestation SDKs typically hand out tokens through a callback
/// rather than a future. The factory receives a [`TokenCallback`] and must
/// invoke it once; if it drops the callback instead, the fetch fails rather
/// than hanging.
pub struct CallbackTokenProvider<F> {
    factory: F,
}

impl<F> CallbackTokenProvider<F>
where
    F: Fn(TokenCallback) + Send + Sync,
{
    /// Wrap a callback-style token factory.
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl<F> TokenProvider for CallbackTokenProvider<F>
where
    F: Fn(TokenCallback) + Send + Sync,
{
    async fn fetch(&self) -> std::result::Result<String, BoxError> {
        let (tx, rx) = oneshot::channel();
        (self.factory)(Box::new(move |token| {
            let _ = tx.send(token);
        }));
        rx.await
            .map_err(|_| "token factory dropped its callback without a token".into())
    }
}
