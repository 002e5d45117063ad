// Authentication types

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type GetterFn = dyn Fn() -> BoxFuture<'static, Option<String>> + Send + Sync;
type RefresherFn = dyn Fn() -> BoxFuture<'static, anyhow::Result<Option<String>>> + Send + Sync;

/// Caller-supplied source of the current token
#[derive(Clone)]
pub struct TokenGetter(Arc<GetterFn>);

impl TokenGetter {
    /// Wrap a synchronous getter
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        Self(Arc::new(move || futures::future::ready(f()).boxed()))
    }

    /// Wrap an asynchronous getter
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        Self(Arc::new(move || f().boxed()))
    }

    pub async fn get(&self) -> Option<String> {
        (self.0)().await
    }
}

impl fmt::Debug for TokenGetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenGetter(..)")
    }
}

/// Caller-supplied refresh logic, run once after a 401
///
/// Errors are swallowed by the credential provider and treated as "no token".
#[derive(Clone)]
pub struct TokenRefresher(Arc<RefresherFn>);

impl TokenRefresher {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<String>>> + Send + 'static,
    {
        Self(Arc::new(move || f().boxed()))
    }

    pub async fn refresh(&self) -> anyhow::Result<Option<String>> {
        (self.0)().await
    }
}

impl fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenRefresher(..)")
    }
}

/// How a fresh token is obtained after a 401
#[derive(Debug, Clone)]
pub enum RefreshToken {
    /// POST to this URL and read the token from the JSON response
    Endpoint(String),

    /// Custom refresh logic
    Callable(TokenRefresher),
}

impl From<&str> for RefreshToken {
    fn from(endpoint: &str) -> Self {
        RefreshToken::Endpoint(endpoint.to_string())
    }
}

impl From<String> for RefreshToken {
    fn from(endpoint: String) -> Self {
        RefreshToken::Endpoint(endpoint)
    }
}

impl From<TokenRefresher> for RefreshToken {
    fn from(refresher: TokenRefresher) -> Self {
        RefreshToken::Callable(refresher)
    }
}

// Only the endpoint form can come from a config file
impl<'de> Deserialize<'de> for RefreshToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(RefreshToken::Endpoint)
    }
}
