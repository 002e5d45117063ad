use std::sync::Arc;

use super::credentials::CredentialStore;
use super::refresh::EndpointRefresher;
use super::types::{TokenGetter, TokenRefresher};

/// Where the current token comes from
pub(crate) enum TokenSource {
    /// Read from the credential store under `key`
    Store {
        store: Arc<dyn CredentialStore>,
        key: String,
    },
    Callable(TokenGetter),
}

/// How a fresh token is obtained after a 401
pub(crate) enum RefreshSource {
    /// No refresh configured, always yields no token
    Disabled,
    Callable(TokenRefresher),
    Endpoint(EndpointRefresher),
}

/// Supplies the current token and, on demand, a refreshed one
pub struct CredentialProvider {
    token: TokenSource,
    refresh: RefreshSource,
    log: bool,
}

impl CredentialProvider {
    pub(crate) fn new(token: TokenSource, refresh: RefreshSource, log: bool) -> Self {
        Self {
            token,
            refresh,
            log,
        }
    }

    /// Get the current token, if any
    ///
    /// An empty token counts as no token.
    pub async fn get_token(&self) -> Option<String> {
        let token = match &self.token {
            TokenSource::Store { store, key } => match store.try_get(key) {
                Ok(token) => token,
                Err(e) => {
                    if self.log {
                        tracing::warn!("Failed to read token from store: {:#}", e);
                    }
                    None
                }
            },
            TokenSource::Callable(getter) => getter.get().await,
        };
        token.filter(|t| !t.is_empty())
    }

    /// Attempt to obtain a fresh token
    ///
    /// Never fails: any error becomes `None`.
    pub async fn refresh(&self) -> Option<String> {
        let result = match &self.refresh {
            RefreshSource::Disabled => return None,
            RefreshSource::Callable(refresher) => refresher.refresh().await,
            RefreshSource::Endpoint(endpoint) => {
                if self.log {
                    tracing::debug!(endpoint = endpoint.endpoint(), "Requesting token from refresh endpoint");
                }
                endpoint.refresh().await
            }
        };

        match result {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                if self.log {
                    tracing::error!("Token refresh failed: {:#}", e);
                }
                None
            }
        }
    }

    /// Whether a refresh strategy is configured
    pub fn can_refresh(&self) -> bool {
        !matches!(self.refresh, RefreshSource::Disabled)
    }
}
