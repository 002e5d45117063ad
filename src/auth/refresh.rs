// Token refresh via a refresh endpoint

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;

use super::credentials::CredentialStore;
use crate::http_client::{RequestConfig, Transport};

/// Response fields checked for a token, in order
pub const TOKEN_FIELDS: [&str; 3] = ["token", "accessToken", "access_token"];

/// Pull the first non-empty string token out of a refresh response body
pub fn extract_token(body: &Value) -> Option<String> {
    TOKEN_FIELDS.iter().find_map(|field| {
        body.get(field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Refresh strategy built from a refresh endpoint URL
///
/// Sends `POST <endpoint>` without a body or Authorization header. Cookies
/// held by the transport travel with it. The token found in the JSON
/// response is saved to the credential store under `token_key`.
pub struct EndpointRefresher {
    endpoint: String,
    token_key: String,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    log: bool,
}

impl EndpointRefresher {
    pub fn new(
        endpoint: String,
        token_key: String,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            endpoint,
            token_key,
            transport,
            store,
            log: false,
        }
    }

    /// Report store write failures through tracing
    pub fn with_log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request a new token and persist it
    ///
    /// A token that cannot be persisted is still returned.
    pub async fn refresh(&self) -> Result<Option<String>> {
        let response = self
            .transport
            .fetch(&self.endpoint, RequestConfig::post())
            .await
            .context("Failed to send refresh request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Refresh failed: {} - {}", status, error_text);
        }

        let data: Value = response
            .json()
            .await
            .context("Failed to parse refresh response")?;

        let token = extract_token(&data).with_context(|| {
            format!(
                "Refresh response does not contain any of {}",
                TOKEN_FIELDS.join(", ")
            )
        })?;

        if let Err(e) = self.store.try_set(&self.token_key, &token) {
            if self.log {
                tracing::warn!("Failed to persist refreshed token: {:#}", e);
            }
        }

        Ok(Some(token))
    }
}
