// Auth interceptor
// Wraps a transport with base URL resolution, header merging, bearer
// auth and a single refresh-and-retry on 401

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode};
use std::sync::Arc;

use crate::auth::CredentialProvider;
use crate::config::{FetchxOptions, InterceptorConfig};
use crate::error::{FetchError, Result};
use crate::http_client::{error_kind, RequestConfig, Transport};
use crate::{filter, headers, resolver};

/// Request interceptor around an underlying transport
pub struct AuthInterceptor {
    config: InterceptorConfig,
    credentials: CredentialProvider,
    transport: Arc<dyn Transport>,
}

impl AuthInterceptor {
    /// Create an interceptor over `transport`
    ///
    /// Refresh-endpoint requests go straight to `transport`, bypassing the
    /// interceptor.
    pub fn new(options: FetchxOptions, transport: Arc<dyn Transport>) -> Self {
        let (config, credentials) = options.normalize(transport.clone());
        Self {
            config,
            credentials,
            transport,
        }
    }

    /// Send a request through the interceptor
    pub async fn request(&self, url: &str, config: RequestConfig) -> Result<Response> {
        if !filter::should_intercept(url, &self.config.exclude, &self.config.include) {
            if self.config.log {
                tracing::debug!(url = %url, "Passing request through untouched");
            }
            return self.transport.fetch(url, config).await;
        }

        let mut request_id = uuid::Uuid::new_v4().simple().to_string();
        request_id.truncate(8);
        let url = resolver::resolve(url, self.config.base_url.as_deref());

        let token = self.credentials.get_token().await;
        if self.config.log {
            tracing::debug!(
                request_id = %request_id,
                has_token = token.is_some(),
                "Token obtained"
            );
        }

        let merged = headers::merge(&self.config.headers, &config.headers, token.as_deref())?;
        let response = self.send(&request_id, &url, &config, merged, 1).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return self.finish(&request_id, &url, response).await;
        }

        if self.config.log {
            tracing::warn!(request_id = %request_id, "Received 401, attempting token refresh");
        }

        let Some(new_token) = self.credentials.refresh().await else {
            if self.config.log {
                tracing::warn!(
                    request_id = %request_id,
                    url = %url,
                    "No refreshed token available, returning 401 response"
                );
            }
            return Ok(response);
        };

        let retry_headers =
            headers::merge(&self.config.headers, &config.headers, Some(&new_token))?;
        let retry = self.send(&request_id, &url, &config, retry_headers, 2).await?;

        self.finish(&request_id, &url, retry).await
    }

    /// Issue one attempt with the given headers
    async fn send(
        &self,
        request_id: &str,
        url: &str,
        config: &RequestConfig,
        headers: HeaderMap,
        attempt: u32,
    ) -> Result<Response> {
        if self.config.log {
            tracing::debug!(
                request_id = %request_id,
                method = %config.method,
                url = %url,
                attempt = attempt,
                "Sending HTTP request"
            );
        }

        let request = RequestConfig {
            headers,
            ..config.clone()
        };

        match self.transport.fetch(url, request).await {
            Ok(response) => {
                if self.config.log {
                    tracing::info!("[fetchx] {} -> {}", url, response.status().as_u16());
                }
                Ok(response)
            }
            Err(e) => {
                if self.config.log {
                    match &e {
                        FetchError::Transport(inner) => tracing::error!(
                            request_id = %request_id,
                            error_kind = error_kind(inner),
                            error = %inner,
                            url = %url,
                            attempt = attempt,
                            "HTTP request error"
                        ),
                        other => tracing::error!(
                            request_id = %request_id,
                            error = %other,
                            url = %url,
                            attempt = attempt,
                            "HTTP request error"
                        ),
                    }
                }
                Err(e)
            }
        }
    }

    /// Turn the final response into the caller's outcome
    async fn finish(&self, request_id: &str, url: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() || status.is_redirection() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();

        if self.config.log {
            tracing::error!(
                request_id = %request_id,
                status = status.as_u16(),
                url = %url,
                response_body = %body,
                "HTTP request failed with error response"
            );
        }

        Err(FetchError::Http {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

#[async_trait]
impl Transport for AuthInterceptor {
    async fn fetch(&self, url: &str, config: RequestConfig) -> Result<Response> {
        self.request(url, config).await
    }
}
