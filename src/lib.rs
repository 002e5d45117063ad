// fetchx - HTTP request interceptor with bearer auth and one-shot 401 refresh

pub mod auth;
pub mod config;
pub mod error;
pub mod filter;
pub mod headers;
pub mod http_client;
pub mod install;
pub mod interceptor;
pub mod resolver;

pub use auth::{CredentialStore, MemoryStore, RefreshToken, SqliteStore, TokenGetter, TokenRefresher};
pub use config::{FetchxOptions, InterceptorConfig};
pub use error::{FetchError, Result};
pub use http_client::{ReqwestTransport, RequestConfig, Transport};
pub use install::{fetch, install, InstallHandle};
pub use interceptor::AuthInterceptor;
