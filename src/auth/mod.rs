// Authentication module
// Token retrieval, refresh strategies and credential storage

mod credentials;
mod provider;
mod refresh;
mod types;

pub use credentials::{CredentialStore, MemoryStore, SqliteStore};
pub use provider::CredentialProvider;
pub(crate) use provider::{RefreshSource, TokenSource};
pub use refresh::{extract_token, EndpointRefresher, TOKEN_FIELDS};
pub use types::{RefreshToken, TokenGetter, TokenRefresher};
