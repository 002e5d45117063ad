use anyhow::{Context, Result};
use clap::Parser;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::{
    CredentialProvider, CredentialStore, EndpointRefresher, MemoryStore, RefreshSource,
    RefreshToken, TokenGetter, TokenSource,
};
use crate::http_client::Transport;
use crate::resolver;

/// Default credential store key
pub const DEFAULT_TOKEN_KEY: &str = "token";

/// Raw interceptor options, every field optional
///
/// The serializable subset can be loaded from a config file; callables and
/// the credential store are set in code.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchxOptions {
    /// Base URL prepended to relative routes
    #[serde(rename = "baseURL", alias = "baseUrl", alias = "baseurl")]
    pub base_url: Option<String>,

    /// URL substrings to intercept (absent = all)
    pub include: Option<Vec<String>>,

    /// URL substrings to pass through untouched
    pub exclude: Option<Vec<String>>,

    /// Headers added to every intercepted request
    pub headers: Option<BTreeMap<String, String>>,

    /// Current token source (absent = read the store under `token_key`)
    #[serde(skip)]
    pub get_token: Option<TokenGetter>,

    /// Refresh strategy run once after a 401 (absent = none)
    #[serde(alias = "refreshtoken")]
    pub refresh_token: Option<RefreshToken>,

    /// Credential store key
    #[serde(alias = "tokenkey")]
    pub token_key: Option<String>,

    /// Emit diagnostics for intercepted requests
    pub log: Option<bool>,

    /// Credential store (absent = in-memory)
    #[serde(skip)]
    pub store: Option<Arc<dyn CredentialStore>>,
}

impl fmt::Debug for FetchxOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchxOptions")
            .field("base_url", &self.base_url)
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field("headers", &self.headers)
            .field("get_token", &self.get_token)
            .field("refresh_token", &self.refresh_token)
            .field("token_key", &self.token_key)
            .field("log", &self.log)
            .field("store", &self.store.as_ref().map(|_| ".."))
            .finish()
    }
}

impl FetchxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn get_token(mut self, getter: TokenGetter) -> Self {
        self.get_token = Some(getter);
        self
    }

    pub fn refresh_token(mut self, refresh: impl Into<RefreshToken>) -> Self {
        self.refresh_token = Some(refresh.into());
        self
    }

    pub fn token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = Some(key.into());
        self
    }

    pub fn log(mut self, enabled: bool) -> Self {
        self.log = Some(enabled);
        self
    }

    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Load options from a TOML/JSON/YAML file (format picked by extension)
    pub fn from_file(path: &Path) -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .with_context(|| format!("Failed to read config file: {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Overlay every field set in `other` onto `self`
    pub fn merge(mut self, other: FetchxOptions) -> Self {
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.include.is_some() {
            self.include = other.include;
        }
        if other.exclude.is_some() {
            self.exclude = other.exclude;
        }
        if let Some(headers) = other.headers {
            self.headers
                .get_or_insert_with(BTreeMap::new)
                .extend(headers);
        }
        if other.get_token.is_some() {
            self.get_token = other.get_token;
        }
        if other.refresh_token.is_some() {
            self.refresh_token = other.refresh_token;
        }
        if other.token_key.is_some() {
            self.token_key = other.token_key;
        }
        if other.log.is_some() {
            self.log = other.log;
        }
        if other.store.is_some() {
            self.store = other.store;
        }
        self
    }

    /// Resolve options into the canonical config and credential provider
    ///
    /// `transport` carries refresh-endpoint requests.
    pub fn normalize(self, transport: Arc<dyn Transport>) -> (InterceptorConfig, CredentialProvider) {
        let config = InterceptorConfig {
            base_url: self.base_url,
            include: self.include.unwrap_or_default(),
            exclude: self.exclude.unwrap_or_default(),
            headers: header_map(self.headers.unwrap_or_default()),
            token_key: self
                .token_key
                .unwrap_or_else(|| DEFAULT_TOKEN_KEY.to_string()),
            log: self.log.unwrap_or(false),
        };

        let store: Arc<dyn CredentialStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };

        let token = match self.get_token {
            Some(getter) => TokenSource::Callable(getter),
            None => TokenSource::Store {
                store: store.clone(),
                key: config.token_key.clone(),
            },
        };

        let refresh = match self.refresh_token {
            None => RefreshSource::Disabled,
            Some(RefreshToken::Callable(refresher)) => RefreshSource::Callable(refresher),
            Some(RefreshToken::Endpoint(endpoint)) => {
                RefreshSource::Endpoint(EndpointRefresher::new(
                    resolver::resolve(&endpoint, config.base_url.as_deref()),
                    config.token_key.clone(),
                    transport,
                    store,
                )
                .with_log(config.log))
            }
        };

        let provider = CredentialProvider::new(token, refresh, config.log);
        (config, provider)
    }
}

/// Canonical interceptor configuration with defaults applied
#[derive(Debug, Clone)]
pub struct InterceptorConfig {
    pub base_url: Option<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub headers: HeaderMap,
    pub token_key: String,
    pub log: bool,
}

/// Convert configured headers, skipping entries that are not valid HTTP headers
fn header_map(headers: BTreeMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::warn!("Skipping invalid default header: {}", name),
        }
    }
    map
}

/// fetchx - send a request through the auth interceptor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Request URL (relative URLs are resolved against --base-url)
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request header ("Name: value"), repeatable
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Request body
    #[arg(short, long)]
    pub data: Option<String>,

    /// Print response status and headers
    #[arg(short, long)]
    pub include_headers: bool,

    /// Config file (TOML, JSON or YAML)
    #[arg(short, long, env = "FETCHX_CONFIG")]
    pub config: Option<String>,

    /// Base URL prepended to relative routes
    #[arg(long, env = "FETCHX_BASE_URL")]
    pub base_url: Option<String>,

    /// URL substrings to intercept
    #[arg(long, env = "FETCHX_INCLUDE", value_delimiter = ',')]
    pub include: Option<Vec<String>>,

    /// URL substrings to pass through untouched
    #[arg(long, env = "FETCHX_EXCLUDE", value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Refresh endpoint called after a 401
    #[arg(long, env = "FETCHX_REFRESH_URL")]
    pub refresh_url: Option<String>,

    /// Store a token under --token-key before sending
    #[arg(long, env = "FETCHX_TOKEN")]
    pub token: Option<String>,

    /// Credential store key
    #[arg(long, env = "FETCHX_TOKEN_KEY")]
    pub token_key: Option<String>,

    /// Path to the SQLite credential store
    #[arg(long, env = "FETCHX_DB_FILE")]
    pub db_file: Option<String>,

    /// Log intercepted requests
    #[arg(long, env = "FETCHX_LOG")]
    pub log: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Request timeout in seconds
    #[arg(long, env = "FETCHX_TIMEOUT", default_value = "30")]
    pub timeout: u64,
}

impl CliArgs {
    /// Load configuration with priority: CLI > ENV > config file
    pub fn load() -> Self {
        // Load .env file if it exists
        dotenvy::dotenv().ok();
        Self::parse()
    }

    /// Build interceptor options from the config file and flags
    pub fn options(&self) -> Result<FetchxOptions> {
        let file = match &self.config {
            Some(path) => FetchxOptions::from_file(&expand_tilde(path))?,
            None => FetchxOptions::default(),
        };

        let overrides = FetchxOptions {
            base_url: self.base_url.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            refresh_token: self.refresh_url.clone().map(RefreshToken::Endpoint),
            token_key: self.token_key.clone(),
            log: self.log.then_some(true),
            ..Default::default()
        };

        Ok(file.merge(overrides))
    }

    /// Save `--token` into `store` under the key the interceptor reads
    pub fn seed_token(&self, options: &FetchxOptions, store: &dyn CredentialStore) {
        if let Some(token) = &self.token {
            let key = options.token_key.as_deref().unwrap_or(DEFAULT_TOKEN_KEY);
            store.set(key, token);
        }
    }

    /// Path to the SQLite credential store
    pub fn db_path(&self) -> Option<PathBuf> {
        self.db_file
            .as_deref()
            .map(expand_tilde)
            .or_else(crate::auth::SqliteStore::default_path)
    }

    /// Parse the repeated `-H "Name: value"` flags
    pub fn request_headers(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            map.append(name, value);
        }
        Ok(map)
    }
}

/// Parse a "Name: value" header line
pub fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("Header must be \"Name: value\": {}", raw))?;

    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .with_context(|| format!("Invalid header name: {}", name.trim()))?;
    let value = HeaderValue::from_str(value.trim())
        .with_context(|| format!("Invalid header value for {}", name))?;

    Ok((name, value))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::mock::MockTransport;
    use std::io::Write;

    fn transport() -> Arc<dyn Transport> {
        Arc::new(MockTransport::new())
    }

    #[test]
    fn test_normalize_defaults() {
        let (config, provider) = FetchxOptions::new().normalize(transport());

        assert_eq!(config.base_url, None);
        assert!(config.include.is_empty());
        assert!(config.exclude.is_empty());
        assert!(config.headers.is_empty());
        assert_eq!(config.token_key, "token");
        assert!(!config.log);
        assert!(!provider.can_refresh());
    }

    #[tokio::test]
    async fn test_normalize_default_getter_reads_store() {
        let store = Arc::new(MemoryStore::with_entry("authToken", "abc"));
        let (_, provider) = FetchxOptions::new()
            .token_key("authToken")
            .store(store)
            .normalize(transport());

        assert_eq!(provider.get_token().await.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_normalize_callable_getter_used_verbatim() {
        let store = Arc::new(MemoryStore::with_entry("token", "from-store"));
        let (_, provider) = FetchxOptions::new()
            .store(store)
            .get_token(TokenGetter::new(|| Some("from-callable".to_string())))
            .normalize(transport());

        assert_eq!(provider.get_token().await.as_deref(), Some("from-callable"));
    }

    #[tokio::test]
    async fn test_normalize_endpoint_resolved_against_base() {
        let mock = Arc::new(MockTransport::with_responses(&[(200, r#"{"token":"t"}"#)]));
        let (_, provider) = FetchxOptions::new()
            .base_url("https://api.x.com/")
            .refresh_token("/auth/refresh")
            .normalize(mock.clone());

        assert!(provider.can_refresh());
        assert_eq!(provider.refresh().await.as_deref(), Some("t"));
        assert_eq!(mock.calls()[0].url, "https://api.x.com/auth/refresh");
    }

    #[test]
    fn test_normalize_skips_invalid_headers() {
        let (config, _) = FetchxOptions::new()
            .header("X-App-Version", "1.2.0")
            .header("bad header", "x")
            .header("X-Bad-Value", "line\nbreak")
            .normalize(transport());

        assert_eq!(config.headers.len(), 1);
        assert_eq!(config.headers.get("x-app-version").unwrap(), "1.2.0");
    }

    #[test]
    fn test_deserialize_camel_case() {
        let options: FetchxOptions = serde_json::from_str(
            r#"{
                "baseURL": "https://api.myapp.com",
                "include": ["/api"],
                "exclude": ["/auth/login"],
                "headers": {"X-App-Version": "1.2.0"},
                "refreshToken": "/api/auth/refresh",
                "tokenKey": "authToken",
                "log": true
            }"#,
        )
        .unwrap();

        assert_eq!(options.base_url.as_deref(), Some("https://api.myapp.com"));
        assert_eq!(options.include, Some(vec!["/api".to_string()]));
        assert_eq!(options.exclude, Some(vec!["/auth/login".to_string()]));
        assert_eq!(options.token_key.as_deref(), Some("authToken"));
        assert_eq!(options.log, Some(true));
        assert!(matches!(
            options.refresh_token,
            Some(RefreshToken::Endpoint(ref url)) if url == "/api/auth/refresh"
        ));
    }

    #[test]
    fn test_from_file_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "baseURL = \"https://api.x.com\"\ntokenKey = \"authToken\"\nexclude = [\"/static\"]\nlog = true\n\n[headers]\nX-Client = \"cli\""
        )
        .unwrap();

        let options = FetchxOptions::from_file(file.path()).unwrap();
        assert_eq!(options.base_url.as_deref(), Some("https://api.x.com"));
        assert_eq!(options.token_key.as_deref(), Some("authToken"));
        assert_eq!(options.exclude, Some(vec!["/static".to_string()]));
        assert_eq!(options.log, Some(true));
        // Header names are case-insensitive, the file loader may fold them
        let headers = options.headers.unwrap();
        let client = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("x-client"))
            .map(|(_, value)| value.as_str());
        assert_eq!(client, Some("cli"));
    }

    #[test]
    fn test_from_file_missing() {
        let result = FetchxOptions::from_file(Path::new("/nonexistent/fetchx.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_overrides_set_fields() {
        let base = FetchxOptions::new()
            .base_url("https://a.com")
            .token_key("k1")
            .header("X-A", "1");
        let overrides = FetchxOptions::new().base_url("https://b.com").header("X-B", "2");

        let merged = base.merge(overrides);
        assert_eq!(merged.base_url.as_deref(), Some("https://b.com"));
        assert_eq!(merged.token_key.as_deref(), Some("k1"));
        let headers = merged.headers.unwrap();
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_parse_header() {
        let (name, value) = parse_header("X-Trace: abc 123").unwrap();
        assert_eq!(name, "x-trace");
        assert_eq!(value, "abc 123");

        let (_, value) = parse_header("Authorization: Bearer a:b").unwrap();
        assert_eq!(value, "Bearer a:b");

        assert!(parse_header("no-colon").is_err());
        assert!(parse_header("bad name: x").is_err());
    }

    #[test]
    fn test_seed_token_uses_config_file_key() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "tokenKey = \"authToken\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = CliArgs::parse_from(["fetchx", "/x", "--config", &path, "--token", "abc"]);
        let options = args.options().unwrap();
        let store = MemoryStore::new();
        args.seed_token(&options, &store);

        assert_eq!(store.get("authToken").as_deref(), Some("abc"));
        assert_eq!(store.get(DEFAULT_TOKEN_KEY), None);

        // Flag wins over the file
        let args = CliArgs::parse_from([
            "fetchx", "/x", "--config", &path, "--token", "def", "--token-key", "cliKey",
        ]);
        let options = args.options().unwrap();
        args.seed_token(&options, &store);
        assert_eq!(store.get("cliKey").as_deref(), Some("def"));
    }

    #[test]
    fn test_seed_token_without_token_is_noop() {
        let args = CliArgs::parse_from(["fetchx", "/x"]);
        let options = args.options().unwrap();
        let store = MemoryStore::new();
        args.seed_token(&options, &store);
        assert_eq!(store.get(DEFAULT_TOKEN_KEY), None);
    }

    #[test]
    fn test_cli_args_options() {
        let args = CliArgs::parse_from([
            "fetchx",
            "/users",
            "--base-url",
            "https://api.x.com",
            "--exclude",
            "/static,/health",
            "--refresh-url",
            "/refresh",
            "--log",
            "-H",
            "Accept: application/json",
        ]);

        let options = args.options().unwrap();
        assert_eq!(options.base_url.as_deref(), Some("https://api.x.com"));
        assert_eq!(
            options.exclude,
            Some(vec!["/static".to_string(), "/health".to_string()])
        );
        assert_eq!(options.log, Some(true));
        assert!(options.include.is_none());

        let headers = args.request_headers().unwrap();
        assert_eq!(headers.get("accept").unwrap(), "application/json");
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/test/file.txt");
        assert!(path.to_string_lossy().contains("test/file.txt"));
        assert!(!path.to_string_lossy().starts_with('~'));

        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_tilde_just_tilde() {
        // Just "~" without slash should not expand
        let path = expand_tilde("~");
        assert_eq!(path, PathBuf::from("~"));
    }
}
