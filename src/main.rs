use anyhow::{Context, Result};
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;

use fetchx::auth::{CredentialStore, MemoryStore, SqliteStore};
use fetchx::config::CliArgs;
use fetchx::{AuthInterceptor, FetchError, ReqwestTransport, RequestConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::load();

    // Initialize logging with a configured level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.log_level.to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let options = args.options()?;
    let store = open_store(&args);
    args.seed_token(&options, store.as_ref());

    let options = options.store(store);
    tracing::debug!("Options: {:?}", options);

    let transport = Arc::new(ReqwestTransport::new(4, 30, args.timeout)?);
    let interceptor = Arc::new(AuthInterceptor::new(options, transport));

    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", args.method))?;
    let mut request = RequestConfig::new(method).timeout(Duration::from_secs(args.timeout));
    request.headers = args.request_headers()?;
    if let Some(data) = &args.data {
        request = request.body(data.clone());
    }

    let handle = fetchx::install(interceptor);
    let result = fetchx::fetch(&args.url, request).await;
    handle.uninstall();

    match result {
        Ok(response) => {
            if args.include_headers {
                println!("{:?} {}", response.version(), response.status());
                for (name, value) in response.headers() {
                    println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
                }
                println!();
            }
            let status = response.status();
            let body = response.text().await.context("Failed to read response body")?;
            println!("{}", body);

            if status.is_client_error() || status.is_server_error() {
                anyhow::bail!("Request returned {}", status);
            }
            Ok(())
        }
        Err(FetchError::Http { status, status_text, body }) => {
            if !body.is_empty() {
                println!("{}", body);
            }
            anyhow::bail!("Request failed: {} {}", status, status_text)
        }
        Err(e) => Err(e.into()),
    }
}

/// Open the SQLite credential store, falling back to memory
fn open_store(args: &CliArgs) -> Arc<dyn CredentialStore> {
    let Some(path) = args.db_path() else {
        tracing::warn!("No data directory available, using in-memory credential store");
        return Arc::new(MemoryStore::new());
    };

    match SqliteStore::open(&path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!("Failed to open credential store: {:#}", e);
            Arc::new(MemoryStore::new())
        }
    }
}
