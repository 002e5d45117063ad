// Process-wide ambient request function

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use reqwest::Response;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::http_client::{ReqwestTransport, RequestConfig, Transport};

static DEFAULT_TRANSPORT: Lazy<Arc<dyn Transport>> =
    Lazy::new(|| Arc::new(ReqwestTransport::default()));

/// Installed transports, most recent last, tagged with their handle id
static AMBIENT: Lazy<RwLock<Vec<(u64, Arc<dyn Transport>)>>> = Lazy::new(|| RwLock::new(Vec::new()));

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// The most recently installed transport, or the default reqwest transport
pub fn current() -> Arc<dyn Transport> {
    AMBIENT
        .read()
        .last()
        .map(|(_, transport)| transport.clone())
        .unwrap_or_else(|| DEFAULT_TRANSPORT.clone())
}

/// Send a request through the ambient transport
pub async fn fetch(url: &str, config: RequestConfig) -> Result<Response> {
    current().fetch(url, config).await
}

/// Make `transport` the ambient transport until the returned handle is uninstalled
pub fn install(transport: Arc<dyn Transport>) -> InstallHandle {
    let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
    AMBIENT.write().push((id, transport));
    tracing::debug!(handle = id, "Installed ambient transport");

    InstallHandle {
        id,
        active: AtomicBool::new(true),
    }
}

/// Handle to an installed transport
///
/// Dropping the handle leaves the transport installed.
pub struct InstallHandle {
    id: u64,
    active: AtomicBool,
}

impl InstallHandle {
    /// Remove this handle's transport from the ambient stack
    ///
    /// Returns false if this handle was already uninstalled. Transports
    /// installed later stay in place; once every handle is uninstalled the
    /// default transport is active again.
    pub fn uninstall(&self) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }

        let mut stack = AMBIENT.write();
        if let Some(pos) = stack.iter().position(|(id, _)| *id == self.id) {
            stack.remove(pos);
            tracing::debug!(handle = self.id, "Uninstalled ambient transport");
        }

        true
    }

    pub fn is_installed(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
