//! Bringing the configured worker up at launch.
//!
//! Startup runs in two steps. `restore_cached` puts whatever is already on
//! disk in charge without touching the network, so the interceptor can start
//! serving right away. `install` then fetches the configured asset list, and
//! the restored cache stays in effect if that fails.

use std::sync::Arc;

use shopfront_core::{CacheFirstWorker, WorkerError, WorkerHost, WorkerId};
use tracing::{error, info, warn};

/// Restore a cache left by an earlier run.
///
/// Returns the worker that still has to install, or `None` when its cache is
/// already complete and was reused as-is.
pub async fn restore_cached(
    host: &WorkerHost,
    worker: CacheFirstWorker,
    reinstall: bool,
) -> Option<CacheFirstWorker> {
    let fallback = {
        let caches = host.caches();
        let storage = caches.read().await;
        if !reinstall && worker.is_installed(&storage, host.origin()) {
            None
        } else {
            Some(worker.fallback_cache(&storage).map(CacheFirstWorker::from_existing))
        }
    };

    match fallback {
        None => {
            info!(cache = worker.cache_name(), "Reusing installed cache");
            host.restore(Arc::new(worker)).await;
            None
        }
        Some(Some(old)) => {
            info!(cache = old.cache_name(), "Serving stored cache during install");
            host.restore(Arc::new(old)).await;
            Some(worker)
        }
        Some(None) => Some(worker),
    }
}

/// Install the configured asset list, logging the outcome.
pub async fn install(host: &WorkerHost, worker: CacheFirstWorker) -> Result<WorkerId, WorkerError> {
    match host.register(Arc::new(worker)).await {
        Ok(id) => {
            info!(worker = %id, "Assets installed");
            Ok(id)
        }
        Err(e) => {
            error!(error = %e, "Install failed");
            if host.active_id().await.is_none() {
                warn!("No cached assets available, all requests go to the network");
            }
            Err(e)
        }
    }
}
