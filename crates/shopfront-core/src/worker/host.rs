//! Event dispatch for registered workers.
//!
//! `WorkerHost` owns the registration and drives each version through
//! install, activate and fetch. Only one hook runs per version at a time;
//! fetch events for the active version may run concurrently with an install
//! of the next one.

use std::sync::Arc;

use reqwest::Url;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::clients::{Client, Clients};
use super::lifecycle::{Registration, RegistrationStatus, Version};
use super::{ServiceWorker, WorkerError, WorkerId, WorkerScope, WorkerState};
use crate::cache::CacheStorage;
use crate::net::{FetchError, FetchRequest, FetchResponse, Fetcher};

pub struct WorkerHost {
    origin: Url,
    caches: Arc<RwLock<CacheStorage>>,
    clients: Arc<RwLock<Clients>>,
    fetcher: Arc<dyn Fetcher>,
    registration: Mutex<Registration>,
}

impl WorkerHost {
    pub fn new(origin: Url, caches: CacheStorage, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            origin,
            caches: Arc::new(RwLock::new(caches)),
            clients: Arc::new(RwLock::new(Clients::new())),
            fetcher,
            registration: Mutex::new(Registration::default()),
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Shared cache storage, for inspection.
    pub fn caches(&self) -> Arc<RwLock<CacheStorage>> {
        Arc::clone(&self.caches)
    }

    fn new_scope(&self) -> Arc<WorkerScope> {
        Arc::new(WorkerScope::new(
            WorkerId::next(),
            self.origin.clone(),
            Arc::clone(&self.caches),
            Arc::clone(&self.clients),
            Arc::clone(&self.fetcher),
        ))
    }

    /// Install a new worker version and activate it when allowed.
    ///
    /// On install failure the version is discarded and whatever was active
    /// before stays active.
    pub async fn register(&self, worker: Arc<dyn ServiceWorker>) -> Result<WorkerId, WorkerError> {
        let scope = self.new_scope();
        let id = scope.id();
        let version = Version::new(Arc::clone(&worker), Arc::clone(&scope), WorkerState::Installing);

        if let Some(prev) = self.registration.lock().await.begin_install(version) {
            debug!(worker = %prev.id, "Install superseded");
        }
        info!(worker = %id, name = worker.name(), "Installing worker");

        let result = worker.install(&scope).await;

        let promote = {
            let mut reg = self.registration.lock().await;
            let Some(mut version) = reg.take_installing(id) else {
                return Err(WorkerError::Superseded(id));
            };

            if let Err(e) = result {
                version.set_state(WorkerState::Redundant);
                warn!(worker = %id, error = %e, "Install failed, keeping current worker");
                return Err(e);
            }

            if let Some(prev) = reg.set_waiting(version) {
                debug!(worker = %prev.id, "Waiting worker replaced");
            }

            match reg.active_id() {
                None => true,
                Some(active) => {
                    scope.skip_waiting_requested()
                        || self.clients.read().await.controlled_by(active) == 0
                }
            }
        };

        if promote {
            self.activate_waiting().await;
        } else {
            info!(worker = %id, "Installed, waiting for open clients to close");
        }
        Ok(id)
    }

    /// Bring back a version installed in an earlier run without fetching its
    /// assets again.
    pub async fn restore(&self, worker: Arc<dyn ServiceWorker>) -> WorkerId {
        let scope = self.new_scope();
        let id = scope.id();
        let version = Version::new(worker, scope, WorkerState::Installed);
        self.registration.lock().await.set_waiting(version);
        info!(worker = %id, "Restoring installed worker");
        self.activate_waiting().await;
        id
    }

    async fn activate_waiting(&self) -> Option<WorkerId> {
        let (next, previous) = self.registration.lock().await.promote_waiting()?;

        if let Some(old) = previous {
            let moved = self.clients.write().await.transfer(old.id, next.id);
            info!(old = %old.id, new = %next.id, moved, "Worker superseded");
        }

        if let Err(e) = next.worker.activate(&next.scope).await {
            warn!(worker = %next.id, error = %e, "Activate hook failed");
        }

        if self.registration.lock().await.mark_activated(next.id) {
            info!(worker = %next.id, "Worker active");
        }
        Some(next.id)
    }

    /// Open a page. Pages opened while a worker is active start out
    /// controlled by it.
    pub async fn open_client(&self, url: Url) -> Client {
        let reg = self.registration.lock().await;
        let controller = reg.active_id();
        self.clients.write().await.open(url, controller)
    }

    /// Close a page. Once the active version controls no pages, a waiting
    /// version takes over.
    pub async fn close_client(&self, id: &str) -> Option<Client> {
        let client = self.clients.write().await.close(id)?;

        let ready = {
            let reg = self.registration.lock().await;
            match (reg.waiting.as_ref(), reg.active_id()) {
                (Some(_), Some(active)) => self.clients.read().await.controlled_by(active) == 0,
                (Some(_), None) => true,
                _ => false,
            }
        };
        if ready {
            self.activate_waiting().await;
        }
        Some(client)
    }

    pub async fn client(&self, id: &str) -> Option<Client> {
        self.clients.read().await.get(id).cloned()
    }

    /// Route a request through the controlling worker.
    ///
    /// With `client_id` the request belongs to that page and goes to its
    /// controller, or straight to the network if the page is uncontrolled.
    /// Without one it is treated as a navigation and goes to the active
    /// version.
    pub async fn handle_fetch(
        &self,
        client_id: Option<&str>,
        request: FetchRequest,
    ) -> Result<FetchResponse, FetchError> {
        let target = {
            let reg = self.registration.lock().await;
            let controller = match client_id {
                None => reg.active_id(),
                Some(id) => self.clients.read().await.get(id).and_then(|c| c.controller),
            };
            reg.active
                .as_ref()
                .filter(|v| Some(v.id) == controller)
                .map(|v| (Arc::clone(&v.worker), Arc::clone(&v.scope)))
        };

        match target {
            Some((worker, scope)) => worker.fetch(&scope, &request).await,
            None => {
                debug!(url = %request.url, "No controlling worker, using network");
                self.fetcher.fetch(&request).await
            }
        }
    }

    pub async fn active_id(&self) -> Option<WorkerId> {
        self.registration.lock().await.active_id()
    }

    pub async fn status(&self) -> RegistrationStatus {
        self.registration.lock().await.status()
    }
}
