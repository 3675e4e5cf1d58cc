//! What a worker can reach while handling an event: its caches, the
//! network, and the open clients.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::try_join_all;
use reqwest::Url;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::clients::Clients;
use super::{WorkerError, WorkerId};
use crate::cache::{CacheError, CacheStorage, CachedResponse};
use crate::net::{FetchError, FetchRequest, FetchResponse, Fetcher};

pub struct WorkerScope {
    id: WorkerId,
    origin: Url,
    caches: Arc<RwLock<CacheStorage>>,
    clients: Arc<RwLock<Clients>>,
    fetcher: Arc<dyn Fetcher>,
    skip_waiting: AtomicBool,
}

impl WorkerScope {
    pub(crate) fn new(
        id: WorkerId,
        origin: Url,
        caches: Arc<RwLock<CacheStorage>>,
        clients: Arc<RwLock<Clients>>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            id,
            origin,
            caches,
            clients,
            fetcher,
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Origin relative asset URLs are resolved against.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn caches(&self) -> Caches<'_> {
        Caches { scope: self }
    }

    /// One network round trip, bypassing every cache.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        self.fetcher.fetch(request).await
    }

    /// Ask to replace the active version as soon as install finishes, instead
    /// of waiting for its clients to close.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub(crate) fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Become the controller of every open client on this origin without a
    /// reload. Returns the number of clients claimed.
    pub async fn claim_clients(&self) -> usize {
        let claimed = self.clients.write().await.claim(self.id, &self.origin);
        info!(worker = %self.id, claimed, "Claimed clients");
        claimed
    }
}

/// Named cache access for a worker.
pub struct Caches<'a> {
    scope: &'a WorkerScope,
}

impl<'a> Caches<'a> {
    /// Open (or create) a cache.
    pub async fn open(&self, name: &str) -> Result<CacheHandle<'a>, CacheError> {
        self.scope.caches.write().await.open(name)?;
        Ok(CacheHandle {
            name: name.to_string(),
            scope: self.scope,
        })
    }

    /// Handle on a cache without creating it. Lookups on a cache that does
    /// not exist miss.
    pub fn get(&self, name: &str) -> CacheHandle<'a> {
        CacheHandle {
            name: name.to_string(),
            scope: self.scope,
        }
    }

    /// Delete every cache except `keep`.
    pub async fn retain_only(&self, keep: &str) -> Result<Vec<String>, CacheError> {
        self.scope.caches.write().await.retain_only(keep)
    }
}

/// One opened cache.
pub struct CacheHandle<'a> {
    name: String,
    scope: &'a WorkerScope,
}

impl CacheHandle<'_> {
    /// Look up a stored response. Only GET requests can match.
    pub async fn match_request(&self, request: &FetchRequest) -> Option<FetchResponse> {
        if !request.is_get() {
            return None;
        }
        let storage = self.scope.caches.read().await;
        storage
            .match_url(&self.name, request.cache_key())
            .map(CachedResponse::to_response)
    }

    /// Fetch every URL and store the responses as one unit. If any fetch fails
    /// or returns a non-2xx status, nothing is stored.
    pub async fn add_all(&self, urls: &[String]) -> Result<usize, WorkerError> {
        let requests = urls
            .iter()
            .map(|url| {
                FetchRequest::resolve(&self.scope.origin, url).map_err(|source| {
                    WorkerError::Precache {
                        url: url.clone(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let entries = try_join_all(requests.iter().map(|request| self.fetch_for_cache(request))).await?;
        let count = entries.len();

        self.scope.caches.write().await.commit(&self.name, entries)?;
        info!(cache = %self.name, count, "Pre-cached assets");
        Ok(count)
    }

    async fn fetch_for_cache(&self, request: &FetchRequest) -> Result<CachedResponse, WorkerError> {
        let url = request.cache_key().to_string();
        let response = self
            .scope
            .fetch(request)
            .await
            .map_err(|source| WorkerError::Precache {
                url: url.clone(),
                source,
            })?;

        if !response.is_success() {
            let body = String::from_utf8_lossy(&response.body);
            return Err(WorkerError::Precache {
                source: FetchError::from_status(response.status, &url, &body),
                url,
            });
        }

        debug!(url = %url, bytes = response.body.len(), "Fetched asset");
        Ok(CachedResponse::from_response(&url, &response))
    }
}
