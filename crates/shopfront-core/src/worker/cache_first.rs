//! The offline-first worker: pre-cache a fixed asset list at install, then
//! answer every request from that cache when possible.

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, info};

use super::{ServiceWorker, WorkerError, WorkerScope};
use crate::cache::{Cache, CacheStorage};
use crate::config::ShellConfig;
use crate::net::{FetchError, FetchRequest, FetchResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheFirstWorker {
    cache_name: String,
    assets: Vec<String>,
}

impl CacheFirstWorker {
    pub fn new(cache_name: impl Into<String>, assets: Vec<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            assets,
        }
    }

    pub fn from_config(config: &ShellConfig) -> Self {
        Self::new(config.cache_name.clone(), config.assets.clone())
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// Rebuild the worker that produced `cache`, using its stored URLs as the
    /// asset list.
    pub fn from_existing(cache: &Cache) -> Self {
        Self::new(
            cache.name.clone(),
            cache.keys().into_iter().map(String::from).collect(),
        )
    }

    /// True when every asset already sits in this worker's cache, so a
    /// previous install can be reused.
    pub fn is_installed(&self, storage: &CacheStorage, origin: &Url) -> bool {
        let Some(cache) = storage.get(&self.cache_name) else {
            return false;
        };
        self.assets.iter().all(|asset| {
            FetchRequest::resolve(origin, asset)
                .map(|req| cache.contains(req.cache_key()))
                .unwrap_or(false)
        })
    }

    /// A stored cache that can serve while this worker installs.
    ///
    /// Entries already under this worker's own name win, since they were left
    /// by an earlier install of the same version (possibly with a shorter
    /// asset list). Otherwise the most recently written non-empty cache.
    pub fn fallback_cache<'s>(&self, storage: &'s CacheStorage) -> Option<&'s Cache> {
        if let Some(own) = storage.get(&self.cache_name).filter(|c| !c.is_empty()) {
            return Some(own);
        }
        storage
            .keys()
            .into_iter()
            .filter_map(|name| storage.get(name))
            .filter(|cache| !cache.is_empty())
            .max_by_key(|cache| cache.entries().map(|e| e.cached_at).max())
    }
}

#[async_trait]
impl ServiceWorker for CacheFirstWorker {
    fn name(&self) -> &str {
        &self.cache_name
    }

    async fn install(&self, scope: &WorkerScope) -> Result<(), WorkerError> {
        let cache = scope.caches().open(&self.cache_name).await?;
        cache.add_all(&self.assets).await?;
        scope.skip_waiting();
        Ok(())
    }

    async fn activate(&self, scope: &WorkerScope) -> Result<(), WorkerError> {
        let removed = scope.caches().retain_only(&self.cache_name).await?;
        if !removed.is_empty() {
            info!(removed = ?removed, "Deleted caches from older versions");
        }
        scope.claim_clients().await;
        Ok(())
    }

    async fn fetch(
        &self,
        scope: &WorkerScope,
        request: &FetchRequest,
    ) -> Result<FetchResponse, FetchError> {
        // Cache-first with no freshness check; misses are not written back.
        if let Some(hit) = scope.caches().get(&self.cache_name).match_request(request).await {
            debug!(url = %request.url, "Cache hit");
            return Ok(hit);
        }
        debug!(url = %request.url, "Cache miss");
        scope.fetch(request).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqwest::Method;

    use super::*;
    use crate::worker::testing::ScriptedFetcher;
    use crate::worker::{WorkerHost, WorkerState};

    fn origin() -> Url {
        Url::parse("http://localhost:5000").unwrap()
    }

    fn abs(path: &str) -> String {
        origin().join(path).unwrap().to_string()
    }

    fn site() -> ScriptedFetcher {
        ScriptedFetcher::new()
            .route("/", 200, "<html>home</html>")
            .route("/static/css/style.css", 200, "body {}")
            .route("/static/js/app.js", 200, "console.log('hi')")
            .route("/alt", 200, "<html>alt</html>")
    }

    fn assets(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    fn stored(storage: &mut CacheStorage, name: &str, paths: &[&str]) {
        let entries = paths
            .iter()
            .map(|p| {
                crate::cache::CachedResponse::from_response(&abs(p), &FetchResponse::new(200, "x"))
            })
            .collect();
        storage.commit(name, entries).unwrap();
    }

    #[test]
    fn test_is_installed_requires_every_asset() {
        let mut storage = CacheStorage::in_memory();
        stored(&mut storage, "product-cache-v1", &["/"]);

        let partial = CacheFirstWorker::new("product-cache-v1", assets(&["/", "/static/js/app.js"]));
        assert!(!partial.is_installed(&storage, &origin()));

        let complete = CacheFirstWorker::new("product-cache-v1", assets(&["/"]));
        assert!(complete.is_installed(&storage, &origin()));

        let other = CacheFirstWorker::new("product-cache-v2", assets(&["/"]));
        assert!(!other.is_installed(&storage, &origin()));
    }

    #[test]
    fn test_fallback_cache_skips_empty_caches() {
        let mut storage = CacheStorage::in_memory();
        stored(&mut storage, "product-cache-v1", &["/", "/static/css/style.css"]);
        storage.open("product-cache-v2").unwrap();
        storage.open("product-cache-v3").unwrap();

        let worker = CacheFirstWorker::new("product-cache-v2", assets(&["/"]));
        let fallback = worker.fallback_cache(&storage).unwrap();
        assert_eq!(fallback.name, "product-cache-v1");

        let rebuilt = CacheFirstWorker::from_existing(fallback);
        assert_eq!(rebuilt.cache_name(), "product-cache-v1");
        assert_eq!(rebuilt.assets(), &[abs("/"), abs("/static/css/style.css")]);
    }

    #[test]
    fn test_fallback_cache_prefers_own_name() {
        let mut storage = CacheStorage::in_memory();
        stored(&mut storage, "product-cache-v1", &["/"]);
        stored(&mut storage, "product-cache-v0", &["/", "/static/css/style.css"]);

        // Asset list grew without a new cache name
        let worker = CacheFirstWorker::new("product-cache-v1", assets(&["/", "/static/js/app.js"]));
        assert!(!worker.is_installed(&storage, &origin()));
        assert_eq!(worker.fallback_cache(&storage).unwrap().name, "product-cache-v1");
    }

    #[tokio::test]
    async fn test_install_caches_exactly_the_asset_list() {
        let fetcher = Arc::new(site());
        let host = WorkerHost::new(origin(), CacheStorage::in_memory(), fetcher.clone());
        let worker = CacheFirstWorker::new("product-cache-v1", assets(&["/", "/static/css/style.css"]));

        host.register(Arc::new(worker)).await.unwrap();

        let caches = host.caches();
        let storage = caches.read().await;
        let cache = storage.get("product-cache-v1").unwrap();
        assert_eq!(cache.keys(), vec![abs("/"), abs("/static/css/style.css")]);
    }

    #[tokio::test]
    async fn test_cached_assets_are_served_without_network() {
        let fetcher = Arc::new(site());
        let host = WorkerHost::new(origin(), CacheStorage::in_memory(), fetcher.clone());
        let list = assets(&["/", "/static/css/style.css", "/static/js/app.js"]);
        host.register(Arc::new(CacheFirstWorker::new("product-cache-v1", list.clone())))
            .await
            .unwrap();

        let installed_calls = fetcher.call_count();
        for path in &list {
            let req = FetchRequest::resolve(&origin(), path).unwrap();
            let resp = host.handle_fetch(None, req).await.unwrap();
            assert!(resp.from_cache, "{} should come from cache", path);
        }
        assert_eq!(fetcher.call_count(), installed_calls);
    }

    #[tokio::test]
    async fn test_uncached_request_fetches_once_and_is_not_stored() {
        let fetcher = Arc::new(site());
        let host = WorkerHost::new(origin(), CacheStorage::in_memory(), fetcher.clone());
        host.register(Arc::new(CacheFirstWorker::new("product-cache-v1", assets(&["/"]))))
            .await
            .unwrap();

        let before = fetcher.call_count();
        let req = FetchRequest::resolve(&origin(), "/alt").unwrap();
        let resp = host.handle_fetch(None, req.clone()).await.unwrap();
        assert!(!resp.from_cache);
        assert_eq!(resp.body.as_ref(), b"<html>alt</html>");
        assert_eq!(fetcher.call_count(), before + 1);

        // Still a miss the second time: nothing was written back
        host.handle_fetch(None, req).await.unwrap();
        assert_eq!(fetcher.call_count(), before + 2);
    }

    #[tokio::test]
    async fn test_non_get_requests_bypass_the_cache() {
        let fetcher = Arc::new(site());
        let host = WorkerHost::new(origin(), CacheStorage::in_memory(), fetcher.clone());
        host.register(Arc::new(CacheFirstWorker::new("product-cache-v1", assets(&["/"]))))
            .await
            .unwrap();

        let before = fetcher.call_count();
        let post = FetchRequest::new(Method::POST, origin().join("/").unwrap());
        let resp = host.handle_fetch(None, post).await.unwrap();
        assert!(!resp.from_cache);
        assert_eq!(fetcher.call_count(), before + 1);
    }

    #[tokio::test]
    async fn test_failed_asset_aborts_install_and_commits_nothing() {
        let fetcher = Arc::new(site().fail("/static/js/app.js"));
        let host = WorkerHost::new(origin(), CacheStorage::in_memory(), fetcher.clone());
        let worker = CacheFirstWorker::new(
            "product-cache-v1",
            assets(&["/", "/static/css/style.css", "/static/js/app.js"]),
        );

        let err = host.register(Arc::new(worker)).await.unwrap_err();
        assert!(matches!(err, WorkerError::Precache { ref url, .. } if url == &abs("/static/js/app.js")));
        assert!(host.active_id().await.is_none());

        let caches = host.caches();
        let storage = caches.read().await;
        assert!(storage.get("product-cache-v1").map_or(true, |c| c.is_empty()));
    }

    #[tokio::test]
    async fn test_error_status_fails_install() {
        let fetcher = Arc::new(site());
        let host = WorkerHost::new(origin(), CacheStorage::in_memory(), fetcher);
        let worker = CacheFirstWorker::new("product-cache-v1", assets(&["/", "/missing.png"]));

        let err = host.register(Arc::new(worker)).await.unwrap_err();
        assert!(matches!(
            err,
            WorkerError::Precache { source: FetchError::NotFound(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_uncached_network_failure_propagates() {
        let fetcher = Arc::new(site().fail("/admin"));
        let host = WorkerHost::new(origin(), CacheStorage::in_memory(), fetcher);
        host.register(Arc::new(CacheFirstWorker::new("product-cache-v1", assets(&["/"]))))
            .await
            .unwrap();

        let req = FetchRequest::resolve(&origin(), "/admin").unwrap();
        let err = host.handle_fetch(None, req).await.unwrap_err();
        assert!(err.is_network_failure());
    }

    #[tokio::test]
    async fn test_failed_upgrade_keeps_previous_version_serving() {
        let fetcher = Arc::new(site());
        let host = WorkerHost::new(origin(), CacheStorage::in_memory(), fetcher);
        let v1 = host
            .register(Arc::new(CacheFirstWorker::new("product-cache-v1", assets(&["/"]))))
            .await
            .unwrap();

        let v2 = CacheFirstWorker::new("product-cache-v2", assets(&["/", "/gone.css"]));
        assert!(host.register(Arc::new(v2)).await.is_err());

        assert_eq!(host.active_id().await, Some(v1));
        let resp = host
            .handle_fetch(None, FetchRequest::resolve(&origin(), "/").unwrap())
            .await
            .unwrap();
        assert!(resp.from_cache);
    }

    #[tokio::test]
    async fn test_activation_controls_already_open_page() {
        let fetcher = Arc::new(site());
        let host = WorkerHost::new(origin(), CacheStorage::in_memory(), fetcher.clone());

        let page = host.open_client(origin()).await;
        assert_eq!(page.controller, None);

        let id = host
            .register(Arc::new(CacheFirstWorker::new("product-cache-v1", assets(&["/"]))))
            .await
            .unwrap();

        assert_eq!(host.client(&page.id).await.unwrap().controller, Some(id));
        let before = fetcher.call_count();
        let resp = host
            .handle_fetch(Some(&page.id), FetchRequest::resolve(&origin(), "/").unwrap())
            .await
            .unwrap();
        assert!(resp.from_cache);
        assert_eq!(fetcher.call_count(), before);
    }

    #[tokio::test]
    async fn test_new_version_supersedes_immediately_and_prunes_old_cache() {
        let fetcher = Arc::new(site());
        let host = WorkerHost::new(origin(), CacheStorage::in_memory(), fetcher);
        let v1 = host
            .register(Arc::new(CacheFirstWorker::new("product-cache-v1", assets(&["/"]))))
            .await
            .unwrap();
        let page = host.open_client(origin()).await;
        assert_eq!(page.controller, Some(v1));

        let v2 = host
            .register(Arc::new(CacheFirstWorker::new(
                "product-cache-v2",
                assets(&["/", "/static/css/style.css"]),
            )))
            .await
            .unwrap();

        let status = host.status().await;
        assert_eq!(status.active.as_ref().map(|a| a.id), Some(v2));
        assert_eq!(status.active.map(|a| a.state), Some(WorkerState::Activated));
        assert!(status.waiting.is_none());
        assert_eq!(host.client(&page.id).await.unwrap().controller, Some(v2));

        let caches = host.caches();
        assert_eq!(caches.read().await.keys(), vec!["product-cache-v2"]);
    }
}
