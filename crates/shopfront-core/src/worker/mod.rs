//! Offline cache worker.
//!
//! This module provides:
//! - `ServiceWorker`: the install / activate / fetch hooks a worker registers
//! - `WorkerHost`: owns the registration and dispatches events to versions
//! - `CacheFirstWorker`: pre-caches the asset list and serves it offline-first
//!
//! A version moves Installing -> Installed -> Activating -> Activated, or to
//! Redundant when its install fails or a newer version replaces it.

pub mod cache_first;
pub mod clients;
pub mod error;
pub mod handler;
pub mod host;
pub mod lifecycle;
pub mod scope;

pub use cache_first::CacheFirstWorker;
pub use clients::{Client, Clients};
pub use error::WorkerError;
pub use handler::ServiceWorker;
pub use host::WorkerHost;
pub use lifecycle::{RegistrationStatus, VersionStatus, WorkerId, WorkerState};
pub use scope::{CacheHandle, Caches, WorkerScope};

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::net::{FetchError, FetchRequest, FetchResponse, Fetcher};

    /// Answers from a fixed route table keyed by path and records every call.
    /// Unknown paths get a 404.
    #[derive(Default)]
    pub struct ScriptedFetcher {
        routes: HashMap<String, (u16, String)>,
        failing: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn route(mut self, path: &str, status: u16, body: &str) -> Self {
            self.routes.insert(path.to_string(), (status, body.to_string()));
            self
        }

        /// Make requests for `path` fail with a connection error.
        pub fn fail(mut self, path: &str) -> Self {
            self.failing.insert(path.to_string());
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
            let path = request.url.path().to_string();
            self.calls.lock().unwrap().push(path.clone());

            if self.failing.contains(&path) {
                return Err(FetchError::Connection(format!("refused: {}", path)));
            }
            Ok(match self.routes.get(&path) {
                Some((status, body)) => FetchResponse::new(*status, body.clone()),
                None => FetchResponse::new(404, "not found"),
            })
        }
    }
}
