//! Core library for shopfront.
//!
//! shopfront wraps a locally running product site in two independent pieces:
//! a desktop shell that opens one window on the site, and an offline cache
//! worker that pre-caches a fixed asset list and answers requests cache-first.
//! This crate holds everything both front ends share.

pub mod cache;
pub mod config;
pub mod net;
pub mod shell;
pub mod worker;

pub use cache::{Cache, CacheError, CacheStorage, CachedResponse};
pub use config::{ShellConfig, WindowConfig};
pub use net::{FetchError, FetchRequest, FetchResponse, Fetcher, HttpFetcher};
pub use shell::{ClosePolicy, Isolation, WindowSpec};
pub use worker::{
    CacheFirstWorker, ServiceWorker, WorkerError, WorkerHost, WorkerId, WorkerScope, WorkerState,
};
