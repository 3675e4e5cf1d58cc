//! Network access for the offline worker.
//!
//! This module provides the `Fetcher` trait the worker uses for every
//! network round trip, the reqwest-backed `HttpFetcher`, and the request and
//! response types shared with the cache store.

pub mod client;
pub mod error;

pub use client::{is_hop_by_hop, FetchRequest, FetchResponse, Fetcher, HttpFetcher};
pub use error::FetchError;
pub use reqwest::{Method, Url};
