use thiserror::Error;

use super::WorkerId;
use crate::cache::CacheError;
use crate::net::FetchError;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to pre-cache {url}: {source}")]
    Precache {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("{0} was replaced by a newer install")]
    Superseded(WorkerId),
}
