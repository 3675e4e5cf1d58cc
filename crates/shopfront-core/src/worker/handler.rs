use async_trait::async_trait;

use super::{WorkerError, WorkerScope};
use crate::net::{FetchError, FetchRequest, FetchResponse};

/// The three lifecycle hooks a worker registers with its host.
#[async_trait]
pub trait ServiceWorker: Send + Sync {
    /// Label used in logs and status reports.
    fn name(&self) -> &str;

    /// Prepare the worker. An error aborts the install and the version never
    /// activates.
    async fn install(&self, scope: &WorkerScope) -> Result<(), WorkerError>;

    /// Runs once the version becomes the active one. Errors are logged but do
    /// not undo activation.
    async fn activate(&self, _scope: &WorkerScope) -> Result<(), WorkerError> {
        Ok(())
    }

    /// Answer one intercepted request.
    async fn fetch(
        &self,
        scope: &WorkerScope,
        request: &FetchRequest,
    ) -> Result<FetchResponse, FetchError> {
        scope.fetch(request).await
    }
}
