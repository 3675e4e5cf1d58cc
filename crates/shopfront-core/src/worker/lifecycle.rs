use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ServiceWorker, WorkerScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WorkerId(u64);

impl WorkerId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    /// Installed and waiting for the previous version to let go.
    Installed,
    Activating,
    Activated,
    /// Replaced, or failed to install.
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// One registered version of a worker.
#[derive(Clone)]
pub(crate) struct Version {
    pub id: WorkerId,
    pub state: WorkerState,
    pub changed_at: DateTime<Utc>,
    pub worker: Arc<dyn ServiceWorker>,
    pub scope: Arc<WorkerScope>,
}

impl Version {
    pub fn new(worker: Arc<dyn ServiceWorker>, scope: Arc<WorkerScope>, state: WorkerState) -> Self {
        Self {
            id: scope.id(),
            state,
            changed_at: Utc::now(),
            worker,
            scope,
        }
    }

    pub fn set_state(&mut self, state: WorkerState) {
        self.state = state;
        self.changed_at = Utc::now();
    }

    pub fn snapshot(&self) -> VersionStatus {
        VersionStatus {
            id: self.id,
            name: self.worker.name().to_string(),
            state: self.state,
            since: self.changed_at,
        }
    }
}

/// Installing, waiting and active slots for the one registration the host
/// manages.
#[derive(Default)]
pub(crate) struct Registration {
    pub installing: Option<Version>,
    pub waiting: Option<Version>,
    pub active: Option<Version>,
}

impl Registration {
    /// Put a version in the installing slot. A version already installing
    /// there is returned, marked redundant.
    pub fn begin_install(&mut self, version: Version) -> Option<Version> {
        self.installing.replace(version).map(|mut prev| {
            prev.set_state(WorkerState::Redundant);
            prev
        })
    }

    /// Take the installing version if it is still `id`.
    pub fn take_installing(&mut self, id: WorkerId) -> Option<Version> {
        if self.installing.as_ref().map(|v| v.id) == Some(id) {
            self.installing.take()
        } else {
            None
        }
    }

    /// Move an installed version into the waiting slot, displacing any older
    /// waiting version.
    pub fn set_waiting(&mut self, mut version: Version) -> Option<Version> {
        version.set_state(WorkerState::Installed);
        self.waiting.replace(version).map(|mut prev| {
            prev.set_state(WorkerState::Redundant);
            prev
        })
    }

    /// Promote the waiting version to active (state `Activating`). Returns the
    /// promoted version and the previously active one, now redundant.
    pub fn promote_waiting(&mut self) -> Option<(Version, Option<Version>)> {
        let mut next = self.waiting.take()?;
        next.set_state(WorkerState::Activating);
        let previous = self.active.replace(next.clone()).map(|mut old| {
            old.set_state(WorkerState::Redundant);
            old
        });
        Some((next, previous))
    }

    pub fn mark_activated(&mut self, id: WorkerId) -> bool {
        match self.active.as_mut() {
            Some(v) if v.id == id => {
                v.set_state(WorkerState::Activated);
                true
            }
            _ => false,
        }
    }

    pub fn active_id(&self) -> Option<WorkerId> {
        self.active.as_ref().map(|v| v.id)
    }

    pub fn status(&self) -> RegistrationStatus {
        RegistrationStatus {
            installing: self.installing.as_ref().map(Version::snapshot),
            waiting: self.waiting.as_ref().map(Version::snapshot),
            active: self.active.as_ref().map(Version::snapshot),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionStatus {
    pub id: WorkerId,
    pub name: String,
    pub state: WorkerState,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationStatus {
    pub installing: Option<VersionStatus>,
    pub waiting: Option<VersionStatus>,
    pub active: Option<VersionStatus>,
}
