//! Local session snapshot
//!
//! A small versioned record of the last known identity and admin flag that
//! survives restarts, so a provisional UI can render before the backend
//! answers. It is advisory only: once a fresh check succeeds the fresh value
//! wins and overwrites it.
//!
//! Fallback rules:
//! - identity: used only when the session lookup times out or cannot reach
//!   the backend
//! - admin flag: used only when the admin query fails, and only for the same
//!   person (same user ID, or failing that the same email)

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vybe_types::{Identity, UserId};

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Admin flag bound to the identity it was computed for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminBinding {
    pub user_id: UserId,
    pub email: Option<String>,
    pub is_admin: bool,
}

/// Persisted local state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSnapshot {
    pub version: u32,
    pub identity: Option<Identity>,
    pub admin: Option<AdminBinding>,
    pub saved_at: DateTime<Utc>,
}

impl LocalSnapshot {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            identity: None,
            admin: None,
            saved_at: now,
        }
    }

    /// Cached admin flag for `identity`, if one was recorded for the same person
    pub fn admin_for(&self, identity: &Identity) -> Option<bool> {
        self.admin
            .as_ref()
            .filter(|binding| identity.same_person(&binding.user_id, binding.email.as_deref()))
            .map(|binding| binding.is_admin)
    }
}

/// Storage for the local snapshot
pub trait SnapshotStore: Send + Sync {
    /// Load the snapshot. Missing, unreadable or foreign-version snapshots
    /// load as `None`.
    fn load(&self) -> Option<LocalSnapshot>;

    /// Replace the snapshot. Failures are logged, never returned.
    fn save(&self, snapshot: &LocalSnapshot);

    /// Remove the snapshot entirely
    fn clear(&self);

    /// Load, apply `change`, and save
    fn update(&self, now: DateTime<Utc>, change: &dyn Fn(&mut LocalSnapshot)) {
        let mut snapshot = self.load().unwrap_or_else(|| LocalSnapshot::empty(now));
        change(&mut snapshot);
        snapshot.saved_at = now;
        self.save(&snapshot);
    }
}

/// In-memory snapshot store
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    inner: Mutex<Option<LocalSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot
    pub fn with_snapshot(snapshot: LocalSnapshot) -> Self {
        Self {
            inner: Mutex::new(Some(snapshot)),
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Option<LocalSnapshot> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .filter(|s| s.version == SNAPSHOT_VERSION)
    }

    fn save(&self, snapshot: &LocalSnapshot) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(snapshot.clone());
    }

    fn clear(&self) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// JSON file snapshot store
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Option<LocalSnapshot> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read snapshot");
                return None;
            }
        };

        match serde_json::from_slice::<LocalSnapshot>(&raw) {
            Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => Some(snapshot),
            Ok(snapshot) => {
                tracing::debug!(version = snapshot.version, "discarding snapshot with foreign version");
                None
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "discarding corrupt snapshot");
                None
            }
        }
    }

    fn save(&self, snapshot: &LocalSnapshot) {
        let json = match serde_json::to_vec_pretty(snapshot) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode snapshot");
                return;
            }
        };

        // Write-then-rename so a crash never leaves a half-written snapshot
        let tmp = self.path.with_extension("tmp");
        let result = std::fs::write(&tmp, json).and_then(|()| std::fs::rename(&tmp, &self.path));
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write snapshot");
        }
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove snapshot");
            }
        }
    }
}
