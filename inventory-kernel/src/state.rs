use crate::models::Snapshot;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Current inventory snapshot, shared between the refresh task and the
/// request handlers, mirrored to a JSON file.
///
/// Readers get an `Arc` to an immutable snapshot; a refresh swaps the
/// pointer so a reader never sees a partially replaced list.
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
    path: PathBuf,
    // set by the first replace or load, disk is never read again after that
    primed: AtomicBool,
    load_lock: tokio::sync::Mutex<()>,
}

pub type SharedSnapshotStore = Arc<SnapshotStore>;

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::new()),
            path: path.into(),
            primed: AtomicBool::new(false),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot file. A missing file is an empty snapshot, and so
    /// is an unreadable or unparsable one (logged).
    pub async fn load(&self) -> Snapshot {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            info!("No snapshot file at {}, starting empty", self.path.display());
            return Snapshot::new();
        }

        match read_snapshot(&self.path).await {
            Ok(snapshot) => {
                info!("Loaded {} websites from {}", snapshot.len(), self.path.display());
                snapshot
            }
            Err(e) => {
                error!("Error loading websites from snapshot file: {e}");
                Snapshot::new()
            }
        }
    }

    /// Publishes a new snapshot, then mirrors it to disk. A failed write is
    /// logged and leaves the new in-memory snapshot in place.
    pub async fn replace(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        self.current.store(snapshot.clone());
        self.primed.store(true, Ordering::Release);

        match write_snapshot(&self.path, &snapshot).await {
            Ok(()) => info!("Saved {} websites to {}", snapshot.len(), self.path.display()),
            Err(e) => error!("Error saving websites to snapshot file: {e}"),
        }
    }

    /// Latest snapshot. Before the first refresh of this process, the disk
    /// copy is loaded once.
    pub async fn current(&self) -> Arc<Snapshot> {
        if !self.primed.load(Ordering::Acquire) {
            let _guard = self.load_lock.lock().await;
            if !self.primed.load(Ordering::Acquire) {
                let loaded = self.load().await;
                // a refresh may have landed while the file was being read
                if !self.primed.swap(true, Ordering::AcqRel) {
                    self.current.store(Arc::new(loaded));
                }
            }
        }
        self.current.load_full()
    }
}

async fn read_snapshot(path: &Path) -> Result<Snapshot, SnapshotError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(serde_json::from_str(&content)?)
}

async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let content = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    let io_err = |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(&tmp, content).await.map_err(io_err)?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        warn!("Could not move {} into place, removing it", tmp.display());
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_err(e));
    }
    Ok(())
}
