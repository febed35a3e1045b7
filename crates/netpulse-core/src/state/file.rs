// # File ISP State Store
//
// File-based implementation of IspStateStore with crash recovery.
//
// ## Purpose
//
// Remembers the last observed ISP identity across process restarts, so that
// consecutive `--once` runs can still detect a change.
//
// ## Crash Recovery
//
// - Atomic writes: write to `<path>.tmp`, then rename over the main file
// - Automatic backup: the previous good file is copied to `.backup` before
//   each rewrite
// - Recovery: an unreadable or unparsable main file falls back to the backup,
//   and if that fails too the store cold-starts
//
// ## File Format
//
// ```json
// {
//   "ip": "1.2.3.4",
//   "isp": "Comcast Cable",
//   "asn": "AS7922",
//   "connection_type": "cable",
//   "updated_at": "2025-01-09T12:00:00+00:00"
// }
// ```
//
// Missing keys deserialize as null, so files written by older versions load.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::{IspStateStore, PersistedIspState};

/// File-based ISP state store
///
/// The file is read once at [`open`](Self::open) into an in-memory cache.
/// `load` serves the cache; `save` updates the cache and writes through.
///
/// # Example
///
/// ```rust,no_run
/// use netpulse_core::state::FileIspStateStore;
/// use netpulse_core::traits::IspStateStore;
///
/// # async fn demo() -> Result<(), netpulse_core::Error> {
/// let store = FileIspStateStore::open("/var/lib/netpulse/state.json").await;
/// let previous = store.load().await?;
/// println!("last seen on {:?}", previous.isp);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileIspStateStore {
    path: PathBuf,
    state: Arc<RwLock<PersistedIspState>>,
}

impl FileIspStateStore {
    /// Open a state file, recovering from corruption where possible
    ///
    /// This never fails. An absent file, or a main file and backup that both
    /// fail to load, yields the cold-start state.
    pub async fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = Self::load_with_recovery(&path).await;

        Self {
            path,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Path of the main state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_with_recovery(path: &Path) -> PersistedIspState {
        let error = match Self::load_document(path).await {
            Ok(Some(state)) => {
                tracing::info!(
                    ip = state.ip.as_deref().unwrap_or("-"),
                    isp = state.isp.as_deref().unwrap_or("-"),
                    "Loaded previous ISP state from {}",
                    path.display()
                );
                return state;
            }
            Ok(None) => {
                tracing::debug!("No state file at {}, cold start", path.display());
                return PersistedIspState::empty();
            }
            Err(e) => e,
        };

        tracing::warn!(
            "State file is unreadable: {}. Attempting recovery from backup.",
            error
        );

        let backup_path = Self::backup_path(path);
        match Self::load_document(&backup_path).await {
            Ok(Some(state)) => {
                tracing::info!("Recovered ISP state from backup");
                if let Err(e) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore state file from backup: {}", e);
                }
                state
            }
            Ok(None) => {
                tracing::warn!("No backup file found. Starting with empty state.");
                PersistedIspState::empty()
            }
            Err(e) => {
                tracing::error!("Backup also unreadable: {}. Starting with empty state.", e);
                PersistedIspState::empty()
            }
        }
    }

    /// Read and parse one document; `Ok(None)` if the file does not exist
    async fn load_document(path: &Path) -> Result<Option<PersistedIspState>, Error> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::state_store(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            Error::state_store(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Write a state document atomically, keeping a backup of the old one
    async fn write_document(&self, state: &PersistedIspState) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::state_store(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;

        let temp_path = Self::temp_path(&self.path);
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if fs::try_exists(&self.path).await.unwrap_or(false) {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create state backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("ISP state written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(path: &Path) -> PathBuf {
        Self::sibling(path, "tmp")
    }

    fn backup_path(path: &Path) -> PathBuf {
        Self::sibling(path, "backup")
    }

    /// `state.json` -> `state.json.<suffix>`
    fn sibling(path: &Path, suffix: &str) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }
}

#[async_trait]
impl IspStateStore for FileIspStateStore {
    async fn load(&self) -> Result<PersistedIspState, Error> {
        Ok(self.state.read().await.clone())
    }

    async fn save(&self, state: &PersistedIspState) -> Result<(), Error> {
        let mut guard = self.state.write().await;
        *guard = state.clone();
        // Hold the lock across the write so concurrent saves land in order
        self.write_document(&guard).await
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}
