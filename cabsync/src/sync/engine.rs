use std::path::{Path, PathBuf};

use cabinet_core::{CabinetClient, CabinetError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::cache::{CacheError, FolderCache};
use super::discover::{discover_path, find_cached_id};
use super::files::{SyncStats, sync_files};
use super::overwrite::OverwritePolicy;
use super::paths::{PathError, ensure_path_exists, path_segments};
use super::tree::fetch_tree;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("api error: {0}")]
    Api(#[from] CabinetError),
    #[error("path error: {0}")]
    Path(#[from] PathError),
    #[error("folder \"{segment}\" not found on the remote service (parent: {parent:?})")]
    FolderNotFound {
        segment: String,
        parent: Option<String>,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sync cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullReport {
    pub folder_id: String,
    pub folders_discovered: usize,
    pub stats: SyncStats,
}

/// Owns the identifier cache and mirror-root configuration for one
/// session. Independent engines share no state.
#[derive(Debug)]
pub struct SyncEngine {
    client: CabinetClient,
    cache: FolderCache,
    root: PathBuf,
    policy: OverwritePolicy,
    cancel: CancellationToken,
}

impl SyncEngine {
    /// Fails up front when no file cabinet root has been configured.
    pub fn new(
        client: CabinetClient,
        cache: FolderCache,
        policy: OverwritePolicy,
        cancel: CancellationToken,
    ) -> Result<Self, EngineError> {
        let root = cache.absolute_root()?;
        Ok(Self {
            client,
            cache,
            root,
            policy,
            cancel,
        })
    }

    /// Pulls one cabinet folder: resolve the requested path against the
    /// cache, fall back to remote discovery and retry the cache once,
    /// mirror the local directory chain, then fetch subfolders (recursive
    /// mode) and files.
    pub async fn pull_folder(
        &mut self,
        requested: &Path,
        recursive: bool,
    ) -> Result<PullReport, EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let segments = path_segments(requested, &self.root)?;

        let folder_id = match find_cached_id(&self.cache.snapshot(), &segments) {
            Some(id) => {
                eprintln!("[cabsync] all folder ids in path found in local cache");
                id
            }
            None => {
                discover_path(&self.client, &mut self.cache, &segments, &self.cancel).await?;
                // One retry against the refreshed cache; a second miss is
                // terminal for this invocation.
                find_cached_id(&self.cache.snapshot(), &segments).ok_or_else(|| {
                    EngineError::FolderNotFound {
                        segment: segments.last().cloned().unwrap_or_default(),
                        parent: None,
                    }
                })?
            }
        };
        eprintln!("[cabsync] file cabinet folder id is {folder_id}");

        ensure_path_exists(&self.root, &segments)?;

        let folders_discovered = if recursive {
            fetch_tree(&self.client, &mut self.cache, &folder_id, &self.cancel).await?
        } else {
            0
        };

        let stats = sync_files(
            &self.client,
            &self.root,
            &folder_id,
            recursive,
            self.policy,
            &self.cancel,
        )
        .await?;

        Ok(PullReport {
            folder_id,
            folders_discovered,
            stats,
        })
    }
}
