use std::io;
use std::path::{Path, PathBuf};

use cabinet_core::FolderRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known file name under the state directory.
pub const SYNC_STATE_FILE: &str = "folder-sync.json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed cache file: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("file cabinet root is not configured; run `cabsync set-file-cabinet-root` first")]
    RootNotConfigured,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_cabinet_root: Option<String>,
    #[serde(default)]
    pub folders: Vec<FolderRecord>,
}

/// Persistent map of remote folder identifiers. Records are only ever added
/// or updated by successful remote lookups, never deleted; the whole
/// structure is rewritten to disk after every mutation, so a crash loses at
/// most the in-flight record.
#[derive(Debug)]
pub struct FolderCache {
    file: PathBuf,
    data: CacheData,
}

impl FolderCache {
    /// Opens the cache stored at the well-known file name under
    /// `state_dir`, starting empty when no file exists yet.
    pub fn open(state_dir: &Path) -> Result<Self, CacheError> {
        let file = state_dir.join(SYNC_STATE_FILE);
        let data = match std::fs::read(&file) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => CacheData::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { file, data })
    }

    /// Deep copy of the cache contents; mutating the copy does not touch
    /// the live cache.
    pub fn snapshot(&self) -> CacheData {
        self.data.clone()
    }

    /// Absolute local directory mirroring the top of the file cabinet.
    pub fn absolute_root(&self) -> Result<PathBuf, CacheError> {
        let root = self
            .data
            .file_cabinet_root
            .as_deref()
            .ok_or(CacheError::RootNotConfigured)?;
        Ok(std::path::absolute(root)?)
    }

    pub fn set_file_cabinet_root(&mut self, root: &str) -> Result<(), CacheError> {
        if self.data.file_cabinet_root.as_deref() != Some(root) {
            self.data.file_cabinet_root = Some(root.to_string());
            self.save()?;
        }
        Ok(())
    }

    /// Inserts or updates a record by `internal_id` and persists before
    /// returning. Re-storing an id updates it in place, never duplicates.
    pub fn store_folder_info(&mut self, record: &FolderRecord) -> Result<(), CacheError> {
        match self
            .data
            .folders
            .iter_mut()
            .find(|folder| folder.internal_id == record.internal_id)
        {
            Some(existing) => {
                existing.name = record.name.clone();
                existing.parent_id = record.parent_id.clone();
            }
            None => self.data.folders.push(record.clone()),
        }
        self.save()
    }

    /// Walks parent links from `folder_id` up to the cabinet root and
    /// returns the mirrored local path, or `None` when the id is not
    /// cached at all. An unresolved parent ends the walk early; whatever
    /// resolved still hangs off the root.
    pub fn local_path_for(&self, folder_id: &str) -> Option<PathBuf> {
        let mut segments = Vec::new();
        let mut cursor: Option<&str> = Some(folder_id);
        while let Some(id) = cursor {
            match self
                .data
                .folders
                .iter()
                .find(|folder| folder.internal_id == id)
            {
                Some(folder) => {
                    segments.push(folder.name.as_str());
                    cursor = folder.parent_id.as_deref();
                }
                None => break,
            }
        }
        if segments.is_empty() {
            return None;
        }

        let mut path = self.absolute_root().ok()?;
        for name in segments.iter().rev() {
            path.push(name);
        }
        Some(path)
    }

    fn save(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(&self.data)?;
        std::fs::write(&self.file, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: &str, name: &str, parent: Option<&str>) -> FolderRecord {
        FolderRecord {
            internal_id: id.to_string(),
            name: name.to_string(),
            parent_id: parent.map(str::to_string),
        }
    }

    #[test]
    fn store_folder_info_upserts_by_internal_id() {
        let dir = tempdir().unwrap();
        let mut cache = FolderCache::open(dir.path()).unwrap();

        cache.store_folder_info(&record("1", "A", None)).unwrap();
        cache.store_folder_info(&record("2", "B", Some("1"))).unwrap();
        cache.store_folder_info(&record("1", "Renamed", None)).unwrap();

        let data = cache.snapshot();
        assert_eq!(data.folders.len(), 2);
        assert_eq!(data.folders[0].name, "Renamed");
        assert_eq!(data.folders[1].parent_id.as_deref(), Some("1"));
    }

    #[test]
    fn cache_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut cache = FolderCache::open(dir.path()).unwrap();
            cache.set_file_cabinet_root("/tmp/cabinet").unwrap();
            cache.store_folder_info(&record("1", "A", None)).unwrap();
        }

        let cache = FolderCache::open(dir.path()).unwrap();
        let data = cache.snapshot();
        assert_eq!(data.file_cabinet_root.as_deref(), Some("/tmp/cabinet"));
        assert_eq!(data.folders.len(), 1);
        assert_eq!(data.folders[0].internal_id, "1");
    }

    #[test]
    fn local_path_walks_parent_chain_root_to_leaf() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("cabinet");
        let mut cache = FolderCache::open(dir.path()).unwrap();
        cache.set_file_cabinet_root(root.to_str().unwrap()).unwrap();

        cache.store_folder_info(&record("1", "A", None)).unwrap();
        cache.store_folder_info(&record("2", "B", Some("1"))).unwrap();
        cache.store_folder_info(&record("3", "C", Some("2"))).unwrap();

        assert_eq!(
            cache.local_path_for("3"),
            Some(root.join("A").join("B").join("C"))
        );
    }

    #[test]
    fn local_path_for_unknown_id_is_none() {
        let dir = tempdir().unwrap();
        let mut cache = FolderCache::open(dir.path()).unwrap();
        cache.set_file_cabinet_root("/tmp/cabinet").unwrap();
        assert_eq!(cache.local_path_for("404"), None);
    }

    #[test]
    fn local_path_with_unresolved_parent_hangs_off_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("cabinet");
        let mut cache = FolderCache::open(dir.path()).unwrap();
        cache.set_file_cabinet_root(root.to_str().unwrap()).unwrap();

        cache.store_folder_info(&record("5", "Leaf", Some("99"))).unwrap();

        assert_eq!(cache.local_path_for("5"), Some(root.join("Leaf")));
    }

    #[test]
    fn absolute_root_requires_configuration() {
        let dir = tempdir().unwrap();
        let cache = FolderCache::open(dir.path()).unwrap();
        assert!(matches!(
            cache.absolute_root(),
            Err(CacheError::RootNotConfigured)
        ));
    }

    #[test]
    fn malformed_cache_file_is_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SYNC_STATE_FILE), b"not json").unwrap();
        assert!(matches!(
            FolderCache::open(dir.path()),
            Err(CacheError::Malformed(_))
        ));
    }
}
