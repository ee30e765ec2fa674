use std::path::{Path, PathBuf};

use cabinet_core::{CabinetClient, FileRecord};
use tokio_util::sync::CancellationToken;

use super::engine::EngineError;
use super::overwrite::OverwritePolicy;

/// Separator the service uses inside composite folder paths.
const FOLDER_PATH_SEPARATOR: &str = " : ";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Downloads the files under `folder_id`, strictly in sequence: one file is
/// fully written before the next request goes out, so overwrite prompts
/// never interleave. A failure on one file is logged and counted, not fatal
/// to the rest of the queue.
pub async fn sync_files(
    client: &CabinetClient,
    cabinet_root: &Path,
    folder_id: &str,
    recursive: bool,
    policy: OverwritePolicy,
    cancel: &CancellationToken,
) -> Result<SyncStats, EngineError> {
    let mut files = client.list_files(folder_id).await?;
    if !recursive {
        // The listing is subtree-inclusive and carries no ordering
        // guarantee, so direct children are selected by predicate.
        files.retain(|file| file.folder.internal_id == folder_id);
    }
    if files.is_empty() {
        eprintln!("[cabsync] no files found in folder {folder_id}");
        return Ok(SyncStats::default());
    }
    eprintln!("[cabsync] found {} files", files.len());

    let mut stats = SyncStats::default();
    for file in &files {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        match fetch_one(client, cabinet_root, file, policy).await {
            Ok(true) => {
                stats.fetched += 1;
                eprintln!("[cabsync] fetched {}", file.name);
            }
            Ok(false) => {
                stats.skipped += 1;
                eprintln!("[cabsync] skipped {} (kept local copy)", file.name);
            }
            Err(err) => {
                stats.failed += 1;
                eprintln!("[cabsync] failed {}: {err}", file.name);
            }
        }
    }
    Ok(stats)
}

async fn fetch_one(
    client: &CabinetClient,
    cabinet_root: &Path,
    file: &FileRecord,
    policy: OverwritePolicy,
) -> Result<bool, EngineError> {
    let directory = destination_dir(cabinet_root, &file.folder.name);
    let content = client.fetch_file(&file.internal_id).await?;

    let target = directory.join(&content.name);
    if target.exists() && !policy.allows_overwrite(&content.name)? {
        return Ok(false);
    }
    tokio::fs::create_dir_all(&directory).await?;
    tokio::fs::write(&target, &content.body).await?;
    Ok(true)
}

/// Joins the file's composite remote folder path under the local cabinet
/// root.
fn destination_dir(cabinet_root: &Path, folder_name: &str) -> PathBuf {
    let mut path = cabinet_root.to_path_buf();
    for segment in folder_name.split(FOLDER_PATH_SEPARATOR) {
        path.push(segment);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_folder_name_maps_to_nested_directories() {
        let dir = destination_dir(Path::new("/cabinet"), "A : B");
        assert_eq!(dir, PathBuf::from("/cabinet/A/B"));
    }

    #[test]
    fn plain_folder_name_maps_to_single_directory() {
        let dir = destination_dir(Path::new("/cabinet"), "Scripts");
        assert_eq!(dir, PathBuf::from("/cabinet/Scripts"));
    }

    #[test]
    fn colon_in_a_name_without_spacing_is_not_a_separator() {
        let dir = destination_dir(Path::new("/cabinet"), "v1:beta");
        assert_eq!(dir, PathBuf::from("/cabinet/v1:beta"));
    }
}
