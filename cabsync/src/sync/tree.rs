use cabinet_core::CabinetClient;
use tokio_util::sync::CancellationToken;

use super::cache::FolderCache;
use super::engine::EngineError;
use super::paths::ensure_dir;

/// Breadth-first fetch of the remote subtree under `root_id`. Each level of
/// the tree costs exactly one remote call: the whole frontier of parent ids
/// goes out in a single child-folder search, regardless of how wide the
/// level is. Every discovered folder is cached and its local directory
/// created before the next level is fetched. Returns the number of folders
/// discovered.
pub async fn fetch_tree(
    client: &CabinetClient,
    cache: &mut FolderCache,
    root_id: &str,
    cancel: &CancellationToken,
) -> Result<usize, EngineError> {
    let mut frontier = vec![root_id.to_string()];
    let mut discovered = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let children = client.list_child_folders(&frontier).await?;
        if children.is_empty() {
            break;
        }

        for child in &children {
            cache.store_folder_info(child)?;
            // Parents were created on earlier levels, so a single-level
            // create suffices here.
            if let Some(path) = cache.local_path_for(&child.internal_id) {
                ensure_dir(&path)?;
            }
        }

        discovered += children.len();
        frontier = children
            .into_iter()
            .map(|folder| folder.internal_id)
            .collect();
    }

    Ok(discovered)
}
