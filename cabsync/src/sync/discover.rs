use cabinet_core::CabinetClient;
use tokio_util::sync::CancellationToken;

use super::cache::{CacheData, FolderCache};
use super::engine::EngineError;

/// Resolves `segments` wholly from the cache: every segment must match a
/// cached record by case-insensitive name under the previously resolved
/// parent. A partial match resolves nothing; the caller rediscovers the
/// full chain instead of just the missing suffix.
pub fn find_cached_id(data: &CacheData, segments: &[String]) -> Option<String> {
    let mut parent: Option<&str> = None;
    let mut resolved: Option<&str> = None;
    for segment in segments {
        let matched = data.folders.iter().find(|folder| {
            folder.name.to_lowercase() == segment.to_lowercase()
                && folder.parent_id.as_deref() == parent
        })?;
        parent = Some(&matched.internal_id);
        resolved = Some(&matched.internal_id);
    }
    resolved.map(str::to_string)
}

/// Looks up every segment on the remote service in order, seeding each
/// lookup with the previously resolved id, and caches each hit. The remote
/// match is exact-case while the cache lookup above is case-insensitive;
/// the mismatch is inherited from the service's own search semantics.
pub async fn discover_path(
    client: &CabinetClient,
    cache: &mut FolderCache,
    segments: &[String],
    cancel: &CancellationToken,
) -> Result<(), EngineError> {
    let mut parent: Option<String> = None;
    for segment in segments {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let matches = client.lookup_folder(segment, parent.as_deref()).await?;
        let Some(folder) = matches.into_iter().next() else {
            return Err(EngineError::FolderNotFound {
                segment: segment.clone(),
                parent,
            });
        };
        eprintln!(
            "[cabsync] found folder {} (id {})",
            folder.name, folder.internal_id
        );
        cache.store_folder_info(&folder)?;
        parent = Some(folder.internal_id);
    }
    Ok(())
}
