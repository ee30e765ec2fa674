use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("path {path} is not under the file cabinet root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
    #[error("path {0} refers to the file cabinet root itself")]
    IsRoot(PathBuf),
    #[error("path contains an unsupported component")]
    UnsupportedComponent,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Splits `requested` into folder names from the cabinet root down to the
/// target, resolving a relative path against the working directory first.
/// A path that does not land under the root is an error, not a best-effort
/// sync against a mismatched root.
pub fn path_segments(requested: &Path, root: &Path) -> Result<Vec<String>, PathError> {
    let absolute = std::path::absolute(requested)?;
    let relative = absolute
        .strip_prefix(root)
        .map_err(|_| PathError::OutsideRoot {
            path: absolute.clone(),
            root: root.to_path_buf(),
        })?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(
                part.to_str()
                    .ok_or(PathError::UnsupportedComponent)?
                    .to_string(),
            ),
            Component::CurDir => continue,
            _ => return Err(PathError::UnsupportedComponent),
        }
    }
    if segments.is_empty() {
        return Err(PathError::IsRoot(absolute));
    }
    Ok(segments)
}

/// Creates one directory level, treating an existing directory as success.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    match std::fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(err),
    }
}

/// Creates the local directory chain for `segments` under `root`.
pub fn ensure_path_exists(root: &Path, segments: &[String]) -> io::Result<()> {
    std::fs::create_dir_all(root)?;
    let mut current = root.to_path_buf();
    for segment in segments {
        current.push(segment);
        ensure_dir(&current)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn splits_path_under_root_into_segments() {
        let root = PathBuf::from("/cabinet");
        let segments = path_segments(Path::new("/cabinet/Scripts/Events"), &root).unwrap();
        assert_eq!(segments, vec!["Scripts".to_string(), "Events".to_string()]);
    }

    #[test]
    fn rejects_path_outside_root() {
        let root = PathBuf::from("/cabinet");
        assert!(matches!(
            path_segments(Path::new("/elsewhere/Scripts"), &root),
            Err(PathError::OutsideRoot { .. })
        ));
    }

    #[test]
    fn rejects_the_root_itself() {
        let root = PathBuf::from("/cabinet");
        assert!(matches!(
            path_segments(Path::new("/cabinet"), &root),
            Err(PathError::IsRoot(_))
        ));
    }

    #[test]
    fn ensure_dir_tolerates_existing_directory() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("sub");
        ensure_dir(&target).unwrap();
        ensure_dir(&target).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn ensure_path_exists_creates_the_whole_chain() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("cabinet");
        let segments = vec!["A".to_string(), "B".to_string()];
        ensure_path_exists(&root, &segments).unwrap();
        assert!(root.join("A").join("B").is_dir());
    }
}
