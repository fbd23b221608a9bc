//! Executable lookup on an explicit search path.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Builds a search path with `prepend` ahead of `base`, skipping duplicates.
///
/// # Errors
///
/// Returns an error if one of the directories contains the path separator.
pub fn extend_search_path(
    prepend: &[PathBuf],
    base: Option<&OsStr>,
) -> Result<OsString, std::env::JoinPathsError> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    let inherited = base.map(|b| std::env::split_paths(b).collect::<Vec<_>>()).unwrap_or_default();

    for dir in prepend.iter().cloned().chain(inherited) {
        if dir.as_os_str().is_empty() || dirs.contains(&dir) {
            continue;
        }
        dirs.push(dir);
    }

    std::env::join_paths(dirs)
}

/// Finds `binary` in the directories of `search_path`.
#[must_use]
pub fn find_executable(binary: &str, search_path: &OsStr) -> Option<PathBuf> {
    if binary.contains(std::path::MAIN_SEPARATOR) {
        let candidate = PathBuf::from(binary);
        return is_executable(&candidate).then_some(candidate);
    }

    std::env::split_paths(search_path)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn write_executable(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_extend_search_path_dedupes_and_orders() {
        let base = std::env::join_paths(["/usr/bin", "/tools/bin"]).unwrap();
        let path = extend_search_path(&[PathBuf::from("/tools/bin")], Some(&base)).unwrap();
        let dirs: Vec<_> = std::env::split_paths(&path).collect();

        assert_eq!(dirs, vec![PathBuf::from("/tools/bin"), PathBuf::from("/usr/bin")]);
    }

    #[test]
    fn test_extend_search_path_without_base() {
        let path = extend_search_path(&[PathBuf::from("/a"), PathBuf::from("/b")], None).unwrap();
        assert_eq!(std::env::split_paths(&path).count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_find_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let expected = write_executable(dir.path(), "subfinder");
        let plain = dir.path().join("notes");
        std::fs::write(&plain, "text").unwrap();
        std::fs::set_permissions(&plain, std::fs::Permissions::from_mode(0o644)).unwrap();

        let search = std::env::join_paths([dir.path()]).unwrap();
        assert_eq!(find_executable("subfinder", &search), Some(expected));
        assert_eq!(find_executable("notes", &search), None);
        assert_eq!(find_executable("httpx", &search), None);
    }
}
