//! Host environment helpers.

use std::path::{Path, PathBuf};

/// Locate an executable on the `PATH`.
///
/// A missing dependency is an environment error the user must fix, so
/// callers treat `None` as fatal rather than retrying.
pub fn find_binary(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
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

    #[test]
    #[cfg(unix)]
    fn finds_a_well_known_binary() {
        assert!(find_binary("sh").is_some());
    }

    #[test]
    fn missing_binary_is_none() {
        assert!(find_binary("definitely-not-a-real-binary-name").is_none());
    }
}
