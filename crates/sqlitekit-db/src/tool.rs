//! Locating executables on the search path.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Resolves `name` to an executable file.
///
/// A `name` containing a directory component is checked as-is. Otherwise each
/// directory of `search_path` is tried in order; `None` reads `PATH` from the
/// environment.
pub fn find_executable(name: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    let file_name = executable_name(name);

    if Path::new(&file_name).components().count() > 1 {
        let candidate = PathBuf::from(file_name);
        return is_executable(&candidate).then_some(candidate);
    }

    let paths = match search_path {
        Some(paths) => paths.to_os_string(),
        None => std::env::var_os("PATH")?,
    };

    std::env::split_paths(&paths).find_map(|dir| {
        let full = dir.join(&file_name);
        if is_executable(&full) {
            Some(full)
        } else {
            None
        }
    })
}

fn executable_name(name: &str) -> OsString {
    if cfg!(windows) && Path::new(name).extension().is_none() {
        OsString::from(format!("{name}.exe"))
    } else {
        OsString::from(name)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
