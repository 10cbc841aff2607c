//! Path traversal guard for everything that touches the template tree.
//!
//! Generated paths and URL paths are untrusted input. Resolution rejects
//! absolute paths and anything that, once normalized, escapes the source
//! root. Rejected paths are never repaired.

use std::path::{Component, Path, PathBuf};

use crate::error::AppError;

/// Resolve `relative` under `base_dir`, rejecting traversal.
///
/// Normalizes `.` and `..` without requiring the path to exist (the target
/// of a create task does not exist yet, so `canonicalize` is unusable).
pub fn safe_join(base_dir: &Path, relative: &str) -> Result<PathBuf, AppError> {
    let relative = relative.replace('\0', "");
    let rel_path = Path::new(&relative);

    if rel_path.is_absolute() {
        return Err(AppError::UnsafePath(format!(
            "absolute path not allowed: {relative}"
        )));
    }

    let joined = normalize(&base_dir.join(rel_path));
    let base = normalize(base_dir);

    if !joined.starts_with(&base) || joined == base {
        return Err(AppError::UnsafePath(format!(
            "{relative} escapes the project source root"
        )));
    }

    Ok(joined)
}

/// Resolve `.` and `..` components lexically, without filesystem access.
fn normalize(path: &Path) -> PathBuf {
    let mut out = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if matches!(out.last(), Some(Component::Normal(_))) {
                    out.pop();
                }
                // .. at the root is dropped
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out.iter().collect()
}
