//! Path normalization for snapshot keys.

use crate::error::WorkspaceError;

/// Normalizes a workspace path into a snapshot key.
///
/// Leading `/` and `./` are stripped, `.` segments dropped and `..` resolved.
/// The root is the empty string. Paths escaping the root are rejected.
pub fn normalize(path: &str) -> Result<String, WorkspaceError> {
    if path.contains('\0') {
        return Err(WorkspaceError::InvalidPath(path.replace('\0', "\\0")));
    }

    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(WorkspaceError::InvalidPath(path.to_string()));
                }
            }
            other => parts.push(other),
        }
    }

    Ok(parts.join("/"))
}

/// Joins two normalized keys.
pub fn join(base: &str, rel: &str) -> String {
    match (base.is_empty(), rel.is_empty()) {
        (true, _) => rel.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{rel}"),
    }
}

/// Returns every proper ancestor of a normalized key, outermost first.
pub fn ancestors(key: &str) -> impl Iterator<Item = &str> {
    key.match_indices('/').map(move |(idx, _)| &key[..idx])
}

/// Returns the key of the parent directory, `""` for top-level entries.
pub fn parent(key: &str) -> &str {
    key.rfind('/').map(|idx| &key[..idx]).unwrap_or("")
}
