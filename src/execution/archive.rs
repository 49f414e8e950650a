//! Packs a snapshot into a tar archive for upload into a container.

use tar::{Builder, EntryType, Header};

use crate::error::DockerError;
use crate::snapshot::Snapshot;

/// Builds an uncompressed tar archive of `snapshot` rooted at `prefix`.
///
/// `prefix` is the in-archive directory the tree lands under (e.g. `src`
/// for a container working directory of `/src`). Directory entries are
/// emitted explicitly so empty directories survive the round trip.
pub fn snapshot_to_tar(snapshot: &Snapshot, prefix: &str) -> Result<Vec<u8>, DockerError> {
    let prefix = prefix.trim_matches('/');
    let mut builder = Builder::new(Vec::new());

    if !prefix.is_empty() {
        append_dir(&mut builder, prefix)?;
    }
    for dir in snapshot.directories() {
        append_dir(&mut builder, &prefixed(prefix, dir))?;
    }
    for (key, data) in snapshot.files() {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        builder
            .append_data(&mut header, prefixed(prefix, key), data)
            .map_err(|e| DockerError::CopyFailed(format!("Failed to archive '{key}': {e}")))?;
    }

    builder
        .into_inner()
        .map_err(|e| DockerError::CopyFailed(format!("Failed to finish archive: {e}")))
}

fn append_dir(builder: &mut Builder<Vec<u8>>, path: &str) -> Result<(), DockerError> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Directory);
    header.set_size(0);
    header.set_mode(0o755);
    header.set_mtime(0);
    builder
        .append_data(&mut header, path, std::io::empty())
        .map_err(|e| DockerError::CopyFailed(format!("Failed to archive '{path}/': {e}")))
}

fn prefixed(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}/{key}")
    }
}
