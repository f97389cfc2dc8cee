//! Origin-server record for a mirror root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ccs_types::NodeMetadata;
use tracing::{debug, info, warn};

use crate::config::STATE_DIR;
use crate::error::{SyncError, SyncResult};

const NODE_FILE: &str = "node.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OriginStatus {
    /// No origin recorded yet; a fresh mirror.
    Unrecorded,
    Matches,
    Mismatch { recorded: String, target: String },
}

pub fn node_path(root: &Path) -> PathBuf {
    root.join(STATE_DIR).join(NODE_FILE)
}

pub fn read_origin(root: &Path) -> SyncResult<Option<NodeMetadata>> {
    let path = node_path(root);
    match fs::read(&path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SyncError::io(path, e)),
    }
}

/// Compare the recorded origin with `target`.
///
/// A mismatch is logged and reported, never an error: the caller decides
/// whether to continue. In transfer mode a mismatch is expected.
pub fn check_origin(root: &Path, target: &str, transfer_mode: bool) -> SyncResult<OriginStatus> {
    let status = match read_origin(root)? {
        None => OriginStatus::Unrecorded,
        Some(meta) if meta.matches(target) => OriginStatus::Matches,
        Some(meta) => OriginStatus::Mismatch { recorded: meta.node, target: target.to_string() },
    };
    if let OriginStatus::Mismatch { recorded, target } = &status {
        if transfer_mode {
            info!(%recorded, %target, "transferring mirror to a different server");
        } else {
            warn!(%recorded, %target, "mirror was grabbed from a different server");
        }
    }
    Ok(status)
}

pub fn record_origin(root: &Path, target: &str) -> SyncResult<NodeMetadata> {
    let meta = NodeMetadata::new(target).touched();
    let path = node_path(root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
    }
    fs::write(&path, serde_json::to_vec_pretty(&meta)?).map_err(|e| SyncError::io(&path, e))?;
    debug!(node = %meta.node, "origin recorded");
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_then_match_then_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(check_origin(tmp.path(), "http://a", false).unwrap(), OriginStatus::Unrecorded);

        let meta = record_origin(tmp.path(), "http://A/").unwrap();
        assert!(meta.last_sync.is_some());
        assert_eq!(check_origin(tmp.path(), "http://a", false).unwrap(), OriginStatus::Matches);

        let status = check_origin(tmp.path(), "http://b", false).unwrap();
        assert_eq!(
            status,
            OriginStatus::Mismatch { recorded: "http://a".into(), target: "http://b".into() }
        );
    }

    #[test]
    fn corrupt_record_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join(".ccs")).unwrap();
        fs::write(node_path(tmp.path()), b"not json").unwrap();
        assert!(matches!(read_origin(tmp.path()), Err(SyncError::Json(_))));
    }
}
