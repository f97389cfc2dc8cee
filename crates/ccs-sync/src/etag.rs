//! Etag sidecar store.
//!
//! One record per mirrored file, kept under
//! `<root>/.ccs/etags/<server key>/<relative path>.etag` so that etags from
//! different servers never mix. In transfer mode the store is bypassed
//! entirely: reads find nothing and writes are dropped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ccs_types::server_key;
use tracing::debug;

use crate::config::STATE_DIR;
use crate::error::{SyncError, SyncResult};

const ETAG_DIR: &str = "etags";
const SUFFIX: &str = "etag";

#[derive(Clone, Debug)]
pub struct EtagStore {
    dir: PathBuf,
    bypassed: bool,
}

impl EtagStore {
    pub fn new(root: &Path, node: &str, transfer_mode: bool) -> Self {
        Self {
            dir: root.join(STATE_DIR).join(ETAG_DIR).join(server_key(node)),
            bypassed: transfer_mode,
        }
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    fn record_path(&self, relative: &Path) -> PathBuf {
        let mut path = self.dir.join(relative);
        let name = path
            .file_name()
            .map(|n| format!("{}.{SUFFIX}", n.to_string_lossy()))
            .unwrap_or_else(|| SUFFIX.to_string());
        path.set_file_name(name);
        path
    }

    /// Last-seen etag for a root-relative file path.
    pub fn read(&self, relative: &Path) -> SyncResult<Option<String>> {
        if self.bypassed {
            return Ok(None);
        }
        let path = self.record_path(relative);
        match fs::read_to_string(&path) {
            Ok(etag) => {
                let etag = etag.trim();
                Ok((!etag.is_empty()).then(|| etag.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::io(path, e)),
        }
    }

    pub fn write(&self, relative: &Path, etag: &str) -> SyncResult<()> {
        if self.bypassed || etag.is_empty() {
            return Ok(());
        }
        let path = self.record_path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        }
        fs::write(&path, etag).map_err(|e| SyncError::io(&path, e))?;
        debug!(path = %relative.display(), etag, "etag recorded");
        Ok(())
    }

    pub fn remove(&self, relative: &Path) -> SyncResult<()> {
        if self.bypassed {
            return Ok(());
        }
        let path = self.record_path(relative);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::io(path, e)),
        }
    }
}
