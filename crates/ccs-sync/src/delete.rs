//! Filesystem side of the two-pass deletion protocol.
//!
//! The tree is walked once to take a static snapshot of file paths; callers
//! act on that snapshot; a second walk then removes directories left empty,
//! deepest first. Nothing is removed while a walk is in progress.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::config::STATE_DIR;
use crate::error::{SyncError, SyncResult};

fn is_state_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == STATE_DIR
}

/// Every file under `root.join(relative)`, as root-relative paths, sorted.
///
/// The bookkeeping directory is never included. A missing directory yields
/// an empty snapshot.
pub fn snapshot_files(root: &Path, relative: &Path) -> SyncResult<Vec<PathBuf>> {
    let start = root.join(relative);
    if !start.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(&start).into_iter().filter_entry(|e| !is_state_dir(e)) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            files.push(rel.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Remove empty directories under `dir`, deepest first.
///
/// `dir` itself is removed too if it ends up empty, unless it is `keep`.
/// Returns the number of directories removed.
pub fn prune_empty_dirs(dir: &Path, keep: &Path) -> SyncResult<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut dirs: Vec<(usize, PathBuf)> = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_entry(|e| !is_state_dir(e)) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            dirs.push((entry.depth(), entry.into_path()));
        }
    }
    dirs.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = 0;
    for (_, path) in dirs {
        if path == keep {
            continue;
        }
        let empty = fs::read_dir(&path)
            .map_err(|e| SyncError::io(&path, e))?
            .next()
            .is_none();
        if !empty {
            continue;
        }
        match fs::remove_dir(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed empty directory");
                removed += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(SyncError::io(path, e)),
        }
    }
    Ok(removed)
}

/// Remove one file, treating an already-missing file as removed.
pub fn remove_file(path: &Path) -> SyncResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SyncError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn snapshot_skips_state_dir() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "widget/Foo/a.js");
        touch(tmp.path(), "widget/Foo/b/c.js");
        touch(tmp.path(), ".ccs/meta/widget/Foo.json");

        let all = snapshot_files(tmp.path(), Path::new("")).unwrap();
        assert_eq!(
            all,
            vec![PathBuf::from("widget/Foo/a.js"), PathBuf::from("widget/Foo/b/c.js")]
        );
        assert!(snapshot_files(tmp.path(), Path::new("missing")).unwrap().is_empty());
    }

    #[test]
    fn prunes_bottom_up_after_snapshot_removal() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "widget/Foo/a.js");
        touch(tmp.path(), "widget/Foo/deep/er/c.js");
        touch(tmp.path(), "widget/Bar/keep.js");

        for file in snapshot_files(tmp.path(), Path::new("widget/Foo")).unwrap() {
            remove_file(&tmp.path().join(file)).unwrap();
        }
        let removed = prune_empty_dirs(&tmp.path().join("widget"), tmp.path()).unwrap();
        assert_eq!(removed, 3);
        assert!(!tmp.path().join("widget/Foo").exists());
        assert!(tmp.path().join("widget/Bar/keep.js").exists());
    }

    #[test]
    fn keeps_the_root() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("empty/inner")).unwrap();
        prune_empty_dirs(tmp.path(), tmp.path()).unwrap();
        assert!(tmp.path().exists());
        assert!(!tmp.path().join("empty").exists());
    }
}
