//! Collaborators the engine consults about the local mirror: version
//! metadata, path classification and scaffolding of new artifacts.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use ccs_types::{ArtifactKind, VersionedArtifact};
use serde_json::Value;

use crate::config::STATE_DIR;
use crate::error::{SyncError, SyncResult};
use crate::layout::{ArtifactLayout, LayoutSet, LOCALES_DIR};

const META_DIR: &str = "meta";

/// Local version metadata, keyed by root-relative artifact directory.
pub trait MetadataStore: Send + Sync {
    fn read(&self, artifact_dir: &Path) -> SyncResult<Option<VersionedArtifact>>;

    fn write(&self, artifact_dir: &Path, artifact: &VersionedArtifact) -> SyncResult<()>;

    fn remove(&self, artifact_dir: &Path) -> SyncResult<()>;
}

/// JSON sidecars under `<root>/.ccs/meta/<artifact dir>.json`.
#[derive(Clone, Debug)]
pub struct JsonMetadataStore {
    dir: PathBuf,
}

impl JsonMetadataStore {
    pub fn new(root: &Path) -> Self {
        Self { dir: root.join(STATE_DIR).join(META_DIR) }
    }

    fn record_path(&self, artifact_dir: &Path) -> PathBuf {
        let mut path = self.dir.join(artifact_dir);
        let name = path
            .file_name()
            .map(|n| format!("{}.json", n.to_string_lossy()))
            .unwrap_or_else(|| "root.json".into());
        path.set_file_name(name);
        path
    }
}

impl MetadataStore for JsonMetadataStore {
    fn read(&self, artifact_dir: &Path) -> SyncResult<Option<VersionedArtifact>> {
        let path = self.record_path(artifact_dir);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::io(path, e)),
        }
    }

    fn write(&self, artifact_dir: &Path, artifact: &VersionedArtifact) -> SyncResult<()> {
        let path = self.record_path(artifact_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        }
        fs::write(&path, serde_json::to_vec_pretty(artifact)?).map_err(|e| SyncError::io(&path, e))
    }

    fn remove(&self, artifact_dir: &Path) -> SyncResult<()> {
        let path = self.record_path(artifact_dir);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::io(path, e)),
        }
    }
}

/// Where a local file sits in the mirror.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classified {
    pub kind: ArtifactKind,
    /// Root-relative artifact directory.
    pub artifact_dir: PathBuf,
    /// File name as declared by the layout.
    pub file: String,
    pub locale: Option<String>,
}

pub trait PathClassifier: Send + Sync {
    /// Classify a root-relative file path, or `None` if it belongs to no
    /// known artifact.
    fn classify(&self, relative: &Path) -> Option<Classified>;
}

/// Classifies by matching the directory chain each layout produces.
#[derive(Clone, Debug)]
pub struct LayoutClassifier {
    layouts: LayoutSet,
}

impl LayoutClassifier {
    pub fn new(layouts: LayoutSet) -> Self {
        Self { layouts }
    }

    fn match_layout(&self, layout: &dyn ArtifactLayout, parts: &[String]) -> Option<Classified> {
        let lineage = self.layouts.lineage(layout.kind()).ok()?;
        let depth = lineage.len() * 2;
        if parts.len() <= depth {
            return None;
        }
        for (i, ancestor) in lineage.iter().enumerate() {
            if parts[i * 2] != ancestor.directory() {
                return None;
            }
        }
        let artifact_dir: PathBuf = parts[..depth].iter().collect();
        let (locale, file) = match &parts[depth..] {
            [file] => (None, file),
            [dir, locale, file] if layout.per_locale() && dir == LOCALES_DIR => (Some(locale.clone()), file),
            _ => return None,
        };
        layout.file(file)?;
        Some(Classified { kind: layout.kind().clone(), artifact_dir, file: file.clone(), locale })
    }
}

impl PathClassifier for LayoutClassifier {
    fn classify(&self, relative: &Path) -> Option<Classified> {
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.first().map(String::as_str) == Some(STATE_DIR) {
            return None;
        }
        self.layouts
            .iter()
            .filter_map(|layout| self.match_layout(layout.as_ref(), &parts))
            .max_by_key(|c| c.artifact_dir.components().count())
    }
}

/// Renders what a brand-new artifact needs when it is created remotely.
pub trait Scaffolder: Send + Sync {
    /// Extra fields for the create call of `display_name`, whose local files
    /// live in `artifact_dir`. Merged over the layout's default body.
    fn render(&self, kind: &ArtifactKind, display_name: &str, artifact_dir: &Path) -> SyncResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ArtifactFile, LayoutConfig};

    fn layouts() -> LayoutSet {
        let file = |name: &str| ArtifactFile {
            name: name.into(),
            get_operation: format!("get-{name}"),
            put_operation: None,
            field: "source".into(),
            json: false,
        };
        let widget = LayoutConfig {
            kind: "widget".into(),
            directory: None,
            list_operation: "listWidgets".into(),
            items_field: "items".into(),
            id_field: "id".into(),
            name_field: "displayName".into(),
            version_field: None,
            parent_kind: None,
            parent_field: None,
            per_locale: false,
            create_operation: None,
            delete_operation: None,
            files: vec![file("display.template"), file("widget.js")],
        };
        let instance = LayoutConfig {
            kind: "instance".into(),
            directory: Some("instances".into()),
            list_operation: "listInstances".into(),
            parent_kind: Some("widget".into()),
            parent_field: Some("widgetId".into()),
            per_locale: true,
            files: vec![file("strings.json")],
            ..widget.clone()
        };
        LayoutSet::from_configs(vec![widget, instance]).unwrap()
    }

    #[test]
    fn classifies_top_level_and_child_files() {
        let classifier = LayoutClassifier::new(layouts());

        let c = classifier.classify(Path::new("widget/Foo/widget.js")).unwrap();
        assert_eq!(c.kind.as_str(), "widget");
        assert_eq!(c.artifact_dir, PathBuf::from("widget/Foo"));
        assert_eq!(c.file, "widget.js");
        assert_eq!(c.locale, None);

        let c = classifier
            .classify(Path::new("widget/Foo/instances/Home/locales/de/strings.json"))
            .unwrap();
        assert_eq!(c.kind.as_str(), "instance");
        assert_eq!(c.artifact_dir, PathBuf::from("widget/Foo/instances/Home"));
        assert_eq!(c.locale.as_deref(), Some("de"));
    }

    #[test]
    fn rejects_unknown_paths() {
        let classifier = LayoutClassifier::new(layouts());
        assert!(classifier.classify(Path::new("widget/Foo/notes.txt")).is_none());
        assert!(classifier.classify(Path::new("theme/Dark/styles.less")).is_none());
        assert!(classifier.classify(Path::new("widget/display.template")).is_none());
        assert!(classifier.classify(Path::new("../widget/Foo/widget.js")).is_none());
        assert!(classifier.classify(Path::new(".ccs/meta/widget/Foo.json")).is_none());
        assert!(classifier.classify(Path::new("widget/Foo/locales/de/widget.js")).is_none());
    }

    #[test]
    fn json_metadata_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonMetadataStore::new(tmp.path());
        let dir = Path::new("widget/Foo");
        assert_eq!(store.read(dir).unwrap(), None);

        let artifact = VersionedArtifact::new("Foo", ArtifactKind::new("widget").unwrap(), 3, "w1");
        store.write(dir, &artifact).unwrap();
        assert_eq!(store.read(dir).unwrap(), Some(artifact));
        assert!(tmp.path().join(".ccs/meta/widget/Foo.json").is_file());

        store.remove(dir).unwrap();
        assert_eq!(store.read(dir).unwrap(), None);
    }
}
