//! Per-kind mirror layouts.
//!
//! How a kind of artifact is listed, fetched, stored and uploaded is not
//! known to the engine; it asks an [`ArtifactLayout`]. [`DeclarativeLayout`]
//! covers the common shape (one listing operation, a fixed set of files each
//! backed by a get/put operation pair) and is configured from TOML.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ccs_types::{ArtifactKind, VersionedArtifact};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{SyncError, SyncResult};

/// Directory holding per-locale copies of an artifact's files.
pub const LOCALES_DIR: &str = "locales";

/// One file of an artifact and the operations that move it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    /// File name inside the artifact directory.
    pub name: String,
    pub get_operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put_operation: Option<String>,
    /// Response and request body field carrying the content.
    pub field: String,
    /// Content is a JSON value rather than a string.
    #[serde(default)]
    pub json: bool,
}

impl ArtifactFile {
    /// Content of this file in a get response, ready to write to disk.
    pub fn extract(&self, body: &Value) -> SyncResult<Option<Vec<u8>>> {
        match body.get(&self.field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) if !self.json => Ok(Some(text.clone().into_bytes())),
            Some(value) => {
                let mut bytes = serde_json::to_vec_pretty(value)?;
                bytes.push(b'\n');
                Ok(Some(bytes))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub kind: String,
    /// Directory name for this kind; defaults to the kind itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    pub list_operation: String,
    #[serde(default = "default_items_field")]
    pub items_field: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default = "default_name_field")]
    pub name_field: String,
    /// Listing field with the artifact version; unversioned kinds are
    /// always refreshed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_kind: Option<String>,
    /// Listing field naming the parent's remote id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_field: Option<String>,
    #[serde(default)]
    pub per_locale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_operation: Option<String>,
    pub files: Vec<ArtifactFile>,
}

fn default_items_field() -> String {
    "items".into()
}

fn default_id_field() -> String {
    "id".into()
}

fn default_name_field() -> String {
    "displayName".into()
}

/// How one artifact kind maps between the server and the mirror.
pub trait ArtifactLayout: Send + Sync + fmt::Debug {
    fn kind(&self) -> &ArtifactKind;

    /// Directory name for this kind, relative to the root or to the parent
    /// artifact's directory.
    fn directory(&self) -> &str;

    fn parent_kind(&self) -> Option<&ArtifactKind>;

    fn per_locale(&self) -> bool;

    /// Whether listings carry versions usable for incremental skips.
    fn versioned(&self) -> bool;

    fn files(&self) -> &[ArtifactFile];

    fn list_operation(&self) -> &str;

    fn create_operation(&self) -> Option<&str>;

    fn delete_operation(&self) -> Option<&str>;

    /// Turn a listing response into artifacts.
    fn parse_listing(&self, body: &Value) -> SyncResult<Vec<VersionedArtifact>>;

    /// Body of the create call for a new artifact.
    fn create_body(&self, display_name: &str, parent_id: Option<&str>) -> Value;

    /// The artifact a create call produced.
    fn parse_created(&self, body: &Value, display_name: &str) -> Option<VersionedArtifact>;

    fn file(&self, name: &str) -> Option<&ArtifactFile> {
        self.files().iter().find(|f| f.name == name)
    }

    /// Operations a grab of this kind needs.
    fn grab_operations(&self) -> Vec<&str> {
        let mut ops = vec![self.list_operation()];
        ops.extend(self.files().iter().map(|f| f.get_operation.as_str()));
        ops
    }
}

#[derive(Clone, Debug)]
pub struct DeclarativeLayout {
    config: LayoutConfig,
    kind: ArtifactKind,
    parent_kind: Option<ArtifactKind>,
}

impl DeclarativeLayout {
    pub fn from_config(config: LayoutConfig) -> SyncResult<Self> {
        let invalid = |reason: &str| SyncError::InvalidLayout { kind: config.kind.clone(), reason: reason.into() };
        let kind = ArtifactKind::new(config.kind.clone())?;
        let parent_kind = config.parent_kind.clone().map(ArtifactKind::new).transpose()?;
        if parent_kind.as_ref() == Some(&kind) {
            return Err(invalid("a kind cannot be its own parent"));
        }
        if parent_kind.is_some() && config.parent_field.is_none() {
            return Err(invalid("parent_kind requires parent_field"));
        }
        if config.files.is_empty() {
            return Err(invalid("no files"));
        }
        let directory = config.directory.as_deref().unwrap_or(&config.kind);
        if directory.is_empty() || directory.contains(['/', '\\']) || directory.starts_with('.') {
            return Err(invalid("directory must be a single plain path segment"));
        }
        let mut names: Vec<&str> = config.files.iter().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != config.files.len() {
            return Err(invalid("duplicate file names"));
        }
        if config.per_locale && names.contains(&LOCALES_DIR) {
            return Err(invalid("file name collides with the locales directory"));
        }
        Ok(Self { config, kind, parent_kind })
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }
}

/// Listing values are ids or versions; accept both JSON strings and numbers.
fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl ArtifactLayout for DeclarativeLayout {
    fn kind(&self) -> &ArtifactKind {
        &self.kind
    }

    fn directory(&self) -> &str {
        self.config.directory.as_deref().unwrap_or(&self.config.kind)
    }

    fn parent_kind(&self) -> Option<&ArtifactKind> {
        self.parent_kind.as_ref()
    }

    fn per_locale(&self) -> bool {
        self.config.per_locale
    }

    fn versioned(&self) -> bool {
        self.config.version_field.is_some()
    }

    fn files(&self) -> &[ArtifactFile] {
        &self.config.files
    }

    fn list_operation(&self) -> &str {
        &self.config.list_operation
    }

    fn create_operation(&self) -> Option<&str> {
        self.config.create_operation.as_deref()
    }

    fn delete_operation(&self) -> Option<&str> {
        self.config.delete_operation.as_deref()
    }

    fn parse_listing(&self, body: &Value) -> SyncResult<Vec<VersionedArtifact>> {
        let items = match body {
            Value::Array(items) => items,
            other => match other.get(&self.config.items_field) {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(SyncError::InvalidListing {
                        operation: self.config.list_operation.clone(),
                        reason: format!("no `{}` array", self.config.items_field),
                    })
                }
            },
        };

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let Some(id) = scalar(item.get(&self.config.id_field)) else {
                warn!(kind = %self.kind, "listing entry without an id, ignoring");
                continue;
            };
            let name = item
                .get(&self.config.name_field)
                .and_then(Value::as_str)
                .filter(|n| !n.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| id.clone());
            let version = self
                .config
                .version_field
                .as_ref()
                .and_then(|field| scalar(item.get(field)))
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            let mut artifact = VersionedArtifact::new(name, self.kind.clone(), version, id);
            if let Some(field) = &self.config.parent_field {
                if let Some(parent) = scalar(item.get(field)) {
                    artifact = artifact.with_parent(parent);
                }
            }
            out.push(artifact);
        }
        Ok(out)
    }

    fn create_body(&self, display_name: &str, parent_id: Option<&str>) -> Value {
        let mut body = Map::new();
        body.insert(self.config.name_field.clone(), Value::String(display_name.to_string()));
        if let (Some(field), Some(parent)) = (&self.config.parent_field, parent_id) {
            body.insert(field.clone(), Value::String(parent.to_string()));
        }
        Value::Object(body)
    }

    fn parse_created(&self, body: &Value, display_name: &str) -> Option<VersionedArtifact> {
        let id = scalar(body.get(&self.config.id_field))?;
        let version = self
            .config
            .version_field
            .as_ref()
            .and_then(|field| scalar(body.get(field)))
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        let mut artifact = VersionedArtifact::new(display_name, self.kind.clone(), version, id);
        if let Some(parent) = self.config.parent_field.as_ref().and_then(|f| scalar(body.get(f))) {
            artifact = artifact.with_parent(parent);
        }
        Some(artifact)
    }
}

/// The configured layouts, indexed by kind and ordered into phases.
#[derive(Clone, Debug, Default)]
pub struct LayoutSet {
    layouts: BTreeMap<ArtifactKind, Arc<dyn ArtifactLayout>>,
}

impl LayoutSet {
    pub fn new(layouts: impl IntoIterator<Item = Arc<dyn ArtifactLayout>>) -> SyncResult<Self> {
        let mut map: BTreeMap<ArtifactKind, Arc<dyn ArtifactLayout>> = BTreeMap::new();
        for layout in layouts {
            let kind = layout.kind().clone();
            if map.insert(kind.clone(), layout).is_some() {
                return Err(SyncError::InvalidLayout { kind: kind.to_string(), reason: "declared twice".into() });
            }
        }
        let set = Self { layouts: map };
        for layout in set.layouts.values() {
            set.depth(layout.kind())?;
        }
        Ok(set)
    }

    pub fn from_configs(configs: impl IntoIterator<Item = LayoutConfig>) -> SyncResult<Self> {
        let layouts = configs
            .into_iter()
            .map(|c| DeclarativeLayout::from_config(c).map(|l| Arc::new(l) as Arc<dyn ArtifactLayout>))
            .collect::<SyncResult<Vec<_>>>()?;
        Self::new(layouts)
    }

    pub fn get(&self, kind: &ArtifactKind) -> Option<&Arc<dyn ArtifactLayout>> {
        self.layouts.get(kind)
    }

    pub fn require(&self, kind: &ArtifactKind) -> SyncResult<&Arc<dyn ArtifactLayout>> {
        self.get(kind).ok_or_else(|| SyncError::UnknownKind(kind.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ArtifactLayout>> {
        self.layouts.values()
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Chain of kinds from the outermost ancestor down to `kind`.
    pub fn lineage(&self, kind: &ArtifactKind) -> SyncResult<Vec<&Arc<dyn ArtifactLayout>>> {
        let mut chain = Vec::new();
        let mut current = Some(kind);
        while let Some(k) = current {
            let layout = self.require(k)?;
            if chain.len() > self.layouts.len() {
                return Err(SyncError::InvalidLayout { kind: kind.to_string(), reason: "parent cycle".into() });
            }
            chain.push(layout);
            current = layout.parent_kind();
        }
        chain.reverse();
        Ok(chain)
    }

    fn depth(&self, kind: &ArtifactKind) -> SyncResult<usize> {
        Ok(self.lineage(kind)?.len() - 1)
    }

    /// Layouts grouped so every parent kind is in an earlier group than
    /// its children.
    pub fn phases(&self) -> SyncResult<Vec<Vec<Arc<dyn ArtifactLayout>>>> {
        let mut phases: Vec<Vec<Arc<dyn ArtifactLayout>>> = Vec::new();
        for layout in self.layouts.values() {
            let depth = self.depth(layout.kind())?;
            if phases.len() <= depth {
                phases.resize_with(depth + 1, Vec::new);
            }
            phases[depth].push(Arc::clone(layout));
        }
        Ok(phases)
    }

    /// Kinds that declare `kind` as their parent.
    pub fn children(&self, kind: &ArtifactKind) -> Vec<&Arc<dyn ArtifactLayout>> {
        self.layouts
            .values()
            .filter(|l| l.parent_kind() == Some(kind))
            .collect()
    }
}

/// Root-relative directory of an artifact.
///
/// Top-level kinds live at `<kind dir>/<name>`; child kinds live under their
/// parent's directory at `<parent dir>/<kind dir>/<name>`.
pub fn artifact_dir(layout: &dyn ArtifactLayout, artifact: &VersionedArtifact, parent_dir: Option<&Path>) -> PathBuf {
    let base = parent_dir.map(Path::to_path_buf).unwrap_or_default();
    base.join(layout.directory()).join(artifact.dir_name())
}

/// Root-relative path of one file of an artifact, optionally per locale.
pub fn file_path(dir: &Path, file: &ArtifactFile, locale: Option<&str>) -> PathBuf {
    match locale {
        Some(locale) => dir.join(LOCALES_DIR).join(locale).join(&file.name),
        None => dir.join(&file.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn widget_config() -> LayoutConfig {
        LayoutConfig {
            kind: "widget".into(),
            directory: None,
            list_operation: "listWidgets".into(),
            items_field: default_items_field(),
            id_field: default_id_field(),
            name_field: default_name_field(),
            version_field: Some("version".into()),
            parent_kind: None,
            parent_field: None,
            per_locale: false,
            create_operation: Some("createWidget".into()),
            delete_operation: None,
            files: vec![ArtifactFile {
                name: "display.template".into(),
                get_operation: "getWidgetSource".into(),
                put_operation: Some("updateWidgetSource".into()),
                field: "source".into(),
                json: false,
            }],
        }
    }

    fn instance_config() -> LayoutConfig {
        LayoutConfig {
            kind: "instance".into(),
            directory: Some("instances".into()),
            list_operation: "listInstances".into(),
            parent_kind: Some("widget".into()),
            parent_field: Some("widgetId".into()),
            per_locale: true,
            create_operation: None,
            files: vec![ArtifactFile {
                name: "strings.json".into(),
                get_operation: "getInstanceStrings".into(),
                put_operation: None,
                field: "resources".into(),
                json: true,
            }],
            ..widget_config()
        }
    }

    #[test]
    fn config_defaults() {
        let config: LayoutConfig = from_json(
            r#"{
                "kind": "theme",
                "list_operation": "listThemes",
                "files": [{"name": "styles.less", "get_operation": "getThemeSource", "field": "styles"}]
            }"#,
        );
        assert_eq!(config.items_field, "items");
        assert_eq!(config.name_field, "displayName");
        assert!(!config.per_locale);
        let layout = DeclarativeLayout::from_config(config).unwrap();
        assert_eq!(layout.directory(), "theme");
        assert!(!layout.versioned());
        assert_eq!(layout.grab_operations(), vec!["listThemes", "getThemeSource"]);
    }

    fn from_json(json: &str) -> LayoutConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn rejects_bad_layouts() {
        let mut c = widget_config();
        c.files.clear();
        assert!(DeclarativeLayout::from_config(c).is_err());

        let mut c = widget_config();
        c.directory = Some("../up".into());
        assert!(DeclarativeLayout::from_config(c).is_err());

        let mut c = instance_config();
        c.parent_field = None;
        assert!(DeclarativeLayout::from_config(c).is_err());
    }

    #[test]
    fn parses_listing_with_mixed_scalars() {
        let layout = DeclarativeLayout::from_config(widget_config()).unwrap();
        let body = json!({"items": [
            {"id": "w1", "displayName": "Foo", "version": 2},
            {"id": 7, "displayName": "Bar", "version": "3"},
            {"displayName": "NoId"},
            {"id": "w3"}
        ]});
        let artifacts = layout.parse_listing(&body).unwrap();
        assert_eq!(artifacts.len(), 3);
        assert_eq!(artifacts[0].version, 2);
        assert_eq!(artifacts[1].remote_id, "7");
        assert_eq!(artifacts[1].version, 3);
        assert_eq!(artifacts[2].display_name, "w3");
        assert_eq!(artifacts[2].version, 0);

        assert!(layout.parse_listing(&json!({"other": []})).is_err());
        assert_eq!(layout.parse_listing(&json!([{"id": "a"}])).unwrap().len(), 1);
    }

    #[test]
    fn extracts_string_and_json_content() {
        let text = &widget_config().files[0];
        assert_eq!(text.extract(&json!({"source": "<div/>"})).unwrap(), Some(b"<div/>".to_vec()));
        assert_eq!(text.extract(&json!({"other": 1})).unwrap(), None);
        let structured = &instance_config().files[0];
        let bytes = structured.extract(&json!({"resources": {"a": "b"}})).unwrap().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "{\n  \"a\": \"b\"\n}\n");
    }

    #[test]
    fn phases_order_parents_first() {
        let set = LayoutSet::from_configs(vec![instance_config(), widget_config()]).unwrap();
        let phases = set.phases().unwrap();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0][0].kind().as_str(), "widget");
        assert_eq!(phases[1][0].kind().as_str(), "instance");
        let widget = ArtifactKind::new("widget").unwrap();
        assert_eq!(set.children(&widget).len(), 1);
    }

    #[test]
    fn missing_parent_kind_is_rejected() {
        assert!(matches!(
            LayoutSet::from_configs(vec![instance_config()]),
            Err(SyncError::UnknownKind(_))
        ));
        assert!(LayoutSet::from_configs(vec![widget_config(), widget_config()]).is_err());
    }

    #[test]
    fn paths() {
        let widget = DeclarativeLayout::from_config(widget_config()).unwrap();
        let instance = DeclarativeLayout::from_config(instance_config()).unwrap();
        let foo = VersionedArtifact::new("Foo/Bar", widget.kind().clone(), 1, "w1");
        let dir = artifact_dir(&widget, &foo, None);
        assert_eq!(dir, PathBuf::from("widget/Foo_Bar"));

        let inst = VersionedArtifact::new("Home", instance.kind().clone(), 1, "i1");
        let inst_dir = artifact_dir(&instance, &inst, Some(&dir));
        assert_eq!(inst_dir, PathBuf::from("widget/Foo_Bar/instances/Home"));
        assert_eq!(
            file_path(&inst_dir, &instance.files()[0], Some("de")),
            PathBuf::from("widget/Foo_Bar/instances/Home/locales/de/strings.json")
        );
    }

    #[test]
    fn create_body_and_result() {
        let instance = DeclarativeLayout::from_config(instance_config()).unwrap();
        assert_eq!(
            instance.create_body("Home", Some("w1")),
            json!({"displayName": "Home", "widgetId": "w1"})
        );
        let created = instance
            .parse_created(&json!({"id": "i9", "widgetId": "w1"}), "Home")
            .unwrap();
        assert_eq!(created.remote_id, "i9");
        assert_eq!(created.version, 1);
        assert_eq!(created.parent_id.as_deref(), Some("w1"));
        assert!(instance.parse_created(&json!({}), "Home").is_none());
    }
}
