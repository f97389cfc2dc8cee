use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Logical type of a mirrored artifact (`widget`, `theme`, `element`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactKind(String);

impl ArtifactKind {
    /// Kinds are lower-case identifiers; they double as directory names.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if valid {
            Ok(Self(name))
        } else {
            Err(TypeError::InvalidKind(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A remote artifact as reported by a listing operation.
///
/// Several artifacts may share a display name when the server keeps more
/// than one version; within a grab only the highest version is current.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedArtifact {
    pub display_name: String,
    pub kind: ArtifactKind,
    pub version: u64,
    /// Server-side identifier used as a path parameter.
    pub remote_id: String,
    /// Descriptor or parent identifier, e.g. the widget type of an instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl VersionedArtifact {
    pub fn new(
        display_name: impl Into<String>,
        kind: ArtifactKind,
        version: u64,
        remote_id: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            kind,
            version,
            remote_id: remote_id.into(),
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Directory-safe form of the display name.
    pub fn dir_name(&self) -> String {
        dir_safe(&self.display_name)
    }
}

/// A single path segment for `name`.
///
/// Separators and reserved characters become `_`. A result that would be
/// empty or start with `.` is prefixed with `_`, so `.` and `..` never
/// escape the directory they are placed in.
pub fn dir_safe(name: &str) -> String {
    let mapped: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = mapped.trim();
    if trimmed.is_empty() || trimmed.starts_with('.') {
        format!("_{trimmed}")
    } else {
        trimmed.to_string()
    }
}
