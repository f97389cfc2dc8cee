use std::collections::HashMap;

use ccs_types::VersionedArtifact;

/// Keep only the highest-version artifact per display name.
///
/// Names are scoped by parent, so two instances with the same name under
/// different parents are both kept. First-seen order is preserved; on a
/// version tie the earlier entry wins.
pub fn dedupe_latest(artifacts: impl IntoIterator<Item = VersionedArtifact>) -> Vec<VersionedArtifact> {
    let mut out: Vec<VersionedArtifact> = Vec::new();
    let mut slots: HashMap<(Option<String>, String), usize> = HashMap::new();
    for artifact in artifacts {
        let key = (artifact.parent_id.clone(), artifact.display_name.clone());
        match slots.get(&key) {
            Some(&i) => {
                if artifact.version > out[i].version {
                    out[i] = artifact;
                }
            }
            None => {
                slots.insert(key, out.len());
                out.push(artifact);
            }
        }
    }
    out
}
