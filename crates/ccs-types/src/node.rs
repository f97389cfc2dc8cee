use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin server recorded for a mirror root.
///
/// Written after a grab and compared against the targeted server before any
/// later grab or put, so that trees from different servers do not get mixed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
}

impl NodeMetadata {
    pub fn new(node: &str) -> Self {
        Self { node: normalize_node(node), last_sync: None }
    }

    pub fn touched(mut self) -> Self {
        self.last_sync = Some(Utc::now());
        self
    }

    /// Whether `target` is the same server this mirror came from.
    pub fn matches(&self, target: &str) -> bool {
        normalize_node(&self.node) == normalize_node(target)
    }
}

fn normalize_node(node: &str) -> String {
    node.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Stable short key identifying a server, used to partition per-server state.
pub fn server_key(node: &str) -> String {
    let digest = blake3::hash(normalize_node(node).as_bytes());
    hex::encode(&digest.as_bytes()[..8])
}
