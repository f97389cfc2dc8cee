use std::path::PathBuf;

/// Default number of concurrent downloads.
pub const DEFAULT_GRAB_CONCURRENCY: usize = 20;
/// Default number of concurrent uploads; kept low so the server does not
/// recompile many artifacts at once.
pub const DEFAULT_PUT_CONCURRENCY: usize = 6;

/// Directory under the mirror root holding ccsync's own bookkeeping.
pub const STATE_DIR: &str = ".ccs";

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub root: PathBuf,
    pub grab_concurrency: usize,
    pub put_concurrency: usize,
    /// Mirror is being moved to a different server than it came from.
    pub transfer_mode: bool,
}

impl SyncConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            grab_concurrency: DEFAULT_GRAB_CONCURRENCY,
            put_concurrency: DEFAULT_PUT_CONCURRENCY,
            transfer_mode: false,
        }
    }

    pub fn with_grab_concurrency(mut self, n: usize) -> Self {
        self.grab_concurrency = n.max(1);
        self
    }

    pub fn with_put_concurrency(mut self, n: usize) -> Self {
        self.put_concurrency = n.max(1);
        self
    }

    pub fn with_transfer_mode(mut self, enabled: bool) -> Self {
        self.transfer_mode = enabled;
        self
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }
}
