//! Per-artifact sync states and the aggregate report of a batch.
//!
//! Grab: `Unseen -> Fetching -> (Written | SkippedCurrent | SkippedNotFound | Failed)`.
//! Put: `Local -> MetadataResolved -> (Updated | Created | SkippedNoMetadata | Failed)`.
//! Only terminal states are recorded in a [`SyncReport`].

use std::fmt;

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrabState {
    Unseen,
    Fetching,
    Written,
    SkippedCurrent,
    SkippedNotFound,
    Failed(String),
}

impl GrabState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Unseen | Self::Fetching)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PutState {
    Local,
    MetadataResolved,
    Updated,
    Created,
    SkippedNoMetadata,
    Failed(String),
}

impl PutState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Local | Self::MetadataResolved)
    }
}

/// One item that could not be synced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub error: String,
}

/// Outcome counts for a grab, put or delete run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub written: usize,
    pub skipped_current: usize,
    pub skipped_not_found: usize,
    pub updated: usize,
    pub created: usize,
    pub skipped_no_metadata: usize,
    pub deleted: usize,
    pub failures: Vec<ItemFailure>,
}

impl SyncReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_grab(&mut self, item: impl Into<String>, state: GrabState) {
        match state {
            GrabState::Written => self.written += 1,
            GrabState::SkippedCurrent => self.skipped_current += 1,
            GrabState::SkippedNotFound => self.skipped_not_found += 1,
            GrabState::Failed(error) => self.fail(item, error),
            GrabState::Unseen | GrabState::Fetching => {}
        }
    }

    pub fn record_put(&mut self, item: impl Into<String>, state: PutState) {
        match state {
            PutState::Updated => self.updated += 1,
            PutState::Created => self.created += 1,
            PutState::SkippedNoMetadata => self.skipped_no_metadata += 1,
            PutState::Failed(error) => self.fail(item, error),
            PutState::Local | PutState::MetadataResolved => {}
        }
    }

    pub fn fail(&mut self, item: impl Into<String>, error: impl fmt::Display) {
        self.failures.push(ItemFailure { item: item.into(), error: error.to_string() });
    }

    pub fn merge(&mut self, other: SyncReport) {
        self.written += other.written;
        self.skipped_current += other.skipped_current;
        self.skipped_not_found += other.skipped_not_found;
        self.updated += other.updated;
        self.created += other.created;
        self.skipped_no_metadata += other.skipped_no_metadata;
        self.deleted += other.deleted;
        self.failures.extend(other.failures);
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// No item failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Items that reached any terminal state.
    pub fn total(&self) -> usize {
        self.written
            + self.skipped_current
            + self.skipped_not_found
            + self.updated
            + self.created
            + self.skipped_no_metadata
            + self.deleted
            + self.failed()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "written {}, current {}, not found {}, updated {}, created {}, no metadata {}, deleted {}, failed {}",
            self.written,
            self.skipped_current,
            self.skipped_not_found,
            self.updated,
            self.created,
            self.skipped_no_metadata,
            self.deleted,
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_terminal_states_only() {
        let mut report = SyncReport::new();
        report.record_grab("a", GrabState::Fetching);
        report.record_grab("a", GrabState::Written);
        report.record_grab("b", GrabState::SkippedCurrent);
        report.record_grab("c", GrabState::Failed("boom".into()));
        report.record_put("d", PutState::MetadataResolved);
        report.record_put("d", PutState::Created);
        assert_eq!(report.written, 1);
        assert_eq!(report.skipped_current, 1);
        assert_eq!(report.created, 1);
        assert_eq!(report.total(), 4);
        assert_eq!(report.failures, vec![ItemFailure { item: "c".into(), error: "boom".into() }]);
        assert!(!report.is_clean());
    }

    #[test]
    fn merge_adds_up() {
        let mut a = SyncReport { written: 2, ..Default::default() };
        let mut b = SyncReport { written: 1, updated: 3, ..Default::default() };
        b.fail("x", "bad");
        a.merge(b);
        assert_eq!(a.written, 3);
        assert_eq!(a.updated, 3);
        assert_eq!(a.failed(), 1);
    }

    #[test]
    fn terminal_states() {
        assert!(!GrabState::Unseen.is_terminal());
        assert!(GrabState::SkippedNotFound.is_terminal());
        assert!(!PutState::Local.is_terminal());
        assert!(PutState::SkippedNoMetadata.is_terminal());
    }
}
