//! Append-only sync history.
//!
//! Each committed run appends one [`SyncRecord`]. Records are never
//! mutated once appended; cumulative totals are computed from the previous
//! latest record at append time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-run bucket counts from the change detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub added: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub deleted: u64,
}

/// Running sums since the first run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeTotals {
    pub added: u64,
    pub updated: u64,
    pub deleted: u64,
}

impl CumulativeTotals {
    pub fn after(&self, counts: &SyncCounts) -> Self {
        Self {
            added: self.added + counts.added,
            updated: self.updated + counts.updated,
            deleted: self.deleted + counts.deleted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// 1-based position in the ledger.
    pub sequence: u64,
    /// Snapshot version this run produced.
    pub snapshot: u64,
    pub revision: Option<String>,
    pub repository: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub counts: SyncCounts,
    pub totals: CumulativeTotals,
    pub document_count: u64,
    pub concept_count: u64,
    pub edge_count: u64,
    pub pending_embeddings: u64,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Everything a run knows about itself before it is appended.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub snapshot: u64,
    pub revision: Option<String>,
    pub repository: Option<String>,
    pub counts: SyncCounts,
    pub document_count: u64,
    pub concept_count: u64,
    pub edge_count: u64,
    pub pending_embeddings: u64,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    records: Vec<SyncRecord>,
}

impl Ledger {
    /// Restore a ledger from stored records (sorted by sequence).
    pub fn from_records(mut records: Vec<SyncRecord>) -> Self {
        records.sort_by_key(|r| r.sequence);
        Self { records }
    }

    pub fn latest(&self) -> Option<&SyncRecord> {
        self.records.last()
    }

    pub fn totals(&self) -> CumulativeTotals {
        self.latest().map(|r| r.totals).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records oldest first.
    pub fn records(&self) -> &[SyncRecord] {
        &self.records
    }

    /// The most recent `limit` records, oldest first.
    pub fn recent(&self, limit: usize) -> &[SyncRecord] {
        let start = self.records.len().saturating_sub(limit);
        &self.records[start..]
    }

    /// Append a record for `summary` and return it.
    pub fn append(&mut self, summary: RunSummary, timestamp: DateTime<Utc>) -> &SyncRecord {
        let record = SyncRecord {
            sequence: self.latest().map(|r| r.sequence + 1).unwrap_or(1),
            snapshot: summary.snapshot,
            revision: summary.revision,
            repository: summary.repository,
            timestamp,
            totals: self.totals().after(&summary.counts),
            counts: summary.counts,
            document_count: summary.document_count,
            concept_count: summary.concept_count,
            edge_count: summary.edge_count,
            pending_embeddings: summary.pending_embeddings,
            notes: summary.notes,
        };
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(added: u64, updated: u64, unchanged: u64, deleted: u64) -> RunSummary {
        RunSummary {
            counts: SyncCounts {
                added,
                updated,
                unchanged,
                deleted,
            },
            ..Default::default()
        }
    }

    #[test]
    fn totals_accumulate_from_previous_record() {
        let mut ledger = Ledger::default();
        ledger.append(summary(3, 0, 0, 0), Utc::now());
        ledger.append(summary(1, 2, 3, 1), Utc::now());
        let latest = ledger.latest().unwrap();
        assert_eq!(latest.sequence, 2);
        assert_eq!(
            latest.totals,
            CumulativeTotals {
                added: 4,
                updated: 2,
                deleted: 1
            }
        );
    }

    #[test]
    fn idle_run_keeps_totals() {
        let mut ledger = Ledger::default();
        ledger.append(summary(1, 0, 0, 0), Utc::now());
        let before = ledger.totals();
        ledger.append(summary(0, 0, 1, 0), Utc::now());
        assert_eq!(ledger.totals(), before);
        assert_eq!(ledger.latest().unwrap().counts.unchanged, 1);
    }

    #[test]
    fn appending_never_touches_prior_records() {
        let mut ledger = Ledger::default();
        ledger.append(summary(1, 0, 0, 0), Utc::now());
        let first = ledger.records()[0].clone();
        ledger.append(summary(5, 5, 5, 5), Utc::now());
        assert_eq!(ledger.records()[0], first);
    }

    #[test]
    fn recent_returns_tail() {
        let mut ledger = Ledger::default();
        for _ in 0..25 {
            ledger.append(summary(1, 0, 0, 0), Utc::now());
        }
        let recent = ledger.recent(20);
        assert_eq!(recent.len(), 20);
        assert_eq!(recent[0].sequence, 6);
        assert_eq!(recent[19].sequence, 25);
        assert_eq!(ledger.recent(100).len(), 25);
    }

    #[test]
    fn from_records_sorts_by_sequence() {
        let mut ledger = Ledger::default();
        ledger.append(summary(1, 0, 0, 0), Utc::now());
        ledger.append(summary(1, 0, 0, 0), Utc::now());
        let mut records = ledger.records().to_vec();
        records.reverse();
        assert_eq!(Ledger::from_records(records), ledger);
    }
}
