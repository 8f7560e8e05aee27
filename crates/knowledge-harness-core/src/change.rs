//! Content fingerprints and change detection.
//!
//! Every incoming document is hashed with SHA-256 and compared against the
//! fingerprint remembered from the previous run:
//!
//! | Prior fingerprint | Hash | Bucket |
//! |-------------------|------|--------|
//! | none | — | `new` |
//! | present | differs | `modified` |
//! | present | equal | `unchanged` |
//! | present, no incoming doc | — | `deleted` |
//! | present, source could not read it | — | `unchanged` ([`ChangeSet::keep_unreadable`]) |
//!
//! Unchanged documents are skipped by every downstream stage.

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};

use crate::models::{Fingerprint, SourceDocument};

/// SHA-256 over the content plus the declared category, lowercase hex.
///
/// The category participates so that re-declaring a document's category
/// re-classifies it.
pub fn content_hash(content: &str, category: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    if let Some(category) = category {
        hasher.update([0u8]);
        hasher.update(category.trim().to_lowercase().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub fn document_hash(doc: &SourceDocument) -> String {
    content_hash(&doc.content, doc.category.as_deref())
}

/// Four disjoint, sorted id sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub new: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub unchanged: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    /// Hash of every incoming document, keyed by id.
    pub hashes: BTreeMap<String, String>,
}

impl ChangeSet {
    /// Ids that need downstream processing (new ∪ modified).
    pub fn changed(&self) -> impl Iterator<Item = &String> {
        self.new.iter().chain(self.modified.iter())
    }

    pub fn is_changed(&self, id: &str) -> bool {
        self.new.contains(id) || self.modified.contains(id)
    }

    pub fn has_changes(&self) -> bool {
        !(self.new.is_empty() && self.modified.is_empty() && self.deleted.is_empty())
    }

    /// Move ids the source saw but could not read out of `deleted` into
    /// `unchanged`. Returns the ids kept; ids with no prior fingerprint
    /// are ignored.
    pub fn keep_unreadable<'a, I>(&mut self, ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut kept = Vec::new();
        for id in ids {
            if self.deleted.remove(id) {
                self.unchanged.insert(id.clone());
                kept.push(id.clone());
            }
        }
        kept
    }
}

/// Classify incoming documents against the prior fingerprints.
///
/// When the same id appears twice in `docs`, the last occurrence wins.
pub fn detect_changes(
    docs: &[SourceDocument],
    fingerprints: &BTreeMap<String, Fingerprint>,
) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for doc in docs {
        if changes.hashes.contains_key(&doc.id) {
            tracing::warn!(document = %doc.id, "duplicate document id in source set, last one wins");
        }
        changes.hashes.insert(doc.id.clone(), document_hash(doc));
    }

    for (id, hash) in &changes.hashes {
        match fingerprints.get(id) {
            None => {
                changes.new.insert(id.clone());
            }
            Some(fp) if fp.content_hash != *hash => {
                changes.modified.insert(id.clone());
            }
            Some(_) => {
                changes.unchanged.insert(id.clone());
            }
        }
    }

    for id in fingerprints.keys() {
        if !changes.hashes.contains_key(id) {
            changes.deleted.insert(id.clone());
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fp(id: &str, content: &str) -> (String, Fingerprint) {
        (
            id.to_string(),
            Fingerprint {
                document_id: id.to_string(),
                content_hash: content_hash(content, None),
                last_synced: Utc::now(),
            },
        )
    }

    #[test]
    fn hash_is_deterministic_and_category_sensitive() {
        assert_eq!(content_hash("abc", None), content_hash("abc", None));
        assert_eq!(content_hash("abc", None).len(), 64);
        assert_ne!(content_hash("abc", None), content_hash("abc", Some("graph")));
        assert_eq!(
            content_hash("abc", Some("Graph")),
            content_hash("abc", Some("graph "))
        );
    }

    #[test]
    fn buckets_are_disjoint_and_complete() {
        let prior: BTreeMap<_, _> = [fp("a", "same"), fp("b", "old"), fp("gone", "x")]
            .into_iter()
            .collect();
        let docs = vec![
            SourceDocument::new("a", "same"),
            SourceDocument::new("b", "new text"),
            SourceDocument::new("c", "fresh"),
        ];

        let changes = detect_changes(&docs, &prior);
        assert_eq!(changes.unchanged, BTreeSet::from(["a".to_string()]));
        assert_eq!(changes.modified, BTreeSet::from(["b".to_string()]));
        assert_eq!(changes.new, BTreeSet::from(["c".to_string()]));
        assert_eq!(changes.deleted, BTreeSet::from(["gone".to_string()]));
        assert!(changes.has_changes());
        assert_eq!(changes.changed().count(), 2);
    }

    #[test]
    fn no_changes_when_everything_matches() {
        let prior: BTreeMap<_, _> = [fp("a", "one")].into_iter().collect();
        let changes = detect_changes(&[SourceDocument::new("a", "one")], &prior);
        assert!(!changes.has_changes());
        assert!(changes.unchanged.contains("a"));
    }

    #[test]
    fn duplicate_ids_keep_last_occurrence() {
        let docs = vec![
            SourceDocument::new("a", "first"),
            SourceDocument::new("a", "second"),
        ];
        let changes = detect_changes(&docs, &BTreeMap::new());
        assert_eq!(changes.new.len(), 1);
        assert_eq!(changes.hashes["a"], content_hash("second", None));
    }

    #[test]
    fn unreadable_documents_are_kept_not_deleted() {
        let prior: BTreeMap<_, _> = [fp("a", "one"), fp("b", "two")].into_iter().collect();
        let mut changes = detect_changes(&[SourceDocument::new("a", "one")], &prior);
        assert!(changes.deleted.contains("b"));

        let unreadable = vec!["b".to_string(), "never-seen".to_string()];
        assert_eq!(changes.keep_unreadable(&unreadable), vec!["b".to_string()]);
        assert!(changes.deleted.is_empty());
        assert!(changes.unchanged.contains("b"));
        assert!(!changes.unchanged.contains("never-seen"));
        assert!(!changes.has_changes());
    }
}
