//! Substring search over the content index.
//!
//! No ranking: an entry matches when the query appears, case-insensitively,
//! in its title or in any keyword, and matches keep index order. Queries
//! shorter than [`MIN_QUERY_CHARS`] (after trimming) match nothing.

use serde::Serialize;

use crate::index::IndexEntry;

pub const MIN_QUERY_CHARS: usize = 3;
/// Number of matches shown by [`SearchResults::top`].
pub const TOP_N: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    pub query: String,
    /// Every match, in index order.
    pub matches: Vec<IndexEntry>,
}

impl SearchResults {
    pub fn top(&self) -> &[IndexEntry] {
        &self.matches[..self.matches.len().min(TOP_N)]
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

pub fn is_searchable(query: &str) -> bool {
    query.trim().chars().count() >= MIN_QUERY_CHARS
}

pub fn entry_matches(entry: &IndexEntry, needle_lower: &str) -> bool {
    entry.title.to_lowercase().contains(needle_lower)
        || entry
            .keywords
            .iter()
            .any(|k| k.to_lowercase().contains(needle_lower))
}

pub fn search(entries: &[IndexEntry], query: &str) -> SearchResults {
    let query = query.trim();
    if !is_searchable(query) {
        return SearchResults {
            query: query.to_string(),
            matches: Vec::new(),
        };
    }
    let needle = query.to_lowercase();
    SearchResults {
        query: query.to_string(),
        matches: entries
            .iter()
            .filter(|e| entry_matches(e, &needle))
            .cloned()
            .collect(),
    }
}

/// Holds the results currently on display. A short query clears them.
#[derive(Debug, Clone, Default)]
pub struct SearchPanel {
    current: Option<SearchResults>,
}

impl SearchPanel {
    /// Run `query` and return what should now be displayed.
    pub fn update(&mut self, entries: &[IndexEntry], query: &str) -> &[IndexEntry] {
        if is_searchable(query) {
            self.current = Some(search(entries, query));
        } else {
            self.current = None;
        }
        self.displayed()
    }

    pub fn displayed(&self) -> &[IndexEntry] {
        self.current.as_ref().map(SearchResults::top).unwrap_or(&[])
    }

    pub fn results(&self) -> Option<&SearchResults> {
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, keywords: &[&str]) -> IndexEntry {
        IndexEntry {
            title: title.into(),
            category: "ontology".into(),
            doc_type: "markdown".into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            path: title.to_lowercase(),
        }
    }

    #[test]
    fn short_queries_match_nothing() {
        let entries = vec![entry("Voither Overview", &["vo"])];
        assert!(search(&entries, "vo").is_empty());
        assert!(search(&entries, "  v  ").is_empty());
        assert!(search(&entries, "").is_empty());
    }

    #[test]
    fn title_substring_matches_case_insensitively() {
        let entries = vec![entry("Other", &[]), entry("Voither Overview", &[])];
        let results = search(&entries, "voither");
        assert_eq!(results.matches.len(), 1);
        assert_eq!(results.matches[0].title, "Voither Overview");
    }

    #[test]
    fn keyword_substring_matches() {
        let entries = vec![entry("Engine", &["BRRE", "reasoning"])];
        assert_eq!(search(&entries, "brr").matches.len(), 1);
        assert_eq!(search(&entries, "REASON").matches.len(), 1);
        assert!(search(&entries, "xyz").is_empty());
    }

    #[test]
    fn results_keep_index_order_and_cap_top_five() {
        let entries: Vec<_> = (0..8).map(|i| entry(&format!("Doc {i}"), &["shared"])).collect();
        let results = search(&entries, "shared");
        assert_eq!(results.matches.len(), 8);
        let top: Vec<_> = results.top().iter().map(|e| e.title.as_str()).collect();
        assert_eq!(top, vec!["Doc 0", "Doc 1", "Doc 2", "Doc 3", "Doc 4"]);
    }

    #[test]
    fn panel_clears_on_short_query() {
        let entries = vec![entry("Voither Overview", &[])];
        let mut panel = SearchPanel::default();
        assert_eq!(panel.update(&entries, "voither").len(), 1);
        assert!(panel.update(&entries, "vo").is_empty());
        assert!(panel.results().is_none());
    }
}
