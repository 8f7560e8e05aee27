//! Whole-word term highlighting as a pure function.
//!
//! [`highlight`] turns text into an ordered sequence of [`Segment`]s; the
//! host renders them. Concatenating every segment's `text` always yields the
//! input unchanged.
//!
//! Matching is case-insensitive, leftmost-longest and whole-word: a term
//! edge that is a word character (alphanumeric or `_`) must not touch
//! another word character. [`highlight_segments`] re-runs the pass over an
//! already highlighted sequence without touching existing annotations, so
//! highlighting is idempotent.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub term: String,
    pub definition: Option<String>,
}

/// Terms ordered longest first, then alphabetically (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    terms: Vec<Term>,
    folded: Vec<Vec<char>>,
}

/// A match of vocabulary entry `term_index` at byte range `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermMatch {
    pub start: usize,
    pub end: usize,
    pub term_index: usize,
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl Vocabulary {
    /// Build from `(term, definition)` pairs. Blank terms are skipped and
    /// case-insensitive duplicates keep the first entry (or the first that
    /// carries a definition).
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<String>)>,
        S: AsRef<str>,
    {
        let mut out: Vec<Term> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for (term, definition) in terms {
            let term = term.as_ref().trim();
            if term.is_empty() {
                continue;
            }
            let key: String = term.chars().map(fold).collect();
            if seen.insert(key.clone()) {
                out.push(Term {
                    term: term.to_string(),
                    definition,
                });
            } else if let Some(existing) = out
                .iter_mut()
                .find(|t| t.term.chars().map(fold).collect::<String>() == key)
            {
                if existing.definition.is_none() {
                    existing.definition = definition;
                }
            }
        }

        out.sort_by(|a, b| {
            b.term
                .chars()
                .count()
                .cmp(&a.term.chars().count())
                .then_with(|| a.term.to_lowercase().cmp(&b.term.to_lowercase()))
        });
        let folded = out.iter().map(|t| t.term.chars().map(fold).collect()).collect();
        Self { terms: out, folded }
    }

    /// Union of two vocabularies; entries of `self` take precedence.
    pub fn merged(&self, other: &Vocabulary) -> Vocabulary {
        Vocabulary::from_terms(
            self.terms
                .iter()
                .chain(other.terms.iter())
                .map(|t| (t.term.clone(), t.definition.clone())),
        )
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn term(&self, index: usize) -> &Term {
        &self.terms[index]
    }

    /// All non-overlapping matches in `text`, left to right.
    pub fn find_matches(&self, text: &str) -> Vec<TermMatch> {
        self.find_matches_in(text, None, None)
    }

    /// Like [`find_matches`](Self::find_matches), treating `before` and
    /// `after` as the characters surrounding `text` for boundary checks.
    pub fn find_matches_in(
        &self,
        text: &str,
        before: Option<char>,
        after: Option<char>,
    ) -> Vec<TermMatch> {
        let mut matches = Vec::new();
        if self.terms.is_empty() || text.is_empty() {
            return matches;
        }
        let chars: Vec<(usize, char)> = text.char_indices().collect();

        let mut i = 0;
        while i < chars.len() {
            let prev = if i == 0 { before } else { Some(chars[i - 1].1) };
            let mut matched = None;

            for (idx, folded) in self.folded.iter().enumerate() {
                let n = folded.len();
                if i + n > chars.len() {
                    continue;
                }
                if !chars[i..i + n]
                    .iter()
                    .zip(folded)
                    .all(|((_, c), t)| fold(*c) == *t)
                {
                    continue;
                }
                if is_word_char(folded[0]) && prev.is_some_and(is_word_char) {
                    continue;
                }
                let next = chars.get(i + n).map(|(_, c)| *c).or(after);
                if is_word_char(folded[n - 1]) && next.is_some_and(is_word_char) {
                    continue;
                }
                matched = Some((idx, n));
                break;
            }

            match matched {
                Some((idx, n)) => {
                    let start = chars[i].0;
                    let end = chars.get(i + n).map(|(b, _)| *b).unwrap_or(text.len());
                    matches.push(TermMatch {
                        start,
                        end,
                        term_index: idx,
                    });
                    i += n;
                }
                None => i += 1,
            }
        }
        matches
    }
}

/// One piece of highlighted output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Plain {
        text: String,
    },
    Term {
        /// Matched text as it appeared in the input.
        text: String,
        /// Vocabulary entry that matched.
        term: String,
        definition: Option<String>,
    },
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Plain { text } | Segment::Term { text, .. } => text,
        }
    }

    pub fn is_term(&self) -> bool {
        matches!(self, Segment::Term { .. })
    }
}

/// Annotate every vocabulary match in `text`.
pub fn highlight(text: &str, vocabulary: &Vocabulary) -> Vec<Segment> {
    let mut out = Vec::new();
    split_plain(text, None, None, vocabulary, &mut out);
    out
}

/// Re-highlight an existing sequence. `Term` segments pass through
/// untouched; `Plain` segments are scanned with their neighbours as
/// boundary context.
pub fn highlight_segments(segments: &[Segment], vocabulary: &Vocabulary) -> Vec<Segment> {
    let mut out = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Term { .. } => out.push(segment.clone()),
            Segment::Plain { text } => {
                let before = i
                    .checked_sub(1)
                    .and_then(|p| segments[p].text().chars().last());
                let after = segments
                    .get(i + 1)
                    .and_then(|n| n.text().chars().next());
                split_plain(text, before, after, vocabulary, &mut out);
            }
        }
    }
    out
}

/// Concatenate segment texts back into the original string.
pub fn render_plain(segments: &[Segment]) -> String {
    segments.iter().map(Segment::text).collect()
}

fn split_plain(
    text: &str,
    before: Option<char>,
    after: Option<char>,
    vocabulary: &Vocabulary,
    out: &mut Vec<Segment>,
) {
    let mut cursor = 0;
    for m in vocabulary.find_matches_in(text, before, after) {
        if m.start > cursor {
            out.push(Segment::Plain {
                text: text[cursor..m.start].to_string(),
            });
        }
        let entry = vocabulary.term(m.term_index);
        out.push(Segment::Term {
            text: text[m.start..m.end].to_string(),
            term: entry.term.clone(),
            definition: entry.definition.clone(),
        });
        cursor = m.end;
    }
    if cursor < text.len() {
        out.push(Segment::Plain {
            text: text[cursor..].to_string(),
        });
    }
}
