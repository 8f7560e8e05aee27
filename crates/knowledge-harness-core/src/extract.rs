//! Text extraction: front matter, titles, keywords, concepts and relations.
//!
//! The graph merger consumes per-document lists of concept mentions
//! `(name, definition?)` and relation mentions `(a, b, relation?)`. This
//! module produces them deterministically from plain text / markdown:
//!
//! - **Concepts**: ALL-CAPS tokens (`BRRE`, `PEER-AI`, `FHIR_R4`),
//!   multi-hump CamelCase tokens (`HoloFractor`), bold spans (`**lived
//!   time**`) and any configured vocabulary term.
//! - **Definitions**: glossary lines (`**Term**: text`) and sentences that
//!   open with a concept followed by `is` / `are`.
//! - **Relations**: two consecutive concepts in a sentence joined by a known
//!   phrase (`uses`, `relates to`, `is a`, ...).

use std::collections::HashMap;

use crate::graph::normalize_key;
use crate::highlight::Vocabulary;

/// Tokens that look like acronyms but carry no domain meaning.
const STOP_WORDS: &[&str] = &[
    "THE", "AND", "FOR", "WITH", "NOT", "BUT", "ARE", "THIS", "THAT", "FROM", "YOU", "ALL",
    "ANY", "CAN", "HAS", "HAVE", "WAS", "WILL", "TODO", "NOTE", "FIXME", "README",
];

/// Relation phrases, matched against the normalized text between two
/// mentions. Articles at either end of the gap are ignored.
const RELATION_PHRASES: &[(&str, &str)] = &[
    ("relates to", "RELATES_TO"),
    ("is related to", "RELATES_TO"),
    ("uses", "USES"),
    ("utilizes", "USES"),
    ("employs", "USES"),
    ("includes", "INCLUDES"),
    ("contains", "INCLUDES"),
    ("comprises", "INCLUDES"),
    ("implements", "IMPLEMENTS"),
    ("realizes", "IMPLEMENTS"),
    ("executes", "IMPLEMENTS"),
    ("is a", "IS_A"),
    ("is an", "IS_A"),
    ("is a kind of", "IS_A"),
    ("is a type of", "IS_A"),
    ("connects to", "CONNECTS_TO"),
    ("integrates with", "CONNECTS_TO"),
    ("depends on", "DEPENDS_ON"),
    ("is part of", "PART_OF"),
    ("part of", "PART_OF"),
];

const ARTICLES: &[&str] = &["a", "an", "the"];

// ============ Front matter / titles ============

/// The handful of front-matter keys the pipeline understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub category: Option<String>,
    pub title: Option<String>,
    pub doc_type: Option<String>,
    /// Byte offset where the document body starts.
    pub body_start: usize,
}

impl FrontMatter {
    /// Parse a leading `---` block of `key: value` lines.
    ///
    /// Only flat scalar keys are read; anything else in the block is
    /// ignored. Documents without a block get `body_start == 0`.
    pub fn parse(content: &str) -> Self {
        let mut fm = FrontMatter::default();
        let trimmed = content.trim_start();
        if !trimmed.starts_with("---") {
            return fm;
        }
        let offset = content.len() - trimmed.len();
        let after_first = &trimmed[3..];
        let Some(end) = after_first.find("\n---") else {
            return fm;
        };

        for line in after_first[..end].lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'').trim();
            if value.is_empty() {
                continue;
            }
            match key.trim().to_lowercase().as_str() {
                "category" | "categories" | "axis" | "axes" => {
                    fm.category = Some(value.trim_matches(|c| c == '[' || c == ']').to_string())
                }
                "title" => fm.title = Some(value.to_string()),
                "type" => fm.doc_type = Some(value.to_string()),
                _ => {}
            }
        }

        // skip the closing fence line
        let rest_start = offset + 3 + end + 4;
        let body_start = content[rest_start.min(content.len())..]
            .find('\n')
            .map(|i| rest_start + i + 1)
            .unwrap_or(content.len());
        fm.body_start = body_start.min(content.len());
        fm
    }
}

/// Document body with any front-matter block removed.
pub fn body(content: &str) -> &str {
    &content[FrontMatter::parse(content).body_start..]
}

/// Last path segment without its extension.
pub fn file_stem(id: &str) -> &str {
    let name = id.rsplit(['/', '\\']).next().unwrap_or(id);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(pos) => &name[..pos],
    }
}

/// Front-matter title, else first `# ` heading, else the file stem.
pub fn extract_title(id: &str, content: &str) -> String {
    let fm = FrontMatter::parse(content);
    if let Some(title) = fm.title {
        return title;
    }
    for line in content[fm.body_start..].lines() {
        if let Some(heading) = line.strip_prefix("# ") {
            let heading = heading.trim();
            if !heading.is_empty() {
                return heading.to_string();
            }
        }
    }
    let stem = file_stem(id);
    if stem.is_empty() {
        id.to_string()
    } else {
        stem.to_string()
    }
}

/// Front-matter `type`, else a name derived from the file extension.
pub fn document_type(id: &str, content: &str) -> String {
    if let Some(t) = FrontMatter::parse(content).doc_type {
        return t.to_lowercase();
    }
    let ext = id
        .rsplit_once('.')
        .map(|(_, e)| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "md" | "markdown" => "markdown",
        "yml" | "yaml" => "yaml",
        "json" => "json",
        "txt" | "text" => "text",
        _ => "file",
    }
    .to_string()
}

/// Keywords from a document's file name: words split on `_`, `-`, `.` and
/// whitespace, lower-cased, longer than two characters.
pub fn filename_keywords(id: &str) -> Vec<String> {
    file_stem(id)
        .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() > 2)
        .collect()
}

// ============ Mentions ============

/// A concept found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptMention {
    pub name: String,
    pub definition: Option<String>,
}

/// A relation between two concepts found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMention {
    pub source: String,
    pub target: String,
    pub relation: Option<String>,
}

/// Everything extracted from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub concepts: Vec<ConceptMention>,
    pub relations: Vec<RelationMention>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty() && self.relations.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Mention {
    start: usize,
    end: usize,
    name: String,
}

/// Deterministic concept/relation extractor.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    terms: Vocabulary,
}

impl Extractor {
    pub fn new(terms: Vocabulary) -> Self {
        Self { terms }
    }

    pub fn extract(&self, content: &str) -> Extraction {
        let body = body(content);
        let mut out = Extraction::default();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (term, definition) in glossary_definitions(body) {
            record_concept(&mut out, &mut seen, &term, Some(definition));
        }

        let mut in_fence = false;
        for line in body.lines() {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }

            for sentence in split_sentences(line) {
                let mentions = self.mentions(sentence);
                if mentions.is_empty() {
                    continue;
                }

                let definition = sentence_definition(sentence, &mentions[0]);
                for (i, m) in mentions.iter().enumerate() {
                    let def = if i == 0 { definition.clone() } else { None };
                    record_concept(&mut out, &mut seen, &m.name, def);
                }

                for pair in mentions.windows(2) {
                    let (a, b) = (&pair[0], &pair[1]);
                    if normalize_key(&a.name) == normalize_key(&b.name) {
                        continue;
                    }
                    if let Some(relation) = relation_between(&sentence[a.end..b.start]) {
                        let rel = RelationMention {
                            source: a.name.clone(),
                            target: b.name.clone(),
                            relation: Some(relation.to_string()),
                        };
                        if !out.relations.contains(&rel) {
                            out.relations.push(rel);
                        }
                    }
                }
            }
        }

        out
    }

    /// Non-overlapping mentions in `sentence`, ordered by position.
    ///
    /// Longer spans win over shorter ones starting inside them.
    fn mentions(&self, sentence: &str) -> Vec<Mention> {
        let mut found: Vec<Mention> = Vec::new();

        for m in self.terms.find_matches(sentence) {
            found.push(Mention {
                start: m.start,
                end: m.end,
                name: self.terms.term(m.term_index).term.clone(),
            });
        }

        for (start, end) in bold_spans(sentence) {
            let inner = sentence[start + 2..end - 2].trim();
            if !inner.is_empty() && inner.chars().count() <= 60 {
                found.push(Mention {
                    start,
                    end,
                    name: inner.to_string(),
                });
            }
        }

        for (start, end) in tokens(sentence) {
            let token = &sentence[start..end];
            if is_concept_token(token) {
                found.push(Mention {
                    start,
                    end,
                    name: token.to_string(),
                });
            }
        }

        found.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        let mut result: Vec<Mention> = Vec::new();
        for m in found {
            match result.last() {
                Some(last) if m.start < last.end => {}
                _ => result.push(m),
            }
        }
        result
    }
}

fn record_concept(
    out: &mut Extraction,
    seen: &mut HashMap<String, usize>,
    name: &str,
    definition: Option<String>,
) {
    let key = normalize_key(name);
    if key.is_empty() {
        return;
    }
    let definition = definition.filter(|d| !d.trim().is_empty());
    match seen.get(&key) {
        Some(&idx) => {
            let existing = &mut out.concepts[idx];
            if existing.definition.is_none() {
                existing.definition = definition;
            }
        }
        None => {
            seen.insert(key, out.concepts.len());
            out.concepts.push(ConceptMention {
                name: name.to_string(),
                definition,
            });
        }
    }
}

/// `**Term**: definition` and `- **Term** — definition` lines.
fn glossary_definitions(body: &str) -> Vec<(String, String)> {
    let mut defs = Vec::new();
    for line in body.lines() {
        let line = line.trim_start();
        let line = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .unwrap_or(line)
            .trim_start();
        let Some(rest) = line.strip_prefix("**") else {
            continue;
        };
        let Some(close) = rest.find("**") else {
            continue;
        };
        let term = rest[..close].trim().trim_end_matches(':').trim();
        let after = rest[close + 2..]
            .trim_start_matches(|c: char| c == ':' || c == '—' || c == '–' || c == '-')
            .trim();
        let after = after.trim_start_matches(':').trim();
        if term.is_empty() || after.is_empty() {
            continue;
        }
        defs.push((term.to_string(), after.trim_end_matches('.').to_string()));
    }
    defs
}

/// Split a line into sentences at `.`, `!` or `?` followed by whitespace
/// or the end of the line.
fn split_sentences(line: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut iter = line.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = match iter.peek() {
                None => true,
                Some((_, next)) => next.is_whitespace(),
            };
            if at_boundary {
                let end = i + c.len_utf8();
                let s = line[start..end].trim();
                if !s.is_empty() {
                    out.push(s);
                }
                start = end;
            }
        }
    }
    let tail = line[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

/// A sentence that opens with `mention` followed by `is`/`are` defines it.
fn sentence_definition(sentence: &str, first: &Mention) -> Option<String> {
    let lead = sentence[..first.start].trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '#' | '-' | '*' | '>' | '_')
    });
    if !lead.is_empty() {
        return None;
    }
    let rest = sentence[first.end..].trim_start_matches('*');
    let lower = rest.to_lowercase();
    if !(lower.starts_with(" is ") || lower.starts_with(" are ")) {
        return None;
    }
    let def = sentence
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '#' | '-' | '>'))
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?'))
        .replace("**", "");
    let def = def.trim().to_string();
    if def.is_empty() {
        None
    } else {
        Some(def)
    }
}

fn relation_between(gap: &str) -> Option<&'static str> {
    let normalized = gap
        .replace('*', " ")
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| c == ',' || c == ':').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>();
    if normalized.is_empty() || normalized.len() > 6 {
        return None;
    }

    let lookup = |words: &[String]| -> Option<&'static str> {
        let phrase = words.join(" ");
        RELATION_PHRASES
            .iter()
            .find(|(p, _)| *p == phrase)
            .map(|(_, rel)| *rel)
    };

    if let Some(rel) = lookup(&normalized) {
        return Some(rel);
    }
    let mut words = normalized.as_slice();
    while let Some((last, rest)) = words.split_last() {
        if ARTICLES.contains(&last.as_str()) {
            words = rest;
        } else {
            break;
        }
    }
    while let Some((first, rest)) = words.split_first() {
        if ARTICLES.contains(&first.as_str()) {
            words = rest;
        } else {
            break;
        }
    }
    lookup(words)
}

/// `**...**` spans as byte ranges including the markers.
fn bold_spans(sentence: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(open) = sentence[from..].find("**") {
        let open = from + open;
        let Some(close) = sentence[open + 2..].find("**") else {
            break;
        };
        let close = open + 2 + close;
        spans.push((open, close + 2));
        from = close + 2;
    }
    spans
}

/// Maximal runs of alphanumerics, `-` and `_`, with edge punctuation trimmed.
fn tokens(sentence: &str) -> Vec<(usize, usize)> {
    let is_tok = |c: char| c.is_alphanumeric() || c == '-' || c == '_';
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in sentence.char_indices() {
        match (is_tok(c), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                out.push(trim_token(sentence, s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(trim_token(sentence, s, sentence.len()));
    }
    out.into_iter().filter(|(s, e)| s < e).collect()
}

fn trim_token(sentence: &str, mut start: usize, mut end: usize) -> (usize, usize) {
    let slice = &sentence[start..end];
    let lead = slice.len() - slice.trim_start_matches(['-', '_']).len();
    start += lead;
    let slice = &sentence[start..end];
    let trail = slice.len() - slice.trim_end_matches(['-', '_']).len();
    end -= trail;
    (start, end)
}

fn is_concept_token(token: &str) -> bool {
    is_acronym(token) || is_camel_case(token)
}

fn is_acronym(token: &str) -> bool {
    if token.chars().count() < 3 {
        return false;
    }
    let mut chars = token.chars();
    if !chars.next().is_some_and(|c| c.is_uppercase()) {
        return false;
    }
    let letters = token.chars().filter(|c| c.is_alphabetic()).count();
    let all_upper = token
        .chars()
        .all(|c| c.is_uppercase() || c.is_ascii_digit() || c == '-' || c == '_');
    all_upper && letters >= 2 && !STOP_WORDS.contains(&token)
}

fn is_camel_case(token: &str) -> bool {
    if !token.chars().all(|c| c.is_alphanumeric()) {
        return false;
    }
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 4 || !chars[0].is_uppercase() {
        return false;
    }
    let humps = chars
        .windows(2)
        .filter(|w| w[0].is_lowercase() && w[1].is_uppercase())
        .count();
    humps >= 1 && chars.iter().any(|c| c.is_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Extraction {
        Extractor::default().extract(text)
    }

    fn names(e: &Extraction) -> Vec<&str> {
        e.concepts.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn front_matter_is_parsed_and_skipped() {
        let text = "---\ncategory: glossary\ntitle: \"Terms\"\ntype: Reference\n---\n# Heading\nBody";
        let fm = FrontMatter::parse(text);
        assert_eq!(fm.category.as_deref(), Some("glossary"));
        assert_eq!(fm.title.as_deref(), Some("Terms"));
        assert_eq!(fm.doc_type.as_deref(), Some("Reference"));
        assert_eq!(body(text), "# Heading\nBody");
        assert_eq!(extract_title("x.md", text), "Terms");
        assert_eq!(document_type("x.md", text), "reference");
    }

    #[test]
    fn title_falls_back_to_heading_then_stem() {
        assert_eq!(extract_title("a/b.md", "intro\n# Voither Overview\n"), "Voither Overview");
        assert_eq!(extract_title("a/signal_layers.md", "no heading"), "signal_layers");
    }

    #[test]
    fn document_type_from_extension() {
        assert_eq!(document_type("x.md", ""), "markdown");
        assert_eq!(document_type("x.yaml", ""), "yaml");
        assert_eq!(document_type("x.txt", ""), "text");
        assert_eq!(document_type("D1", ""), "file");
    }

    #[test]
    fn filename_keywords_split_on_separators() {
        assert_eq!(
            filename_keywords("docs/clinical-time_notes.md"),
            vec!["clinical", "time", "notes"]
        );
        assert!(filename_keywords("a/of.md").is_empty());
    }

    #[test]
    fn acronym_concept_with_sentence_definition() {
        let e = extract("BRRE is the core reasoning engine");
        assert_eq!(names(&e), vec!["BRRE"]);
        assert_eq!(
            e.concepts[0].definition.as_deref(),
            Some("BRRE is the core reasoning engine")
        );
        assert!(e.relations.is_empty());
    }

    #[test]
    fn relation_phrase_links_consecutive_mentions() {
        let e = extract("BRRE relates to AUTOAGENCY.");
        assert_eq!(names(&e), vec!["BRRE", "AUTOAGENCY"]);
        assert_eq!(
            e.relations,
            vec![RelationMention {
                source: "BRRE".into(),
                target: "AUTOAGENCY".into(),
                relation: Some("RELATES_TO".into()),
            }]
        );
    }

    #[test]
    fn articles_around_phrase_are_ignored() {
        let e = extract("MEDSCRIBE uses the BRRE engine. HIPAA is a STANDARD.");
        let rels: Vec<_> = e
            .relations
            .iter()
            .map(|r| (r.source.as_str(), r.target.as_str(), r.relation.as_deref()))
            .collect();
        assert!(rels.contains(&("MEDSCRIBE", "BRRE", Some("USES"))));
        assert!(rels.contains(&("HIPAA", "STANDARD", Some("IS_A"))));
    }

    #[test]
    fn unrelated_mentions_do_not_produce_edges() {
        let e = extract("BRRE and HOLOFRACTOR ship together with many other pieces of software.");
        assert_eq!(e.concepts.len(), 2);
        assert!(e.relations.is_empty());
    }

    #[test]
    fn stop_words_and_short_tokens_are_skipped() {
        let e = extract("THE API AND an IO layer");
        assert_eq!(names(&e), vec!["API"]);
    }

    #[test]
    fn camel_case_and_hyphenated_acronyms() {
        let e = extract("HoloFractor talks to PEER-AI and FHIR_R4.");
        assert_eq!(names(&e), vec!["HoloFractor", "PEER-AI", "FHIR_R4"]);
    }

    #[test]
    fn glossary_lines_define_bold_terms() {
        let text = "- **Lived time**: subjective duration of experience.\n**kairos** — the opportune moment";
        let e = extract(text);
        let lived = e.concepts.iter().find(|c| c.name == "Lived time").unwrap();
        assert_eq!(
            lived.definition.as_deref(),
            Some("subjective duration of experience")
        );
        let kairos = e.concepts.iter().find(|c| c.name == "kairos").unwrap();
        assert_eq!(kairos.definition.as_deref(), Some("the opportune moment"));
    }

    #[test]
    fn vocabulary_terms_are_matched_whole_word() {
        let vocab = Vocabulary::from_terms([("lived time", None)]);
        let e = Extractor::new(vocab).extract("Lived time uses KAIROS. Outlived timers are not it.");
        assert_eq!(names(&e), vec!["lived time", "KAIROS"]);
        assert_eq!(e.relations.len(), 1);
    }

    #[test]
    fn code_fences_are_ignored() {
        let e = extract("```\nFOO uses BAR\n```\nBRRE");
        assert_eq!(names(&e), vec!["BRRE"]);
    }

    #[test]
    fn first_definition_within_a_document_wins() {
        let e = extract("BRRE is first.\nBRRE is second.");
        assert_eq!(e.concepts.len(), 1);
        assert_eq!(e.concepts[0].definition.as_deref(), Some("BRRE is first"));
    }
}
