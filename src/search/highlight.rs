//! Query-term highlighting for OCR excerpts

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("Invalid regex"));

/// Shortest query token that is worth highlighting
const MIN_TERM_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightSegment {
    pub text: String,
    pub matched: bool,
}

impl HighlightSegment {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            matched: false,
        }
    }
}

/// Query tokens to look for, escaped for literal matching
///
/// Case-insensitive duplicates are dropped and longer terms come first so
/// the alternation prefers "invoices" over "invoice".
pub fn match_terms(query: &str) -> Vec<String> {
    let mut tokens: Vec<&str> = NON_WORD
        .split(query)
        .filter(|t| t.chars().count() >= MIN_TERM_CHARS)
        .collect();

    tokens.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

    let mut seen: Vec<String> = Vec::new();
    let mut terms = Vec::new();
    for token in tokens {
        let folded = token.to_lowercase();
        if seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        terms.push(regex::escape(token));
    }
    terms
}

fn pattern_for(query: &str) -> Option<Regex> {
    let terms = match_terms(query);
    if terms.is_empty() {
        return None;
    }

    match Regex::new(&format!("(?i)(?:{})", terms.join("|"))) {
        Ok(re) => Some(re),
        Err(e) => {
            log::warn!("Could not build highlight pattern for {:?}: {}", query, e);
            None
        }
    }
}

/// Split `text` into matched and unmatched runs
///
/// With nothing to highlight the whole text comes back as one unmatched
/// segment.
pub fn highlight(text: &str, query: &str) -> Vec<HighlightSegment> {
    let Some(pattern) = pattern_for(query) else {
        return vec![HighlightSegment::plain(text)];
    };
    if text.is_empty() {
        return vec![HighlightSegment::plain(text)];
    }

    let mut segments = Vec::new();
    let mut cursor = 0;
    for found in pattern.find_iter(text) {
        if found.start() > cursor {
            segments.push(HighlightSegment::plain(&text[cursor..found.start()]));
        }
        segments.push(HighlightSegment {
            text: found.as_str().to_string(),
            matched: true,
        });
        cursor = found.end();
    }
    if cursor < text.len() {
        segments.push(HighlightSegment::plain(&text[cursor..]));
    }

    if segments.is_empty() {
        segments.push(HighlightSegment::plain(text));
    }
    segments
}

/// First `max_chars` characters of `text`, trimmed, with an ellipsis if cut
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
