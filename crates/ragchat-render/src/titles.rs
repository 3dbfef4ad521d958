// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Citation highlighting: wrap occurrences of retrieved-document titles in
//! the raw reply text before it is handed to the markdown renderer.
//!
//! A title matches literally (regex metacharacters are escaped), on word
//! boundaries, and case-sensitively.  Occurrences that touch markdown link
//! brackets, or that fall inside code, link destinations, URLs or raw HTML
//! tags, are left alone so the markdown structure is never altered.
//!
//! When titles overlap (one title is a substring of another) the longest
//! candidate wins and shorter candidates inside it are dropped, so no text is
//! ever wrapped twice.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::OnceLock;

use pulldown_cmark::{Event, Parser, Tag};
use regex::Regex;
use tracing::{trace, warn};

/// Default CSS class of the highlight span.
pub const DEFAULT_HIGHLIGHT_CLASS: &str = "reference-highlight";

/// Inline regions of markdown source in which titles are never highlighted.
/// Code is located by the markdown parser instead, see [`code_ranges`].
fn protected_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // Link and image destinations: `](...)`.
            r"\]\([^)]*\)",
            // URI and email autolinks, then raw HTML tags with their attributes.
            r"<[A-Za-z][A-Za-z0-9+.\-]*:[^<>\s]*>",
            r"<[A-Za-z0-9.!#$%&'*+/=?^_`{|}~\-]+@[A-Za-z0-9](?:[A-Za-z0-9.\-]*[A-Za-z0-9])?>",
            r"</?[A-Za-z][A-Za-z0-9\-]*(?:\s[^<>]*)?/?>",
            // Bare URLs.
            r"(?:https?|ftp)://[^\s<>()\[\]]+",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Source ranges of every code block (fenced or indented, at any nesting
/// depth) and every inline code span, as the renderer will see them.
fn code_ranges(content: &str) -> impl Iterator<Item = Range<usize>> + '_ {
    Parser::new_ext(content, crate::markdown::options())
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Start(Tag::CodeBlock(_)) | Event::Code(_) => Some(range),
            _ => None,
        })
}

/// Protected ranges, sorted and merged so that both starts and ends ascend.
fn protected_ranges(content: &str) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = protected_patterns()
        .iter()
        .flat_map(|re| re.find_iter(content).map(|m| m.range()))
        .chain(code_ranges(content))
        .collect();
    ranges.sort_by_key(|r| r.start);

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// Index at which `range` would be inserted into `sorted`, or `None` when it
/// overlaps an entry.  `sorted` must be disjoint and ordered by start.
fn insertion_point(sorted: &[Range<usize>], range: &Range<usize>) -> Option<usize> {
    let idx = sorted.partition_point(|r| r.end <= range.start);
    match sorted.get(idx) {
        Some(next) if next.start < range.end => None,
        _ => Some(idx),
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Rewrites reply text so that cited titles stand out.
#[derive(Debug, Clone)]
pub struct TitleHighlighter {
    class: String,
}

impl Default for TitleHighlighter {
    fn default() -> Self {
        Self::new(DEFAULT_HIGHLIGHT_CLASS)
    }
}

impl TitleHighlighter {
    /// Characters outside `[A-Za-z0-9_- ]` are dropped from `class` so the
    /// value can never break out of the attribute.
    pub fn new(class: &str) -> Self {
        let class: String = class
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' '))
            .collect();
        let class = class.trim();
        let class = if class.is_empty() { DEFAULT_HIGHLIGHT_CLASS } else { class };
        Self { class: class.to_string() }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Wrap every qualifying occurrence of each title in `content`.
    ///
    /// Titles are deduplicated and empty titles ignored.  The wrapped text is
    /// the text as it appears in `content`.
    pub fn highlight<I, S>(&self, content: &str, titles: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let owned: Vec<S> = titles.into_iter().collect();
        let unique: BTreeSet<&str> = owned
            .iter()
            .map(|t| t.as_ref())
            .filter(|t| !t.trim().is_empty())
            .collect();
        if unique.is_empty() || content.is_empty() {
            return content.to_string();
        }

        let protected = protected_ranges(content);
        let mut candidates: Vec<Range<usize>> = Vec::new();
        for title in &unique {
            candidates.extend(find_occurrences(content, title, &protected));
        }

        // Longest first, then leftmost; accept only non-overlapping spans.
        // `accepted` stays ordered by start.
        candidates.sort_by(|a, b| b.len().cmp(&a.len()).then(a.start.cmp(&b.start)));
        let mut accepted: Vec<Range<usize>> = Vec::with_capacity(candidates.len());
        for cand in candidates {
            if let Some(idx) = insertion_point(&accepted, &cand) {
                accepted.insert(idx, cand);
            }
        }
        trace!(titles = unique.len(), matches = accepted.len(), "highlighting titles");

        let mut out = String::with_capacity(content.len() + accepted.len() * 48);
        let mut cursor = 0;
        for range in accepted {
            out.push_str(&content[cursor..range.start]);
            out.push_str(&format!(
                "<span class=\"{}\"><strong>{}</strong></span>",
                self.class,
                &content[range.clone()]
            ));
            cursor = range.end;
        }
        out.push_str(&content[cursor..]);
        out
    }
}

/// Byte ranges of every occurrence of `title` that qualifies for
/// highlighting.
fn find_occurrences(content: &str, title: &str, protected: &[Range<usize>]) -> Vec<Range<usize>> {
    let re = match Regex::new(&regex::escape(title)) {
        Ok(re) => re,
        Err(e) => {
            warn!(title, error = %e, "skipping title that cannot be matched");
            return Vec::new();
        }
    };
    let starts_word = title.chars().next().is_some_and(is_word_char);
    let ends_word = title.chars().next_back().is_some_and(is_word_char);

    let mut found = Vec::new();
    let mut pos = 0;
    while let Some(m) = re.find_at(content, pos) {
        let before = content[..m.start()].chars().next_back();
        let after = content[m.end()..].chars().next();

        let bounded = !(starts_word && before.is_some_and(is_word_char))
            && !(ends_word && after.is_some_and(is_word_char));
        let outside_link = before != Some('[') && !matches!(after, Some(']') | Some('('));
        let range = m.range();
        let unprotected = insertion_point(protected, &range).is_some();

        if bounded && outside_link && unprotected {
            pos = m.end();
            found.push(range);
        } else {
            // A rejected match may hide an overlapping occurrence that
            // qualifies, so resume one character later.
            let step = content[m.start()..].chars().next().map_or(1, char::len_utf8);
            pos = m.start() + step;
        }
        if pos >= content.len() {
            break;
        }
    }
    found
}

/// Highlight `titles` in `content` using [`DEFAULT_HIGHLIGHT_CLASS`].
pub fn highlight_titles<I, S>(content: &str, titles: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    TitleHighlighter::default().highlight(content, titles)
}
