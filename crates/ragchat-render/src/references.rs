// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Reference list shown under an assistant reply.
//!
//! Retrieval returns one document per matching chunk, so the same source
//! usually appears several times.  [`aggregate`] folds them into one entry
//! per title, counts them, and orders the result by descending count.  Ties
//! keep the order in which titles first appeared.

use std::collections::HashMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::message::RetrievedDocument;

/// Title given to documents that carry none.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Characters left alone by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    pub count: usize,
}

impl Reference {
    /// Link to the dataset detail view filtered by this title:
    /// `{route}/{dataset_id}?search={title}`.
    pub fn href(&self, route: &str, dataset_id: &str) -> String {
        format!(
            "{}/{}?search={}",
            route.trim_end_matches('/'),
            utf8_percent_encode(dataset_id, URI_COMPONENT),
            utf8_percent_encode(&self.title, URI_COMPONENT)
        )
    }
}

/// Aggregate with [`UNKNOWN_TITLE`] as the bucket for untitled documents.
pub fn aggregate(docs: &[RetrievedDocument]) -> Vec<Reference> {
    aggregate_with_unknown(docs, UNKNOWN_TITLE)
}

/// Group `docs` by exact title and count them.  Missing or blank titles are
/// counted under `unknown`, so the counts always add up to `docs.len()`.
pub fn aggregate_with_unknown(docs: &[RetrievedDocument], unknown: &str) -> Vec<Reference> {
    let mut refs: Vec<Reference> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for doc in docs {
        let title = doc
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(unknown);
        match index.get(title) {
            Some(&i) => refs[i].count += 1,
            None => {
                index.insert(title, refs.len());
                refs.push(Reference { title: title.to_string(), count: 1 });
            }
        }
    }

    // Stable: equal counts stay in first-appearance order.
    refs.sort_by(|a, b| b.count.cmp(&a.count));
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn docs(titles: &[Option<&str>]) -> Vec<RetrievedDocument> {
        titles
            .iter()
            .map(|t| RetrievedDocument { title: t.map(str::to_string), ..Default::default() })
            .collect()
    }

    fn r(title: &str, count: usize) -> Reference {
        Reference { title: title.into(), count }
    }

    #[test]
    fn duplicate_titles_and_missing_title() {
        let out = aggregate(&docs(&[Some("X"), Some("X"), None]));
        assert_eq!(out, vec![r("X", 2), r("Unknown", 1)]);
    }

    #[test]
    fn blank_titles_share_the_unknown_bucket() {
        let out = aggregate(&docs(&[None, Some(""), Some("  "), Some("A")]));
        assert_eq!(out, vec![r("Unknown", 3), r("A", 1)]);
    }

    #[test]
    fn grouping_is_case_sensitive() {
        let out = aggregate(&docs(&[Some("a"), Some("A"), Some("a")]));
        assert_eq!(out, vec![r("a", 2), r("A", 1)]);
    }

    #[test]
    fn ties_keep_first_appearance_order() {
        let out = aggregate(&docs(&[Some("B"), Some("A"), Some("C"), Some("A"), Some("B")]));
        assert_eq!(out, vec![r("B", 2), r("A", 2), r("C", 1)]);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn custom_unknown_label() {
        let out = aggregate_with_unknown(&docs(&[None]), "Untitled");
        assert_eq!(out, vec![r("Untitled", 1)]);
    }

    #[test]
    fn href_encodes_dataset_and_title() {
        let link = r("Report A&B/ü", 1).href("/datasets/", "ds 1");
        assert_eq!(link, "/datasets/ds%201?search=Report%20A%26B%2F%C3%BC");
        let link = r("notes (v2)", 1).href("/datasets", "7");
        assert_eq!(link, "/datasets/7?search=notes%20(v2)");
    }

    proptest! {
        #[test]
        fn counts_sum_to_input_length(
            titles in proptest::collection::vec(proptest::option::of("[a-c ]{0,2}"), 0..40)
        ) {
            let input: Vec<RetrievedDocument> = titles
                .iter()
                .map(|t| RetrievedDocument { title: t.clone(), ..Default::default() })
                .collect();
            let out = aggregate(&input);

            prop_assert_eq!(out.iter().map(|r| r.count).sum::<usize>(), input.len());

            let expected: BTreeSet<String> = titles
                .iter()
                .map(|t| match t {
                    Some(t) if !t.trim().is_empty() => t.clone(),
                    _ => UNKNOWN_TITLE.to_string(),
                })
                .collect();
            let got: BTreeSet<String> = out.iter().map(|r| r.title.clone()).collect();
            prop_assert_eq!(got.len(), out.len());
            prop_assert_eq!(got, expected);

            prop_assert!(out.windows(2).all(|w| w[0].count >= w[1].count));
            prop_assert_eq!(aggregate(&input), out);
        }
    }
}
