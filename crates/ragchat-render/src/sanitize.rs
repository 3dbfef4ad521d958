// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! HTML sanitization: the only barrier between model / document content and
//! the page.
//!
//! Everything outside [`ALLOW_LIST`] is removed: unknown tags are unwrapped
//! (their text survives), `script` and `style` are dropped together with
//! their content, and unknown attributes are discarded.  URLs are limited to
//! ammonia's default safe schemes, so `javascript:` and `data:` never make it
//! into `href` or `src`.  `target` survives only with a value that keeps
//! the link in the current browsing context, because `rel` is passed through
//! as written and cannot be relied on to carry `noopener`.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

/// Tag and attribute allow-list.  Changing it is a security decision: bump
/// `version` and update the snapshot test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowList {
    pub version: u32,
    pub tags: &'static [&'static str],
    pub attributes: &'static [&'static str],
    /// Accepted values of `target`, compared ASCII case-insensitively.
    pub targets: &'static [&'static str],
}

pub const ALLOW_LIST_VERSION: u32 = 2;

pub const ALLOW_LIST: AllowList = AllowList {
    version: ALLOW_LIST_VERSION,
    tags: &[
        "h1", "h2", "h3", "h4", "h5", "h6",
        "p", "br", "hr",
        "ul", "ol", "li",
        "blockquote", "pre", "code",
        "span", "strong", "em", "del",
        "a",
        "table", "thead", "tbody", "tr", "th", "td",
        "img",
    ],
    attributes: &["href", "target", "rel", "class", "src", "alt", "title"],
    targets: &["_self", "_parent", "_top"],
};

fn filter_attribute<'a>(_element: &str, attribute: &str, value: &'a str) -> Option<Cow<'a, str>> {
    match attribute {
        "target" => ALLOW_LIST
            .targets
            .iter()
            .any(|t| t.eq_ignore_ascii_case(value.trim()))
            .then(|| Cow::Borrowed(value)),
        _ => Some(Cow::Borrowed(value)),
    }
}

fn builder(list: &AllowList) -> ammonia::Builder<'static> {
    let mut b = ammonia::Builder::default();
    b.tags(list.tags.iter().copied().collect::<HashSet<_>>())
        .tag_attributes(HashMap::new())
        .generic_attributes(list.attributes.iter().copied().collect::<HashSet<_>>())
        .generic_attribute_prefixes(HashSet::new())
        // `rel` is an allowed attribute; ammonia refuses to manage it as well.
        .link_rel(None)
        .attribute_filter(filter_attribute);
    b
}

/// Restrict `html` to [`ALLOW_LIST`].
pub fn sanitize_html(html: &str) -> String {
    builder(&ALLOW_LIST).clean(html).to_string()
}
