// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use pulldown_cmark::{html, Event, Options, Parser};

pub(crate) fn options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts
}

/// Convert highlighted reply text to HTML.
///
/// GitHub-style tables, strikethrough and fenced code are enabled, and single
/// newlines inside a paragraph become `<br />`.  Raw HTML is passed through
/// untouched: the output is not safe to display until it has been through
/// [`crate::sanitize_html`].
pub fn markdown_to_html(text: &str) -> String {
    let parser = Parser::new_ext(text, options()).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
