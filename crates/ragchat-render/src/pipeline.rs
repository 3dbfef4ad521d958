// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-message rendering: title highlighting → markdown → sanitization →
//! code highlighting, plus the reference list.
//!
//! A message may be re-rendered many times while it streams.  [`RenderBoard`]
//! hands out a fresh [`RenderToken`] for every render of a message and only
//! accepts the result carrying the newest token, so a slow render that
//! finishes late never overwrites a newer one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use ragchat_config::RenderConfig;
use serde::Serialize;
use tracing::debug;

use crate::code::{contains_code_block, HighlightCache};
use crate::markdown::markdown_to_html;
use crate::message::{ChatMessage, MessageStatus, Role};
use crate::references::{aggregate_with_unknown, Reference};
use crate::sanitize::sanitize_html;
use crate::titles::TitleHighlighter;

/// A reference as displayed: the aggregate plus the dataset link, when the
/// message knows which dataset it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedReference {
    #[serde(flatten)]
    pub reference: Reference,
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    pub message_id: Option<String>,
    pub role: Role,
    pub status: MessageStatus,
    /// Sanitized HTML fragment.
    pub html: String,
    pub references: Vec<LinkedReference>,
    /// Present when the regenerate action applies to this message.
    pub regenerate_key: Option<String>,
}

pub struct Renderer {
    titles: TitleHighlighter,
    unknown_title: String,
    dataset_route: String,
    highlight_code: bool,
    cache: Arc<HighlightCache>,
}

impl Renderer {
    /// Renderer backed by the process-wide highlighter cache.
    pub fn new(cfg: &RenderConfig) -> Self {
        Self::with_cache(cfg, HighlightCache::global())
    }

    pub fn with_cache(cfg: &RenderConfig, cache: Arc<HighlightCache>) -> Self {
        Self {
            titles: TitleHighlighter::new(&cfg.highlight_class),
            unknown_title: cfg.unknown_title.clone(),
            dataset_route: cfg.dataset_route.clone(),
            highlight_code: cfg.highlight_code,
            cache,
        }
    }

    pub fn references(&self, message: &ChatMessage) -> Vec<LinkedReference> {
        aggregate_with_unknown(message.docs(), &self.unknown_title)
            .into_iter()
            .map(|reference| {
                let href = message
                    .dataset_id
                    .as_deref()
                    .map(|ds| reference.href(&self.dataset_route, ds));
                LinkedReference { reference, href }
            })
            .collect()
    }

    /// Highlighted, converted and sanitized HTML, before code highlighting.
    pub fn sanitized_html(&self, message: &ChatMessage) -> String {
        let text = match message.role {
            Role::Assistant => {
                let titles = message.docs().iter().filter_map(|d| d.title.as_deref());
                self.titles.highlight(&message.content, titles)
            }
            Role::User => message.content.clone(),
        };
        sanitize_html(&markdown_to_html(&text))
    }

    /// Render one message.  Never fails: if the highlighter cannot be loaded
    /// the code blocks stay plain.
    pub async fn render(&self, message: &ChatMessage) -> RenderedMessage {
        let mut html = self.sanitized_html(message);

        if self.highlight_code && contains_code_block(&html) {
            if let Ok(highlighter) = self.cache.ensure().await {
                html = highlighter.apply_to(&html);
            }
        }

        let references = self.references(message);
        debug!(
            id = message.id.as_deref().unwrap_or("-"),
            html_len = html.len(),
            references = references.len(),
            "rendered message"
        );

        RenderedMessage {
            message_id: message.id.clone(),
            role: message.role,
            status: message.status,
            html,
            references,
            regenerate_key: message.regenerate_key().map(str::to_string),
        }
    }

    /// Render under a token from `board`, publishing the result only if no
    /// newer render of `key` was started meanwhile.  Returns whether the result
    /// was applied.
    pub async fn render_tracked(&self, board: &RenderBoard, key: &str, message: &ChatMessage) -> bool {
        let token = board.begin(key);
        let rendered = self.render(message).await;
        board.commit(&token, rendered)
    }
}

/// Identifies one render of one message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderToken {
    key: String,
    seq: u64,
}

impl RenderToken {
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Default)]
struct Slot {
    latest: u64,
    applied: Option<RenderedMessage>,
}

/// Latest applied render of every message, keyed by message.
#[derive(Default)]
pub struct RenderBoard {
    slots: Mutex<HashMap<String, Slot>>,
}

impl RenderBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a render of `key`; every earlier token for `key` becomes stale.
    pub fn begin(&self, key: &str) -> RenderToken {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.entry(key.to_string()).or_default();
        slot.latest += 1;
        RenderToken { key: key.to_string(), seq: slot.latest }
    }

    pub fn is_current(&self, token: &RenderToken) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(&token.key).is_some_and(|s| s.latest == token.seq)
    }

    /// Store `output` if `token` is still the newest for its message.
    pub fn commit(&self, token: &RenderToken, output: RenderedMessage) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get_mut(&token.key) {
            Some(slot) if slot.latest == token.seq => {
                slot.applied = Some(output);
                true
            }
            _ => {
                debug!(key = %token.key, seq = token.seq, "discarding superseded render");
                false
            }
        }
    }

    pub fn current(&self, key: &str) -> Option<RenderedMessage> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(key).and_then(|s| s.applied.clone())
    }

    /// Drop everything held for `key`, e.g. when the message is deleted.
    pub fn forget(&self, key: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Highlighter, HighlighterSource};
    use crate::error::HighlightError;
    use crate::message::RetrievedDocument;
    use async_trait::async_trait;

    struct Unavailable;

    #[async_trait]
    impl HighlighterSource for Unavailable {
        async fn acquire(&self) -> Result<Highlighter, HighlightError> {
            Err(HighlightError::Syntaxes("/missing".into(), "not found".into()))
        }
    }

    fn renderer_without_highlighter() -> Renderer {
        Renderer::with_cache(&RenderConfig::default(), Arc::new(HighlightCache::new(Unavailable)))
    }

    #[tokio::test]
    async fn highlights_cited_titles_end_to_end() {
        let msg = ChatMessage::assistant("See Report A and Report A again")
            .with_docs(vec![RetrievedDocument::titled("Report A")]);
        let out = renderer_without_highlighter().render(&msg).await;
        let span = "<span class=\"reference-highlight\"><strong>Report A</strong></span>";
        assert_eq!(out.html.matches(span).count(), 2);
        assert_eq!(out.html, format!("<p>See {span} and {span} again</p>\n"));
    }

    #[tokio::test]
    async fn script_in_reply_is_removed() {
        let msg = ChatMessage::assistant("Hi <script>alert(1)</script> there");
        let out = renderer_without_highlighter().render(&msg).await;
        assert!(!out.html.contains("<script"));
        assert!(!out.html.contains("alert(1)"));
    }

    #[tokio::test]
    async fn user_messages_are_not_highlighted() {
        let msg = ChatMessage::user("About Report A?")
            .with_docs(vec![RetrievedDocument::titled("Report A")]);
        let out = renderer_without_highlighter().render(&msg).await;
        assert_eq!(out.html, "<p>About Report A?</p>\n");
    }

    #[tokio::test]
    async fn unavailable_highlighter_leaves_code_plain() {
        let msg = ChatMessage::assistant("```rust\nlet x = 1 < 2;\n```");
        let out = renderer_without_highlighter().render(&msg).await;
        assert_eq!(
            out.html,
            "<pre><code class=\"language-rust\">let x = 1 &lt; 2;\n</code></pre>\n"
        );
    }

    #[tokio::test]
    async fn references_are_linked_to_the_dataset() {
        let msg = ChatMessage::assistant("text")
            .with_dataset("ds-1")
            .with_docs(vec![
                RetrievedDocument::titled("X"),
                RetrievedDocument::titled("X"),
                RetrievedDocument::untitled(),
            ]);
        let out = renderer_without_highlighter().render(&msg).await;
        let titles: Vec<(&str, usize)> = out
            .references
            .iter()
            .map(|r| (r.reference.title.as_str(), r.reference.count))
            .collect();
        assert_eq!(titles, vec![("X", 2), ("Unknown", 1)]);
        assert_eq!(out.references[0].href.as_deref(), Some("/datasets/ds-1?search=X"));
    }

    #[tokio::test]
    async fn references_have_no_link_without_dataset() {
        let msg = ChatMessage::assistant("t").with_docs(vec![RetrievedDocument::titled("X")]);
        let out = renderer_without_highlighter().render(&msg).await;
        assert_eq!(out.references[0].href, None);
    }

    #[tokio::test]
    async fn regenerate_key_is_carried_through() {
        let mut msg = ChatMessage::assistant_pending("m-9");
        msg.append_delta("partial").unwrap();
        let out = renderer_without_highlighter().render(&msg).await;
        assert_eq!(out.regenerate_key.as_deref(), Some("m-9"));
        assert_eq!(out.status, MessageStatus::Streaming);
    }

    #[test]
    fn stale_render_is_discarded() {
        let board = RenderBoard::new();
        let first = board.begin("m");
        let second = board.begin("m");
        assert!(!board.is_current(&first));
        assert!(board.is_current(&second));

        let rendered = |html: &str| RenderedMessage {
            message_id: Some("m".into()),
            role: Role::Assistant,
            status: MessageStatus::Complete,
            html: html.into(),
            references: Vec::new(),
            regenerate_key: None,
        };

        assert!(board.commit(&second, rendered("<p>new</p>")));
        assert!(!board.commit(&first, rendered("<p>old</p>")));
        assert_eq!(board.current("m").unwrap().html, "<p>new</p>");
    }

    #[test]
    fn tokens_are_per_message() {
        let board = RenderBoard::new();
        let a = board.begin("a");
        let _b = board.begin("b");
        assert!(board.is_current(&a));
        board.forget("a");
        assert!(!board.is_current(&a));
        assert!(board.current("a").is_none());
    }

    #[tokio::test]
    async fn render_tracked_applies_latest() {
        let board = RenderBoard::new();
        let renderer = renderer_without_highlighter();
        let mut msg = ChatMessage::assistant_pending("m-1");
        msg.append_delta("one").unwrap();
        assert!(renderer.render_tracked(&board, "m-1", &msg).await);
        msg.append_delta(" two").unwrap();
        assert!(renderer.render_tracked(&board, "m-1", &msg).await);
        assert_eq!(board.current("m-1").unwrap().html, "<p>one two</p>\n");
    }
}
