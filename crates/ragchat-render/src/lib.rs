// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Rendering of retrieval-augmented chat replies.
//!
//! A reply and the documents retrieved for it go through:
//!
//! 1. [`titles`]: cited document titles are wrapped in a highlight span,
//! 2. [`markdown`]: the text is converted to HTML,
//! 3. [`sanitize`]: the HTML is cut down to a fixed allow-list,
//! 4. [`code`]: code blocks are syntax-highlighted, loading the highlighter
//!    on first use,
//!
//! while [`references`] folds the documents into a ranked reference list.
//! [`Renderer`] runs the whole pipeline for one [`ChatMessage`].

pub mod code;
pub mod error;
pub mod markdown;
pub mod message;
pub mod pipeline;
pub mod references;
pub mod sanitize;
pub mod titles;

pub use code::{contains_code_block, HighlightCache, Highlighter, HighlighterSource, SyntectSource};
pub use error::{HighlightError, MessageError};
pub use markdown::markdown_to_html;
pub use message::{ChatMessage, MessageStatus, RetrievedDocument, Role};
pub use pipeline::{LinkedReference, RenderBoard, RenderToken, RenderedMessage, Renderer};
pub use references::{aggregate, aggregate_with_unknown, Reference, UNKNOWN_TITLE};
pub use sanitize::{sanitize_html, AllowList, ALLOW_LIST, ALLOW_LIST_VERSION};
pub use titles::{highlight_titles, TitleHighlighter, DEFAULT_HIGHLIGHT_CLASS};
