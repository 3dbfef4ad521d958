// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Syntax highlighting of code blocks in sanitized HTML.
//!
//! Loading syntect's syntax and theme sets is expensive, so it happens lazily,
//! the first time a rendered message actually contains a code block, and at
//! most once per [`HighlightCache`].  Concurrent callers share the in-flight
//! load.  A failed load is logged and leaves the cache empty; callers fall
//! back to unhighlighted code and a later render may try again.
//!
//! Highlighting always runs on HTML that has already been sanitized.  Only the
//! text of `<pre><code class="language-…">` blocks is rewritten; the spans it
//! inserts carry nothing but `hl-` prefixed classes.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use ragchat_config::RenderConfig;
use regex::{Captures, Regex};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet, SyntaxSetBuilder};
use syntect::util::LinesWithEndings;
use tracing::{debug, info, warn};

use crate::error::HighlightError;

/// Prefix of every class emitted by the highlighter and its stylesheet.
pub const CLASS_PREFIX: &str = "hl-";

const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: CLASS_PREFIX };

fn code_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<pre><code class="language-([^"\s]+)">(.*?)</code></pre>"#)
            .expect("static code block pattern")
    })
}

/// True when `html` holds at least one fenced code block with a language tag.
pub fn contains_code_block(html: &str) -> bool {
    code_block_re().is_match(html)
}

/// Reverse the text escaping applied by the HTML serializer.
fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(i) = rest.find('&') {
        out.push_str(&rest[..i]);
        rest = &rest[i..];
        let entities = [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&#39;", '\''),
            ("&nbsp;", '\u{a0}'),
        ];
        match entities.iter().find(|(e, _)| rest.starts_with(e)) {
            Some((e, c)) => {
                out.push(*c);
                rest = &rest[e.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Loaded syntax definitions plus the theme used for the stylesheet.
pub struct Highlighter {
    syntaxes: SyntaxSet,
    theme: Theme,
    theme_name: String,
}

impl std::fmt::Debug for Highlighter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Highlighter")
            .field("syntaxes", &self.syntaxes.syntaxes().len())
            .field("theme", &self.theme_name)
            .finish()
    }
}

impl Highlighter {
    pub fn new(syntaxes: SyntaxSet, theme: Theme, theme_name: impl Into<String>) -> Self {
        Self { syntaxes, theme, theme_name: theme_name.into() }
    }

    pub fn theme_name(&self) -> &str {
        &self.theme_name
    }

    /// Resolve a fence language tag such as `rust`, `py` or `c++`.
    /// Plain text is treated as unknown.
    pub fn find_syntax(&self, lang: &str) -> Option<&SyntaxReference> {
        let lang = lang.to_lowercase();
        let token = match lang.as_str() {
            "c++" => "cpp",
            "c#" | "csharp" => "cs",
            "shell" | "zsh" | "console" => "sh",
            "yaml" => "yml",
            "markdown" => "md",
            "golang" => "go",
            other => other,
        };
        self.syntaxes
            .find_syntax_by_token(token)
            .filter(|s| s.name != "Plain Text")
    }

    /// Highlight raw source `code` as `lang`, returning class-annotated HTML,
    /// or `None` when the language is unknown.
    pub fn highlight_code(&self, code: &str, lang: &str) -> Option<String> {
        let syntax = self.find_syntax(lang)?;
        let mut gen =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntaxes, CLASS_STYLE);
        for line in LinesWithEndings::from(code) {
            if let Err(e) = gen.parse_html_for_line_which_includes_newline(line) {
                debug!(lang, error = %e, "highlighting aborted");
                return None;
            }
        }
        Some(gen.finalize())
    }

    /// Highlight every code block in a sanitized HTML fragment.  Blocks in an
    /// unknown language are left as they are.
    pub fn apply_to(&self, html: &str) -> String {
        code_block_re()
            .replace_all(html, |caps: &Captures<'_>| {
                let lang = &caps[1];
                let code = unescape_text(&caps[2]);
                match self.highlight_code(&code, lang) {
                    Some(body) => format!(
                        "<pre class=\"{CLASS_PREFIX}code\"><code class=\"language-{lang}\">{body}</code></pre>"
                    ),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// CSS for the loaded theme, matching the classes [`Self::apply_to`] emits.
    pub fn stylesheet(&self) -> Result<String, HighlightError> {
        css_for_theme_with_class_style(&self.theme, CLASS_STYLE)
            .map_err(|e| HighlightError::Stylesheet(e.to_string()))
    }
}

/// Somewhere a [`Highlighter`] can be acquired from.
#[async_trait]
pub trait HighlighterSource: Send + Sync {
    async fn acquire(&self) -> Result<Highlighter, HighlightError>;
}

/// Loads syntect assets: the bundled sets by default, or definitions from
/// configured paths.
#[derive(Debug, Clone)]
pub struct SyntectSource {
    pub theme: String,
    pub syntax_dir: Option<PathBuf>,
    pub theme_file: Option<PathBuf>,
}

impl Default for SyntectSource {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

impl SyntectSource {
    pub fn from_config(cfg: &RenderConfig) -> Self {
        Self {
            theme: cfg.theme.clone(),
            syntax_dir: cfg.syntax_dir.clone(),
            theme_file: cfg.theme_file.clone(),
        }
    }

    /// Blocking load; [`HighlighterSource::acquire`] runs this on a
    /// blocking worker.
    pub fn load(&self) -> Result<Highlighter, HighlightError> {
        let syntaxes = match &self.syntax_dir {
            Some(dir) => {
                let mut builder = SyntaxSetBuilder::new();
                builder.add_plain_text_syntax();
                builder
                    .add_from_folder(dir, true)
                    .map_err(|e| HighlightError::Syntaxes(dir.display().to_string(), e.to_string()))?;
                builder.build()
            }
            None => SyntaxSet::load_defaults_newlines(),
        };

        let (theme, name) = match &self.theme_file {
            Some(path) => {
                let theme = ThemeSet::get_theme(path).map_err(|e| {
                    HighlightError::ThemeFile(path.display().to_string(), e.to_string())
                })?;
                (theme, path.display().to_string())
            }
            None => {
                let mut set = ThemeSet::load_defaults();
                let theme = set
                    .themes
                    .remove(&self.theme)
                    .ok_or_else(|| HighlightError::UnknownTheme(self.theme.clone()))?;
                (theme, self.theme.clone())
            }
        };

        Ok(Highlighter::new(syntaxes, theme, name))
    }
}

#[async_trait]
impl HighlighterSource for SyntectSource {
    async fn acquire(&self) -> Result<Highlighter, HighlightError> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.load())
            .await
            .map_err(|e| HighlightError::Task(e.to_string()))?
    }
}

type Attempt = Shared<BoxFuture<'static, Result<Arc<Highlighter>, HighlightError>>>;

/// Single-flight, memoized holder of a [`Highlighter`].
///
/// Callers that arrive while an acquisition is running await that same
/// attempt and all see its outcome, success or failure.  Only a success is
/// kept; the next call after a failed attempt starts a fresh one.
pub struct HighlightCache {
    source: Arc<dyn HighlighterSource>,
    loaded: OnceLock<Arc<Highlighter>>,
    in_flight: Mutex<Option<Attempt>>,
}

impl HighlightCache {
    pub fn new(source: impl HighlighterSource + 'static) -> Self {
        Self { source: Arc::new(source), loaded: OnceLock::new(), in_flight: Mutex::new(None) }
    }

    /// Process-wide cache.  Uses the bundled syntect assets unless
    /// [`Self::install_global`] ran first.
    pub fn global() -> Arc<HighlightCache> {
        global_slot()
            .get_or_init(|| Arc::new(HighlightCache::new(SyntectSource::default())))
            .clone()
    }

    /// Set the source of the process-wide cache.  Returns false when the
    /// global cache already exists.
    pub fn install_global(source: impl HighlighterSource + 'static) -> bool {
        global_slot().set(Arc::new(HighlightCache::new(source))).is_ok()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Return the highlighter, acquiring it on first use.  Every caller after
    /// a successful acquisition gets the same instance.
    pub async fn ensure(&self) -> Result<Arc<Highlighter>, HighlightError> {
        if let Some(h) = self.loaded.get() {
            return Ok(h.clone());
        }
        let attempt = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(h) = self.loaded.get() {
                return Ok(h.clone());
            }
            match slot.as_ref() {
                Some(running) => running.clone(),
                None => {
                    let source = self.source.clone();
                    let attempt = async move { source.acquire().await.map(Arc::new) }
                        .boxed()
                        .shared();
                    *slot = Some(attempt.clone());
                    attempt
                }
            }
        };

        // Keep a success before releasing the slot, so no caller can start a
        // second acquisition in between.
        let result = attempt.clone().await.map(|h| {
            self.loaded
                .get_or_init(|| {
                    info!(theme = h.theme_name(), "syntax highlighter loaded");
                    h
                })
                .clone()
        });
        {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().is_some_and(|running| running.ptr_eq(&attempt)) {
                *slot = None;
            }
        }
        if let Err(e) = &result {
            warn!(error = %e, "syntax highlighter unavailable; code stays unhighlighted");
        }
        result
    }
}

fn global_slot() -> &'static OnceLock<Arc<HighlightCache>> {
    static GLOBAL: OnceLock<Arc<HighlightCache>> = OnceLock::new();
    &GLOBAL
}
