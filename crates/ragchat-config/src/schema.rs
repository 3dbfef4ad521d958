// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Serde default helper: returns `true`.
///
/// `#[serde(default)]` on a `bool` falls back to `false`, so fields that
/// are enabled unless switched off need a named function.
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub render: RenderConfig,
}

/// Settings for the chat-message rendering pipeline.
///
/// ```toml
/// [render]
/// highlight_class = "reference-highlight"
/// unknown_title = "Unknown"
/// dataset_route = "/datasets"
/// theme = "InspiredGitHub"
/// # syntax_dir = "/usr/share/ragchat/syntaxes"
/// # theme_file = "/usr/share/ragchat/themes/custom.tmTheme"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// CSS class placed on the span that wraps a cited document title.
    #[serde(default = "default_highlight_class")]
    pub highlight_class: String,
    /// Title used for retrieved documents that carry no title.
    #[serde(default = "default_unknown_title")]
    pub unknown_title: String,
    /// Path prefix of the dataset detail view that reference links point to.
    #[serde(default = "default_dataset_route")]
    pub dataset_route: String,
    /// Name of the syntect theme used to build the code stylesheet.
    /// Ignored when `theme_file` is set.
    #[serde(default = "default_theme")]
    pub theme: String,
    /// Directory of `.sublime-syntax` definitions to load instead of the
    /// bundled syntaxes.
    #[serde(default)]
    pub syntax_dir: Option<PathBuf>,
    /// `.tmTheme` file to load instead of a bundled theme.
    #[serde(default)]
    pub theme_file: Option<PathBuf>,
    /// Syntax-highlight fenced code blocks.  When false, code renders as
    /// plain sanitized text and the highlighter is never loaded.
    #[serde(default = "default_true")]
    pub highlight_code: bool,
}

fn default_highlight_class() -> String {
    "reference-highlight".into()
}

fn default_unknown_title() -> String {
    "Unknown".into()
}

fn default_dataset_route() -> String {
    "/datasets".into()
}

fn default_theme() -> String {
    "InspiredGitHub".into()
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            highlight_class: default_highlight_class(),
            unknown_title: default_unknown_title(),
            dataset_route: default_dataset_route(),
            theme: default_theme(),
            syntax_dir: None,
            theme_file: None,
            highlight_code: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.render.highlight_class, "reference-highlight");
        assert_eq!(cfg.render.unknown_title, "Unknown");
        assert_eq!(cfg.render.dataset_route, "/datasets");
        assert!(cfg.render.highlight_code);
        assert!(cfg.render.theme_file.is_none());
    }

    #[test]
    fn partial_render_section_keeps_other_defaults() {
        let cfg: Config = toml::from_str(
            r#"[render]
highlight_code = false
theme = "base16-ocean.dark""#,
        )
        .unwrap();
        assert!(!cfg.render.highlight_code);
        assert_eq!(cfg.render.theme, "base16-ocean.dark");
        assert_eq!(cfg.render.unknown_title, "Unknown");
    }
}
