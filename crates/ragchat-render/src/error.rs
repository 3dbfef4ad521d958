// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

use crate::message::MessageStatus;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("message is complete and can no longer change")]
    Finalized,

    #[error("invalid status transition {from:?} -> {to:?}")]
    InvalidTransition { from: MessageStatus, to: MessageStatus },
}

#[derive(Debug, Error, Clone)]
pub enum HighlightError {
    #[error("could not load syntax definitions from '{0}': {1}")]
    Syntaxes(String, String),

    #[error("could not load theme file '{0}': {1}")]
    ThemeFile(String, String),

    #[error("unknown highlight theme '{0}'")]
    UnknownTheme(String),

    #[error("could not build stylesheet: {0}")]
    Stylesheet(String),

    #[error("highlighter loader task failed: {0}")]
    Task(String),
}
