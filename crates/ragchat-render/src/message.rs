// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Chat message model as delivered by the conversation view.

use serde::{Deserialize, Serialize};

use crate::error::MessageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle of a message.
///
/// `Complete` is terminal: content and status are frozen once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Pending,
    Streaming,
    Complete,
    Error,
}

impl MessageStatus {
    fn can_advance_to(self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        matches!(
            (self, next),
            (Pending, Streaming | Complete | Error)
                | (Streaming, Streaming | Complete | Error)
                | (Error, Pending)
        )
    }
}

/// A source chunk returned by similarity search.
///
/// Only `title` is read by the renderer; everything else the backend sends
/// is kept verbatim in `metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    #[serde(default, alias = "item_title")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RetrievedDocument {
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), metadata: Default::default() }
    }

    pub fn untitled() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default, alias = "retrieved_docs")]
    pub docs: Option<Vec<RetrievedDocument>>,
    #[serde(default)]
    pub dataset_id: Option<String>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::User,
            content: text.into(),
            status: MessageStatus::Complete,
            docs: None,
            dataset_id: None,
        }
    }

    /// An assistant reply that has not produced any text yet.
    pub fn assistant_pending(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            role: Role::Assistant,
            content: String::new(),
            status: MessageStatus::Pending,
            docs: None,
            dataset_id: None,
        }
    }

    /// A finished assistant reply.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::Assistant,
            content: text.into(),
            status: MessageStatus::Complete,
            docs: None,
            dataset_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_docs(mut self, docs: Vec<RetrievedDocument>) -> Self {
        self.docs = Some(docs);
        self
    }

    pub fn with_dataset(mut self, dataset_id: impl Into<String>) -> Self {
        self.dataset_id = Some(dataset_id.into());
        self
    }

    pub fn is_complete(&self) -> bool {
        self.status == MessageStatus::Complete
    }

    /// Retrieved documents, empty when the backend sent none.
    pub fn docs(&self) -> &[RetrievedDocument] {
        self.docs.as_deref().unwrap_or(&[])
    }

    /// Append a streamed chunk of text.  Moves a pending message to
    /// `Streaming`.
    pub fn append_delta(&mut self, delta: &str) -> Result<(), MessageError> {
        if self.is_complete() {
            return Err(MessageError::Finalized);
        }
        if self.status == MessageStatus::Pending {
            self.status = MessageStatus::Streaming;
        }
        self.content.push_str(delta);
        Ok(())
    }

    pub fn advance(&mut self, next: MessageStatus) -> Result<(), MessageError> {
        if self.is_complete() {
            return Err(MessageError::Finalized);
        }
        if !self.status.can_advance_to(next) {
            return Err(MessageError::InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }

    /// Key the regenerate action is bound to.  Only assistant messages with
    /// an id can be regenerated.
    pub fn regenerate_key(&self) -> Option<&str> {
        match self.role {
            Role::Assistant => self.id.as_deref(),
            Role::User => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_backend_payload() {
        let json = r#"{
            "id": "m-1",
            "role": "assistant",
            "content": "hello",
            "status": "streaming",
            "retrieved_docs": [
                {"item_title": "Report A", "score": 0.82, "chunk": "..."},
                {"title": null}
            ],
            "dataset_id": "ds-7"
        }"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.status, MessageStatus::Streaming);
        assert_eq!(msg.docs().len(), 2);
        assert_eq!(msg.docs()[0].title.as_deref(), Some("Report A"));
        assert_eq!(msg.docs()[0].metadata["score"], serde_json::json!(0.82));
        assert!(msg.docs()[1].title.is_none());
        assert_eq!(msg.dataset_id.as_deref(), Some("ds-7"));
    }

    #[test]
    fn missing_optional_fields_default() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role":"user"}"#).unwrap();
        assert_eq!(msg.content, "");
        assert_eq!(msg.status, MessageStatus::Pending);
        assert!(msg.docs().is_empty());
    }

    #[test]
    fn streaming_deltas_accumulate() {
        let mut msg = ChatMessage::assistant_pending("m-1");
        msg.append_delta("Hel").unwrap();
        assert_eq!(msg.status, MessageStatus::Streaming);
        msg.append_delta("lo").unwrap();
        assert_eq!(msg.content, "Hello");
        msg.advance(MessageStatus::Complete).unwrap();
        assert!(msg.is_complete());
    }

    #[test]
    fn complete_message_is_frozen() {
        let mut msg = ChatMessage::assistant("done");
        assert_eq!(msg.append_delta("more"), Err(MessageError::Finalized));
        assert_eq!(msg.advance(MessageStatus::Error), Err(MessageError::Finalized));
        assert_eq!(msg.content, "done");
    }

    #[test]
    fn error_can_retry_but_not_skip_back_to_streaming() {
        let mut msg = ChatMessage::assistant_pending("m-2");
        msg.advance(MessageStatus::Error).unwrap();
        assert!(matches!(
            msg.advance(MessageStatus::Streaming),
            Err(MessageError::InvalidTransition { .. })
        ));
        msg.advance(MessageStatus::Pending).unwrap();
        assert_eq!(msg.status, MessageStatus::Pending);
    }

    #[test]
    fn regenerate_key_only_for_identified_assistant_messages() {
        assert_eq!(ChatMessage::assistant_pending("m-3").regenerate_key(), Some("m-3"));
        assert_eq!(ChatMessage::assistant("x").regenerate_key(), None);
        assert_eq!(ChatMessage::user("q").with_id("u-1").regenerate_key(), None);
    }
}
