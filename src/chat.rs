use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// A message the bot posts into a room or sends privately to one user.
/// Rendering is data-only here; the chat platform integration that turns
/// this into wire calls lives outside the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub room_id: String,
    pub alias: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub color: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub collapsed: bool,
    pub actions: Vec<ActionButton>,
}

/// A button whose URL carries the callback event and its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionButton {
    pub text: String,
    pub url: String,
}

impl ChatMessage {
    pub fn new(room_id: impl Into<String>, alias: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            alias: alias.into(),
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Block-structured description of an interactive form. Produced by the
/// modal adapter's pure render functions; how the platform draws it is
/// not this crate's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalView {
    pub id: String,
    /// Ties interactions and the final submit back to one open session
    pub session_id: String,
    pub title: String,
    pub submit_label: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    Section {
        text: String,
    },
    Divider,
    Input {
        block_id: String,
        label: String,
        initial_value: Option<String>,
        multiline: bool,
    },
    Select {
        block_id: String,
        placeholder: String,
        options: Vec<SelectOption>,
        selected: Option<String>,
    },
    MultiSelect {
        block_id: String,
        placeholder: String,
        options: Vec<SelectOption>,
        selected: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("chat delivery failed: {reason}")]
    Delivery { reason: String },
}

/// Boundary to the chat platform. The engine only ever emits messages
/// through this trait, which keeps it testable and transport-agnostic.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a message visible to the whole room
    async fn post(&self, message: ChatMessage) -> Result<(), NotifyError>;

    /// Send a private notice to one user
    async fn notify(&self, user_id: &str, message: ChatMessage) -> Result<(), NotifyError>;

    /// Open an interactive form for one user
    async fn open_modal(&self, user_id: &str, view: ModalView) -> Result<(), NotifyError>;
}

/// Notifier that writes messages to the log. Used when no chat platform
/// integration is wired in, and handy during local development.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn post(&self, message: ChatMessage) -> Result<(), NotifyError> {
        info!(
            room_id = %message.room_id,
            attachments = message.attachments.len(),
            text = %message.text,
            "Posting room message"
        );
        Ok(())
    }

    async fn notify(&self, user_id: &str, message: ChatMessage) -> Result<(), NotifyError> {
        info!(
            user_id = %user_id,
            room_id = %message.room_id,
            text = %message.text,
            "Sending private notice"
        );
        Ok(())
    }

    async fn open_modal(&self, user_id: &str, view: ModalView) -> Result<(), NotifyError> {
        info!(
            user_id = %user_id,
            view_id = %view.id,
            session_id = %view.session_id,
            blocks = view.blocks.len(),
            "Opening modal view"
        );
        Ok(())
    }
}

/// Records every delivery for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    deliveries: std::sync::Mutex<Vec<Delivery>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Posted(ChatMessage),
    Notified { user_id: String, message: ChatMessage },
    ModalOpened { user_id: String, view: ModalView },
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn posted(&self) -> Vec<ChatMessage> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Posted(m) => Some(m),
                Delivery::Notified { .. } => None,
                Delivery::ModalOpened { .. } => None,
            })
            .collect()
    }

    pub fn notices_for(&self, user: &str) -> Vec<ChatMessage> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Notified { user_id, message } if user_id == user => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn opened_modals(&self) -> Vec<ModalView> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::ModalOpened { view, .. } => Some(view),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post(&self, message: ChatMessage) -> Result<(), NotifyError> {
        self.deliveries
            .lock()
            .unwrap()
            .push(Delivery::Posted(message));
        Ok(())
    }

    async fn notify(&self, user_id: &str, message: ChatMessage) -> Result<(), NotifyError> {
        self.deliveries.lock().unwrap().push(Delivery::Notified {
            user_id: user_id.to_string(),
            message,
        });
        Ok(())
    }

    async fn open_modal(&self, user_id: &str, view: ModalView) -> Result<(), NotifyError> {
        self.deliveries.lock().unwrap().push(Delivery::ModalOpened {
            user_id: user_id.to_string(),
            view,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_splits_posts_from_notices() {
        let notifier = RecordingNotifier::new();

        tokio_test::block_on(async {
            notifier
                .post(ChatMessage::new("r1", "Houston Control", "room message"))
                .await
                .unwrap();
            notifier
                .notify("u1", ChatMessage::new("r1", "Houston Control", "private"))
                .await
                .unwrap();
        });

        assert_eq!(notifier.posted().len(), 1);
        assert_eq!(notifier.notices_for("u1").len(), 1);
        assert!(notifier.notices_for("someone-else").is_empty());
    }

    #[test]
    fn message_builder_accumulates_attachments() {
        let message = ChatMessage::new("r1", "Houston Control", "hello")
            .with_attachment(Attachment {
                color: Some("#fe117a".to_string()),
                ..Attachment::default()
            })
            .with_attachment(Attachment::default());

        assert_eq!(message.attachments.len(), 2);
        assert_eq!(message.attachments[0].color.as_deref(), Some("#fe117a"));
    }
}
