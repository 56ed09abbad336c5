//! Messaging channel adapters
//!
//! A channel delivers inbound text and carries text and audio replies back.

pub mod telegram;

use async_trait::async_trait;

pub use telegram::{TelegramChannel, UpdateDedup};

use crate::Result;
use crate::voice::OutputArtifact;

/// An incoming text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Message identifier (platform-specific)
    pub id: String,

    /// Chat the message arrived in
    pub chat_id: String,

    /// Sender identifier; sessions are keyed by this
    pub sender_id: String,

    /// Sender display name
    pub sender_name: String,

    /// Message text
    pub text: String,
}

/// Reply keyboard attached to an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKeyboard {
    /// Rows of button labels
    Buttons(Vec<Vec<String>>),
    /// Hide any keyboard previously shown
    Remove,
}

/// A text message to send to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Chat identifier
    pub chat_id: String,

    /// Plain text content
    pub content: String,

    /// Optional reply-to message ID
    pub reply_to: Option<String>,

    /// Optional reply keyboard change
    pub keyboard: Option<ReplyKeyboard>,
}

impl OutgoingMessage {
    /// Create a simple `text` message
    #[must_use]
    pub fn text(chat_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            content: content.into(),
            reply_to: None,
            keyboard: None,
        }
    }

    /// Create a `reply` message
    #[must_use]
    pub fn reply(
        chat_id: impl Into<String>,
        content: impl Into<String>,
        reply_to: impl Into<String>,
    ) -> Self {
        Self {
            reply_to: Some(reply_to.into()),
            ..Self::text(chat_id, content)
        }
    }

    /// Attach a keyboard change
    #[must_use]
    pub fn with_keyboard(mut self, keyboard: ReplyKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// An audio reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioReply {
    /// Chat identifier
    pub chat_id: String,

    /// Message the audio answers
    pub reply_to: Option<String>,

    /// Encoded audio
    pub artifact: OutputArtifact,
}

/// Trait for messaging channel adapters
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &'static str;

    /// Send a text message
    async fn send(&self, message: OutgoingMessage) -> Result<()>;

    /// Send an audio file
    async fn send_audio(&self, audio: AudioReply) -> Result<()>;

    /// Show that an audio reply is being prepared
    ///
    /// Default implementation is a no-op for channels without chat actions
    async fn send_upload_audio(&self, _chat_id: &str) -> Result<()> {
        Ok(())
    }
}
