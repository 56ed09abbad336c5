//! Telegram channel adapter
//!
//! Receives updates by long polling or webhook and replies through the Bot API

mod api;
pub mod dedup;
pub mod polling;
pub mod types;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use super::{AudioReply, Channel, OutgoingMessage, ReplyKeyboard};
use crate::Result;

pub use dedup::UpdateDedup;
pub use polling::update_to_incoming;
pub use types::Update;

use self::api::parse_id;
use self::types::{API_BASE, KeyboardButton, ReplyKeyboardMarkup, ReplyKeyboardRemove, ReplyMarkup};

/// Telegram channel adapter
#[derive(Clone)]
pub struct TelegramChannel {
    token: SecretString,
    client: Client,
}

impl TelegramChannel {
    /// Create a new Telegram channel adapter
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            client: Client::new(),
        }
    }

    /// Validate the token with `getMe`
    ///
    /// # Errors
    ///
    /// Returns error if the token is rejected
    pub async fn connect(&self) -> Result<()> {
        let username = self.get_me().await?;
        tracing::info!(username = username.as_deref().unwrap_or("?"), "Telegram channel connected");
        Ok(())
    }

    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}{}/{method}", self.token.expose_secret())
    }
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel").finish_non_exhaustive()
    }
}

/// Map a channel-level keyboard to Telegram's `reply_markup`
pub(crate) fn markup_for(keyboard: &ReplyKeyboard) -> ReplyMarkup {
    match keyboard {
        ReplyKeyboard::Buttons(rows) => ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
            keyboard: rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|text| KeyboardButton { text: text.clone() })
                        .collect()
                })
                .collect(),
            resize_keyboard: true,
            one_time_keyboard: true,
        }),
        ReplyKeyboard::Remove => ReplyMarkup::Remove(ReplyKeyboardRemove {
            remove_keyboard: true,
        }),
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        let chat_id = parse_id(&message.chat_id, "chat ID")?;
        let reply_to = message.reply_to.as_deref().and_then(|id| id.parse().ok());

        self.send_message(chat_id, &message.content, reply_to, message.keyboard.as_ref())
            .await
    }

    async fn send_audio(&self, audio: AudioReply) -> Result<()> {
        let chat_id = parse_id(&audio.chat_id, "chat ID")?;
        let reply_to = audio.reply_to.as_deref().and_then(|id| id.parse().ok());
        let artifact = audio.artifact;

        self.send_audio_file(
            chat_id,
            artifact.bytes,
            &artifact.file_name,
            artifact.mime_type,
            reply_to,
        )
        .await
    }

    async fn send_upload_audio(&self, chat_id: &str) -> Result<()> {
        let chat_id = parse_id(chat_id, "chat ID")?;
        self.send_chat_action(chat_id, "upload_voice").await
    }
}
