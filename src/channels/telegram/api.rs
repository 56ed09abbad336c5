//! Raw Telegram Bot API calls

use reqwest::multipart::{Form, Part};

use super::types::{
    SendChatActionRequest, SendMessageRequest, SetWebhookRequest, TelegramResponse,
};
use super::markup_for;
use crate::channels::ReplyKeyboard;
use crate::{Error, Result};

impl super::TelegramChannel {
    /// Send a plain-text message to a chat
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<()> {
        let request = SendMessageRequest {
            chat_id,
            text: text.to_string(),
            reply_to_message_id: reply_to,
            reply_markup: keyboard.map(markup_for),
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram API error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_lower = body.to_lowercase();

            if body_lower.contains("chat not found")
                || body_lower.contains("bot was blocked by the user")
            {
                return Err(Error::Channel(format!(
                    "Telegram chat {chat_id} not reachable: {body}"
                )));
            }

            return Err(Error::Channel(format!(
                "Telegram API error: {status} - {body}"
            )));
        }

        tracing::debug!(chat_id, "Telegram message sent");
        Ok(())
    }

    /// Upload an audio file
    ///
    /// # Errors
    ///
    /// Returns error if the upload fails
    pub async fn send_audio_file(
        &self,
        chat_id: i64,
        audio: Vec<u8>,
        file_name: &str,
        mime_type: &str,
        reply_to: Option<i64>,
    ) -> Result<()> {
        let size = audio.len();
        let part = Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| Error::Channel(format!("invalid audio MIME type: {e}")))?;

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("audio", part);
        if let Some(id) = reply_to {
            form = form.text("reply_to_message_id", id.to_string());
        }

        let response = self
            .client
            .post(self.method_url("sendAudio"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram sendAudio error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "Telegram sendAudio error: {status} - {body}"
            )));
        }

        tracing::debug!(chat_id, bytes = size, "Telegram audio sent");
        Ok(())
    }

    /// Set webhook URL for receiving updates
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        let request = SetWebhookRequest {
            url: url.to_string(),
            allowed_updates: Some(vec!["message".to_string()]),
            secret_token: secret_token.map(String::from),
        };

        let response = self
            .client
            .post(self.method_url("setWebhook"))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram setWebhook error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "Telegram setWebhook error: {status} - {body}"
            )));
        }

        tracing::info!(url, "Telegram webhook set");
        Ok(())
    }

    /// Delete webhook (switch to polling mode)
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn delete_webhook(&self) -> Result<()> {
        let response = self
            .client
            .post(self.method_url("deleteWebhook"))
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram deleteWebhook error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "Telegram deleteWebhook error: {status} - {body}"
            )));
        }

        tracing::info!("Telegram webhook deleted");
        Ok(())
    }

    /// Send a chat action such as `typing` or `upload_voice`
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<()> {
        let request = SendChatActionRequest {
            chat_id,
            action: action.to_string(),
        };

        let response = self
            .client
            .post(self.method_url("sendChatAction"))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram sendChatAction error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "Telegram sendChatAction error: {status} - {body}"
            )));
        }

        Ok(())
    }

    /// Validate the bot token by calling `getMe`, returning the bot username
    ///
    /// # Errors
    ///
    /// Returns error if the token is invalid
    pub async fn get_me(&self) -> Result<Option<String>> {
        #[derive(serde::Deserialize)]
        struct BotUser {
            username: Option<String>,
        }

        let response = self
            .client
            .get(self.method_url("getMe"))
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram getMe error: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Channel("Invalid Telegram bot token".to_string()));
        }

        let parsed: TelegramResponse<BotUser> = response
            .json()
            .await
            .map_err(|e| Error::Channel(format!("Telegram getMe parse error: {e}")))?;

        Ok(parsed.result.and_then(|u| u.username))
    }
}

/// Parse a platform chat or message id
pub(crate) fn parse_id(value: &str, what: &str) -> Result<i64> {
    value
        .parse()
        .map_err(|_| Error::Channel(format!("Invalid {what}: {value}")))
}
