//! Message handling: language selection, reversed text, spoken reply

use std::sync::Arc;

use crate::channels::{AudioReply, Channel, IncomingMessage, OutgoingMessage, ReplyKeyboard};
use crate::session::SessionStore;
use crate::transform::{reverse_words, split_words};
use crate::voice::{AudioPipeline, Language};
use crate::Result;

/// Russian button label
pub const RU_BUTTON: &str = "🇷🇺 Русский";

/// English button label
pub const EN_BUTTON: &str = "🇬🇧 English";

const LANGUAGE_PROMPT: &str = "Выберите язык / Choose language:";
const NO_LANGUAGE_WARNING: &str = "⚠️ Сначала выберите язык! / Please choose language first!";

/// The language selection keyboard
#[must_use]
pub fn language_keyboard() -> ReplyKeyboard {
    ReplyKeyboard::Buttons(vec![vec![RU_BUTTON.to_string(), EN_BUTTON.to_string()]])
}

/// What an incoming text asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// `/start`
    Start,
    /// A language button was pressed
    ChooseLanguage(Language),
    /// "Сменить язык" / "Change language"
    ChangeLanguage,
    /// Any other bot command
    Ignored,
    /// Text to mirror
    Text(&'a str),
}

impl<'a> Inbound<'a> {
    /// Classify a message text
    #[must_use]
    pub fn parse(text: &'a str) -> Self {
        let trimmed = text.trim();

        if trimmed == RU_BUTTON {
            return Self::ChooseLanguage(Language::Ru);
        }
        if trimmed == EN_BUTTON {
            return Self::ChooseLanguage(Language::En);
        }

        if let Some(command) = trimmed.strip_prefix('/') {
            // "/start@my_bot" in groups
            let name = command
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .split('@')
                .next()
                .unwrap_or_default();
            return if name == "start" {
                Self::Start
            } else {
                Self::Ignored
            };
        }

        let lower = trimmed.to_lowercase();
        if lower == "сменить язык" || lower == "change language" {
            return Self::ChangeLanguage;
        }

        Self::Text(text)
    }
}

/// Confirmation shown after a language is picked
#[must_use]
pub const fn confirmation(language: Language) -> &'static str {
    match language {
        Language::Ru => "✅ Язык установлен: Русский\nНапишите 'Сменить язык' для изменения",
        Language::En => "✅ Language set: English\nWrite 'Change language' to switch",
    }
}

/// Notice sent when the audio reply could not be produced
#[must_use]
pub const fn audio_failure_notice(language: Language) -> &'static str {
    match language {
        Language::Ru => "⚠️ Ошибка генерации аудио",
        Language::En => "⚠️ Audio generation failed",
    }
}

/// Per-message orchestrator
pub struct MirrorBot<C: Channel> {
    channel: Arc<C>,
    sessions: Arc<dyn SessionStore>,
    pipeline: AudioPipeline,
}

impl<C: Channel> Clone for MirrorBot<C> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            sessions: Arc::clone(&self.sessions),
            pipeline: self.pipeline.clone(),
        }
    }
}

impl<C: Channel> MirrorBot<C> {
    /// Create a bot over a channel, a session store and an audio pipeline
    #[must_use]
    pub fn new(channel: Arc<C>, sessions: Arc<dyn SessionStore>, pipeline: AudioPipeline) -> Self {
        Self {
            channel,
            sessions,
            pipeline,
        }
    }

    /// Handle one incoming message
    ///
    /// Audio failures are reported to the user and do not fail the call.
    ///
    /// # Errors
    ///
    /// Returns error if a text reply cannot be delivered
    pub async fn handle(&self, msg: &IncomingMessage) -> Result<()> {
        match Inbound::parse(&msg.text) {
            Inbound::Start | Inbound::ChangeLanguage => self.prompt_language(msg).await,
            Inbound::ChooseLanguage(language) => {
                self.sessions.set(&msg.sender_id, language).await;
                tracing::info!(user_id = %msg.sender_id, %language, "language selected");
                self.channel
                    .send(
                        OutgoingMessage::reply(&msg.chat_id, confirmation(language), &msg.id)
                            .with_keyboard(ReplyKeyboard::Remove),
                    )
                    .await
            }
            Inbound::Ignored => {
                tracing::debug!(message_id = %msg.id, "ignoring unknown command");
                Ok(())
            }
            Inbound::Text(text) => self.mirror(msg, text).await,
        }
    }

    async fn prompt_language(&self, msg: &IncomingMessage) -> Result<()> {
        // Touch the session so first contact is recorded
        let _ = self.sessions.get(&msg.sender_id).await;
        self.channel
            .send(
                OutgoingMessage::reply(&msg.chat_id, LANGUAGE_PROMPT, &msg.id)
                    .with_keyboard(language_keyboard()),
            )
            .await
    }

    async fn mirror(&self, msg: &IncomingMessage, text: &str) -> Result<()> {
        let Some(language) = self.sessions.get(&msg.sender_id).await else {
            tracing::debug!(user_id = %msg.sender_id, "no language selected");
            return self
                .channel
                .send(
                    OutgoingMessage::reply(&msg.chat_id, NO_LANGUAGE_WARNING, &msg.id)
                        .with_keyboard(language_keyboard()),
                )
                .await;
        };

        let words = split_words(text);
        let reversed = reverse_words(text);

        if !reversed.is_empty() {
            self.channel
                .send(OutgoingMessage::reply(&msg.chat_id, reversed, &msg.id))
                .await?;
        }

        if words.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.channel.send_upload_audio(&msg.chat_id).await {
            tracing::debug!(error = %e, "chat action failed");
        }

        match self.pipeline.render(&words, language).await {
            Ok(artifact) => {
                tracing::debug!(
                    message_id = %msg.id,
                    words = words.len(),
                    bytes = artifact.bytes.len(),
                    "audio rendered"
                );
                let reply = AudioReply {
                    chat_id: msg.chat_id.clone(),
                    reply_to: Some(msg.id.clone()),
                    artifact,
                };
                if let Err(e) = self.channel.send_audio(reply).await {
                    self.report_failure(msg, language, &e).await?;
                }
                Ok(())
            }
            Err(e) => self.report_failure(msg, language, &e).await,
        }
    }

    async fn report_failure(
        &self,
        msg: &IncomingMessage,
        language: Language,
        error: &crate::Error,
    ) -> Result<()> {
        tracing::error!(
            message_id = %msg.id,
            %language,
            stage = error.stage(),
            error = %error,
            "audio reply failed"
        );
        self.channel
            .send(OutgoingMessage::reply(
                &msg.chat_id,
                audio_failure_notice(language),
                &msg.id,
            ))
            .await
    }
}
