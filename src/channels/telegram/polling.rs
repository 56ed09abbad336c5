//! Telegram polling mode: getUpdates loop and message conversion

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;

use super::dedup::UpdateDedup;
use super::types::Update;
use crate::channels::IncomingMessage;

/// Server-side long-poll timeout in seconds
const LONG_POLL_TIMEOUT_SECS: u64 = 30;

/// Response from Telegram getUpdates API
#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
    description: Option<String>,
}

impl super::TelegramChannel {
    /// Spawn a background task that polls Telegram's getUpdates API
    ///
    /// Forwards received text messages into `tx`. Deletes any existing
    /// webhook before starting to avoid conflicts. The task ends when the
    /// receiving side of `tx` is dropped.
    #[must_use]
    pub fn start_polling(
        &self,
        interval: Duration,
        tx: mpsc::Sender<IncomingMessage>,
    ) -> tokio::task::JoinHandle<()> {
        let channel = self.clone();
        tokio::spawn(async move {
            polling_loop(channel, tx, interval).await;
        })
    }
}

/// Run the polling loop (background task)
async fn polling_loop(
    channel: super::TelegramChannel,
    tx: mpsc::Sender<IncomingMessage>,
    interval: Duration,
) {
    if let Err(e) = channel.delete_webhook().await {
        tracing::warn!(error = %e, "failed to delete Telegram webhook before polling");
    }

    let mut offset: Option<i64> = None;
    let mut dedup = UpdateDedup::default();

    tracing::info!("Telegram polling started");

    loop {
        let mut params = serde_json::json!({
            "timeout": LONG_POLL_TIMEOUT_SECS,
            "allowed_updates": ["message"],
        });
        if let Some(off) = offset {
            params["offset"] = serde_json::json!(off);
        }

        let result = channel
            .client
            .post(channel.method_url("getUpdates"))
            .timeout(Duration::from_secs(LONG_POLL_TIMEOUT_SECS + 10))
            .json(&params)
            .send()
            .await;

        match result {
            Ok(resp) => match resp.json::<GetUpdatesResponse>().await {
                Ok(updates) if updates.ok => {
                    for update in &updates.result {
                        // Advance offset past this update
                        offset = Some(update.update_id + 1);

                        if dedup.is_duplicate(update.update_id) {
                            continue;
                        }

                        if let Some(msg) = update_to_incoming(update)
                            && tx.send(msg).await.is_err()
                        {
                            tracing::info!("message receiver dropped, stopping Telegram polling");
                            return;
                        }
                    }
                }
                Ok(updates) => {
                    tracing::warn!(
                        description = updates.description.as_deref().unwrap_or_default(),
                        "Telegram getUpdates rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse Telegram getUpdates response");
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Telegram getUpdates error");
            }
        }

        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Convert an update into an `IncomingMessage`
///
/// Returns `None` for updates without a text message and for messages sent
/// by bots.
#[must_use]
pub fn update_to_incoming(update: &Update) -> Option<IncomingMessage> {
    let msg = update.message.as_ref()?;
    let text = msg.text.clone()?;

    if msg.from.as_ref().is_some_and(|u| u.is_bot) {
        return None;
    }

    let sender_id = msg
        .from
        .as_ref()
        .map_or_else(|| msg.chat.id.to_string(), |u| u.id.to_string());

    let sender_name = msg
        .from
        .as_ref()
        .map_or_else(|| "Unknown".to_string(), |u| u.first_name.clone());

    Some(IncomingMessage {
        id: msg.message_id.to_string(),
        chat_id: msg.chat.id.to_string(),
        sender_id,
        sender_name,
        text,
    })
}
