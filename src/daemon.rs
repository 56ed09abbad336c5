//! Daemon - the main bot service
//!
//! Wires Telegram, the session store, the audio pipeline and the HTTP server

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::{ApiServer, ApiState};
use crate::bot::MirrorBot;
use crate::channels::{IncomingMessage, TelegramChannel};
use crate::config::UpdateMode;
use crate::dispatch::Dispatcher;
use crate::session::InMemorySessionStore;
use crate::voice::{AudioPipeline, PollyClient, SpeechSynthesizer};
use crate::{Config, Error, Result};

/// Capacity of the inbound message queue
const INBOUND_QUEUE: usize = 100;

/// The mirror bot daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is incomplete
    pub fn new(config: Config) -> Result<Self> {
        config.validate_for_daemon()?;
        Ok(Self { config })
    }

    /// Run until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if Telegram rejects the token or the webhook, or the
    /// HTTP server fails
    pub async fn run(self) -> Result<()> {
        let token = self
            .config
            .telegram
            .token
            .clone()
            .ok_or_else(|| Error::Config("Telegram bot token required".to_string()))?;

        let telegram = TelegramChannel::new(token);
        telegram.connect().await?;

        let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(PollyClient::new(
            &self.config.polly,
            self.config.audio.output_format,
        )?);
        tracing::info!(
            region = %self.config.polly.region,
            format = self.config.audio.output_format.format_name(),
            "Polly synthesizer initialized"
        );

        let pipeline = AudioPipeline::new(synthesizer, &self.config.audio);
        let sessions = Arc::new(InMemorySessionStore::new());
        let bot = MirrorBot::new(Arc::new(telegram.clone()), sessions, pipeline);
        let dispatcher = Dispatcher::new(bot, self.config.dispatch.lane_idle);

        let (tx, rx) = mpsc::channel::<IncomingMessage>(INBOUND_QUEUE);
        let dispatch_handle = tokio::spawn(dispatcher.run(rx));

        let (api_state, poller) = match self.config.telegram.mode {
            UpdateMode::Polling => {
                let handle = telegram.start_polling(self.config.telegram.poll_interval, tx);
                (None, Some(handle))
            }
            UpdateMode::Webhook => {
                let url = self.config.telegram.webhook_url.as_deref().ok_or_else(|| {
                    Error::Config("webhook mode requires TELEGRAM_WEBHOOK_URL".to_string())
                })?;
                let secret = self.config.telegram.webhook_secret.clone();
                telegram.set_webhook(url, secret.as_deref()).await?;
                (Some(Arc::new(ApiState::new(tx, secret))), None)
            }
        };

        tracing::info!(mode = ?self.config.telegram.mode, "mirror bot ready");

        let server = ApiServer::new(self.config.server.port, api_state);
        server.run(shutdown_signal()).await?;

        tracing::info!("shutting down");
        if let Some(handle) = poller {
            handle.abort();
        }
        dispatch_handle.abort();

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
