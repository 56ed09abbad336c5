//! HTTP server: health probe and Telegram webhook

pub mod health;
pub mod webhook;

use std::future::Future;
use std::sync::{Arc, Mutex};

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::channels::{IncomingMessage, UpdateDedup};

/// Shared state for the webhook handler
pub struct ApiState {
    /// Expected `X-Telegram-Bot-Api-Secret-Token`, if any
    pub webhook_secret: Option<String>,
    /// Recently seen update ids
    pub dedup: Mutex<UpdateDedup>,
    /// Where accepted messages go
    pub messages: mpsc::Sender<IncomingMessage>,
}

impl ApiState {
    /// Create state that forwards webhook messages into `messages`
    #[must_use]
    pub fn new(messages: mpsc::Sender<IncomingMessage>, webhook_secret: Option<String>) -> Self {
        Self {
            webhook_secret,
            dedup: Mutex::new(UpdateDedup::default()),
            messages,
        }
    }
}

/// Build the router
///
/// The webhook route is only mounted when `state` is given.
pub fn router(state: Option<Arc<ApiState>>) -> Router {
    let router = Router::new().merge(health::router());
    let router = match state {
        Some(state) => router.merge(webhook::router(state)),
        None => router,
    };
    router.layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Option<Arc<ApiState>>,
    port: u16,
}

impl ApiServer {
    /// Create a server on `port`
    #[must_use]
    pub const fn new(port: u16, state: Option<Arc<ApiState>>) -> Self {
        Self { state, port }
    }

    /// Run the API server until `shutdown` resolves
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}
