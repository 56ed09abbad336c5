//! Telegram webhook handler

use std::sync::{Arc, PoisonError};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use super::ApiState;
use crate::channels::telegram::{Update, update_to_incoming};

/// Header Telegram uses to echo the webhook secret
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Telegram webhook response
#[derive(Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
}

/// Handle an incoming Telegram update
///
/// Returns 200 as soon as the message is queued; handling happens on the
/// sender's lane. Telegram requires fast webhook responses to avoid retries.
async fn handle_update(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> (StatusCode, Json<WebhookResponse>) {
    if let Some(expected) = state.webhook_secret.as_deref() {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());

        if provided != Some(expected) {
            tracing::warn!("Telegram webhook secret mismatch");
            return (StatusCode::FORBIDDEN, Json(WebhookResponse { ok: false }));
        }
    }

    tracing::debug!(update_id = update.update_id, "received Telegram update");

    {
        let mut dedup = state
            .dedup
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if dedup.is_duplicate(update.update_id) {
            tracing::debug!(update_id = update.update_id, "duplicate Telegram update, skipping");
            return (StatusCode::OK, Json(WebhookResponse { ok: true }));
        }
    }

    let Some(msg) = update_to_incoming(&update) else {
        return (StatusCode::OK, Json(WebhookResponse { ok: true }));
    };

    if state.messages.send(msg).await.is_err() {
        tracing::error!(update_id = update.update_id, "dispatcher unavailable");
        // Let Telegram's redelivery through
        state
            .dedup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .forget(update.update_id);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(WebhookResponse { ok: false }),
        );
    }

    (StatusCode::OK, Json(WebhookResponse { ok: true }))
}

/// Build the webhook router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/telegram/webhook", post(handle_update))
        .with_state(state)
}
