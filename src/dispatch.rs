//! Per-user dispatch lanes
//!
//! Each user gets one lane: a bounded queue drained by a single task, so a
//! user's messages are handled strictly in arrival order while different users
//! proceed concurrently. Messages arriving at a full lane are dropped. A lane
//! that stays idle past the configured timeout removes itself and is recreated
//! on the next message.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::bot::MirrorBot;
use crate::channels::{Channel, IncomingMessage};

/// Messages a lane holds before new ones are dropped
pub const LANE_CAPACITY: usize = 32;

type Lanes = Arc<Mutex<HashMap<String, mpsc::Sender<IncomingMessage>>>>;

/// Routes incoming messages to per-user lanes
pub struct Dispatcher<C: Channel + 'static> {
    bot: MirrorBot<C>,
    lanes: Lanes,
    idle_timeout: Duration,
    capacity: usize,
}

impl<C: Channel + 'static> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            bot: self.bot.clone(),
            lanes: Arc::clone(&self.lanes),
            idle_timeout: self.idle_timeout,
            capacity: self.capacity,
        }
    }
}

impl<C: Channel + 'static> Dispatcher<C> {
    /// Create a dispatcher around a bot
    #[must_use]
    pub fn new(bot: MirrorBot<C>, idle_timeout: Duration) -> Self {
        Self::with_capacity(bot, idle_timeout, LANE_CAPACITY)
    }

    /// Create a dispatcher whose lanes hold at most `capacity` messages
    #[must_use]
    pub fn with_capacity(bot: MirrorBot<C>, idle_timeout: Duration, capacity: usize) -> Self {
        Self {
            bot,
            lanes: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout,
            capacity: capacity.max(1),
        }
    }

    /// Queue a message on its sender's lane, starting the lane if needed
    ///
    /// Returns `false` if the lane was full and the message was dropped.
    pub fn dispatch(&self, msg: IncomingMessage) -> bool {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);

        let msg = match lanes.get(&msg.sender_id) {
            Some(tx) => match tx.try_send(msg) {
                Ok(()) => return true,
                Err(TrySendError::Full(msg)) => {
                    tracing::warn!(
                        message_id = %msg.id,
                        user_id = %msg.sender_id,
                        capacity = self.capacity,
                        "lane full, dropping message"
                    );
                    return false;
                }
                // Lane task is gone; start a fresh one
                Err(TrySendError::Closed(msg)) => msg,
            },
            None => msg,
        };

        let user_id = msg.sender_id.clone();
        let (tx, rx) = mpsc::channel(self.capacity);
        if tx.try_send(msg).is_err() {
            return false;
        }
        lanes.insert(user_id.clone(), tx);
        drop(lanes);

        tracing::debug!(user_id = %user_id, "lane started");

        let bot = self.bot.clone();
        let registry = Arc::clone(&self.lanes);
        let idle_timeout = self.idle_timeout;
        tokio::spawn(async move {
            run_lane(bot, user_id, rx, registry, idle_timeout).await;
        });
        true
    }

    /// Dispatch everything received on `rx` until the sender side closes
    pub async fn run(self, mut rx: mpsc::Receiver<IncomingMessage>) {
        while let Some(msg) = rx.recv().await {
            tracing::debug!(
                message_id = %msg.id,
                user_id = %msg.sender_id,
                from = %msg.sender_name,
                "received message"
            );
            self.dispatch(msg);
        }
        tracing::info!("message stream closed, dispatcher stopping");
    }

    /// Number of live lanes
    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

async fn run_lane<C: Channel + 'static>(
    bot: MirrorBot<C>,
    user_id: String,
    mut rx: mpsc::Receiver<IncomingMessage>,
    lanes: Lanes,
    idle_timeout: Duration,
) {
    loop {
        let msg = match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(msg)) => msg,
            Ok(None) => return,
            Err(_) => {
                // Holding the registry lock means no new message can be queued
                // between the emptiness check and removal
                let mut registry = lanes.lock().unwrap_or_else(PoisonError::into_inner);
                if let Ok(msg) = rx.try_recv() {
                    drop(registry);
                    msg
                } else {
                    registry.remove(&user_id);
                    tracing::debug!(user_id = %user_id, "lane idle, closing");
                    return;
                }
            }
        };

        if let Err(e) = bot.handle(&msg).await {
            tracing::error!(
                message_id = %msg.id,
                user_id = %user_id,
                stage = e.stage(),
                error = %e,
                "message handling failed"
            );
        }
    }
}
