//! Mirror Bot - a Telegram bot that answers in reverse
//!
//! Every word of an incoming message is reversed. The bot replies with the
//! reversed text and then with a spoken rendering of it, voiced by Amazon
//! Polly in the user's chosen language.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │        Telegram (polling │ webhook)           │
//! └──────────────────────┬────────────────────────┘
//!                        │
//! ┌──────────────────────▼────────────────────────┐
//! │  Dispatcher (one lane per user) → MirrorBot   │
//! │  Sessions  │  Transform  │  AudioPipeline     │
//! └──────────────────────┬────────────────────────┘
//!                        │
//! ┌──────────────────────▼────────────────────────┐
//! │  Polly (per word) → decode → concat → MP3     │
//! └───────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod bot;
pub mod channels;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod session;
pub mod transform;
pub mod voice;

pub use bot::MirrorBot;
pub use config::Config;
pub use daemon::Daemon;
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use session::{InMemorySessionStore, SessionStore};
