//! Error types for Mirror bot

use thiserror::Error;

/// Result type alias for Mirror operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Mirror bot
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Language tag outside the supported set
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Speech synthesis backend failed (network, auth, quota)
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// Backend returned bytes that are not valid audio for the codec
    #[error("decode failed: {0}")]
    Decode(String),

    /// Output artifact encoding failed
    #[error("encode failed: {0}")]
    Encode(String),

    /// Audio processing error (resampling, worker failure)
    #[error("audio error: {0}")]
    Audio(String),

    /// Channel error
    #[error("channel error: {0}")]
    Channel(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Name of the stage that produced this error, for log context
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::Toml(_) => "config",
            Self::UnsupportedLanguage(_) => "voice_selection",
            Self::Synthesis(_) | Self::Http(_) => "synthesis",
            Self::Decode(_) => "decode",
            Self::Encode(_) => "encode",
            Self::Audio(_) => "assembly",
            Self::Channel(_) => "delivery",
            Self::Io(_) | Self::Serialization(_) => "io",
        }
    }
}
