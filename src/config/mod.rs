//! Configuration management for Mirror bot

pub mod file;

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::voice::{DEFAULT_SILENCE, FragmentCodec};
use crate::{Error, Result};

use self::file::MirrorConfigFile;

/// Default AWS region for Polly
pub const DEFAULT_REGION: &str = "us-west-2";

/// Default sample rate requested for PCM output
pub const DEFAULT_PCM_SAMPLE_RATE: u32 = 16000;

/// Mirror bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram transport configuration
    pub telegram: TelegramConfig,

    /// Amazon Polly configuration
    pub polly: PollyConfig,

    /// Audio pipeline configuration
    pub audio: AudioConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Per-user dispatch configuration
    pub dispatch: DispatchConfig,
}

/// How Telegram updates are received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Long polling via `getUpdates`
    #[default]
    Polling,
    /// Telegram pushes updates to our HTTP endpoint
    Webhook,
}

impl FromStr for UpdateMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polling" | "poll" => Ok(Self::Polling),
            "webhook" => Ok(Self::Webhook),
            other => Err(Error::Config(format!("unknown Telegram mode: {other}"))),
        }
    }
}

/// Telegram configuration
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token
    pub token: Option<SecretString>,

    /// Update delivery mode
    pub mode: UpdateMode,

    /// Delay between `getUpdates` calls
    pub poll_interval: Duration,

    /// Public URL Telegram should push updates to (webhook mode)
    pub webhook_url: Option<String>,

    /// Expected `X-Telegram-Bot-Api-Secret-Token` header
    pub webhook_secret: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            mode: UpdateMode::Polling,
            poll_interval: Duration::from_millis(500),
            webhook_url: None,
            webhook_secret: None,
        }
    }
}

/// Amazon Polly configuration
#[derive(Debug, Clone)]
pub struct PollyConfig {
    /// AWS region
    pub region: String,

    /// AWS access key id
    pub access_key_id: Option<String>,

    /// AWS secret access key
    pub secret_access_key: Option<SecretString>,

    /// Session token for temporary credentials
    pub session_token: Option<SecretString>,

    /// Endpoint override (e.g. a local emulator)
    pub endpoint: Option<String>,
}

impl Default for PollyConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            endpoint: None,
        }
    }
}

/// Audio pipeline configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Silence after each word
    pub silence: Duration,

    /// Concurrent synthesis requests per message
    pub max_concurrency: usize,

    /// Format requested from the synthesis backend
    pub output_format: FragmentCodec,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            silence: DEFAULT_SILENCE,
            max_concurrency: 4,
            output_format: FragmentCodec::Mp3,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Per-user dispatch configuration
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Idle time after which a user's lane shuts down
    pub lane_idle: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            lane_idle: Duration::from_secs(300),
        }
    }
}

impl Config {
    /// Load configuration from the TOML file and environment
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but malformed
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with an environment lookup (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but malformed
    pub fn from_sources<F>(fc: MirrorConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|k| env(k).filter(|v| !v.is_empty()));

        let telegram_defaults = TelegramConfig::default();
        let telegram = TelegramConfig {
            token: first(&["TELEGRAM_BOT_TOKEN", "BOT_TOKEN"])
                .or(fc.telegram.token)
                .map(SecretString::from),
            mode: first(&["TELEGRAM_MODE"])
                .or(fc.telegram.mode)
                .map(|m| m.parse::<UpdateMode>())
                .transpose()?
                .unwrap_or_default(),
            poll_interval: parse_opt::<u64>(first(&["TELEGRAM_POLL_INTERVAL_MS"]), "TELEGRAM_POLL_INTERVAL_MS")?
                .or(fc.telegram.poll_interval_ms)
                .map_or(telegram_defaults.poll_interval, Duration::from_millis),
            webhook_url: first(&["TELEGRAM_WEBHOOK_URL"]).or(fc.telegram.webhook_url),
            webhook_secret: first(&["TELEGRAM_WEBHOOK_SECRET"]).or(fc.telegram.webhook_secret),
        };

        let polly = PollyConfig {
            region: first(&["AWS_REGION", "AWS_DEFAULT_REGION"])
                .or(fc.aws.region)
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            access_key_id: first(&["AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY"])
                .or(fc.aws.access_key_id),
            secret_access_key: first(&["AWS_SECRET_ACCESS_KEY", "AWS_SECRET_KEY"])
                .or(fc.aws.secret_access_key)
                .map(SecretString::from),
            session_token: first(&["AWS_SESSION_TOKEN"])
                .or(fc.aws.session_token)
                .map(SecretString::from),
            endpoint: first(&["POLLY_ENDPOINT"]).or(fc.aws.polly_endpoint),
        };

        let audio_defaults = AudioConfig::default();
        let pcm_sample_rate = parse_opt::<u32>(first(&["MIRROR_PCM_SAMPLE_RATE"]), "MIRROR_PCM_SAMPLE_RATE")?
            .or(fc.audio.pcm_sample_rate)
            .unwrap_or(DEFAULT_PCM_SAMPLE_RATE);
        let output_format = match first(&["MIRROR_OUTPUT_FORMAT"])
            .or(fc.audio.output_format)
            .map(|f| f.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("mp3") => FragmentCodec::Mp3,
            Some("pcm") => FragmentCodec::Pcm {
                sample_rate: pcm_sample_rate,
            },
            Some(other) => {
                return Err(Error::Config(format!("unknown output format: {other}")));
            }
        };
        let max_concurrency = parse_opt::<usize>(first(&["MIRROR_MAX_CONCURRENCY"]), "MIRROR_MAX_CONCURRENCY")?
            .or(fc.audio.max_concurrency)
            .unwrap_or(audio_defaults.max_concurrency);
        if max_concurrency == 0 {
            return Err(Error::Config("max concurrency must be at least 1".to_string()));
        }
        let audio = AudioConfig {
            silence: parse_opt::<u64>(first(&["MIRROR_SILENCE_MS"]), "MIRROR_SILENCE_MS")?
                .or(fc.audio.silence_ms)
                .map_or(audio_defaults.silence, Duration::from_millis),
            max_concurrency,
            output_format,
        };

        let server = ServerConfig {
            port: parse_opt::<u16>(first(&["MIRROR_PORT", "PORT"]), "MIRROR_PORT")?
                .or(fc.server.port)
                .unwrap_or(ServerConfig::default().port),
        };

        let dispatch = DispatchConfig {
            lane_idle: parse_opt::<u64>(first(&["MIRROR_LANE_IDLE_SECS"]), "MIRROR_LANE_IDLE_SECS")?
                .or(fc.server.lane_idle_secs)
                .map_or(DispatchConfig::default().lane_idle, Duration::from_secs),
        };

        Ok(Self {
            telegram,
            polly,
            audio,
            server,
            dispatch,
        })
    }

    /// Check that everything the daemon needs is present
    ///
    /// # Errors
    ///
    /// Returns error describing the first missing setting
    pub fn validate_for_daemon(&self) -> Result<()> {
        if self.telegram.token.is_none() {
            return Err(Error::Config(
                "Telegram bot token required (TELEGRAM_BOT_TOKEN)".to_string(),
            ));
        }
        if self.telegram.mode == UpdateMode::Webhook && self.telegram.webhook_url.is_none() {
            return Err(Error::Config(
                "webhook mode requires TELEGRAM_WEBHOOK_URL".to_string(),
            ));
        }
        self.validate_for_synthesis()
    }

    /// Check that Polly credentials are present
    ///
    /// # Errors
    ///
    /// Returns error if the access key or secret key is missing
    pub fn validate_for_synthesis(&self) -> Result<()> {
        if self.polly.access_key_id.is_none() || self.polly.secret_access_key.is_none() {
            return Err(Error::Config(
                "AWS credentials required (AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY)".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_opt<T: FromStr>(value: Option<String>, key: &str) -> Result<Option<T>> {
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| Error::Config(format!("invalid value for {key}: {v}")))
        })
        .transpose()
}
