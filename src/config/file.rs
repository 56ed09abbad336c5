//! TOML configuration file loading
//!
//! Supports `~/.config/mirror/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MirrorConfigFile {
    /// Telegram transport
    #[serde(default)]
    pub telegram: TelegramFileConfig,

    /// AWS credentials and Polly endpoint
    #[serde(default)]
    pub aws: AwsFileConfig,

    /// Audio assembly
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Telegram configuration
#[derive(Debug, Default, Deserialize)]
pub struct TelegramFileConfig {
    pub token: Option<String>,
    /// "polling" or "webhook"
    pub mode: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
}

/// AWS configuration
#[derive(Debug, Default, Deserialize)]
pub struct AwsFileConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub region: Option<String>,
    pub polly_endpoint: Option<String>,
}

/// Audio configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Silence after each word, in milliseconds
    pub silence_ms: Option<u64>,
    /// Concurrent Polly requests per message
    pub max_concurrency: Option<usize>,
    /// "mp3" or "pcm"
    pub output_format: Option<String>,
    pub pcm_sample_rate: Option<u32>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// HTTP port (webhook mode and health)
    pub port: Option<u16>,
    /// Seconds before an idle per-user lane shuts down
    pub lane_idle_secs: Option<u64>,
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse_config(content: &str) -> Result<MirrorConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `MirrorConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> MirrorConfigFile {
    config_file_path().map_or_else(MirrorConfigFile::default, |path| load_from_path(&path))
}

/// Load a config file from `path`, falling back to defaults
pub fn load_from_path(path: &Path) -> MirrorConfigFile {
    if !path.exists() {
        return MirrorConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                MirrorConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            MirrorConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/mirror/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("mirror").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_file() {
        let fc = parse_config(
            r#"
            [telegram]
            mode = "webhook"

            [audio]
            silence_ms = 150
            "#,
        )
        .unwrap();

        assert_eq!(fc.telegram.mode.as_deref(), Some("webhook"));
        assert_eq!(fc.audio.silence_ms, Some(150));
        assert!(fc.aws.region.is_none());
        assert!(fc.server.port.is_none());
    }

    #[test]
    fn test_parse_empty_file() {
        let fc = parse_config("").unwrap();
        assert!(fc.telegram.token.is_none());
    }

    #[test]
    fn test_malformed_file_is_error() {
        assert!(parse_config("[audio\nsilence_ms = ").is_err());
    }

    #[test]
    fn test_missing_path_is_default() {
        let fc = load_from_path(Path::new("/nonexistent/mirror/config.toml"));
        assert!(fc.audio.output_format.is_none());
    }
}
