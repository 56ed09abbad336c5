//! Amazon Polly speech synthesis

use async_trait::async_trait;
use serde::Serialize;

use super::profile::VoiceProfile;
use super::sigv4::{self, Credentials, SigningRequest};
use super::synth::{FragmentCodec, SpeechSynthesizer};
use crate::config::PollyConfig;
use crate::{Error, Result};

const SERVICE: &str = "polly";
const SPEECH_PATH: &str = "/v1/speech";

/// `SynthesizeSpeech` request body
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SynthesizeSpeechRequest<'a> {
    engine: &'a str,
    output_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<String>,
    text: &'a str,
    voice_id: &'a str,
}

/// Synthesizes speech through Amazon Polly's REST API
pub struct PollyClient {
    client: reqwest::Client,
    credentials: Credentials,
    region: String,
    endpoint: String,
    host: String,
    codec: FragmentCodec,
}

impl PollyClient {
    /// Create a Polly client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if credentials are missing or the endpoint is malformed
    pub fn new(config: &PollyConfig, codec: FragmentCodec) -> Result<Self> {
        let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        else {
            return Err(Error::Config(
                "AWS access key and secret key required for Polly".to_string(),
            ));
        };

        let endpoint = config.endpoint.clone().unwrap_or_else(|| {
            format!("https://polly.{}.amazonaws.com", config.region)
        });
        let host = endpoint
            .split_once("://")
            .map_or(endpoint.as_str(), |(_, rest)| rest)
            .trim_end_matches('/')
            .to_string();
        if host.is_empty() || host.contains('/') {
            return Err(Error::Config(format!("invalid Polly endpoint: {endpoint}")));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            credentials: Credentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: config.session_token.clone(),
            },
            region: config.region.clone(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            host,
            codec,
        })
    }

    fn request_body(&self, text: &str, profile: &VoiceProfile) -> Result<Vec<u8>> {
        let sample_rate = match self.codec {
            FragmentCodec::Mp3 => None,
            FragmentCodec::Pcm { sample_rate } => Some(sample_rate.to_string()),
        };
        let request = SynthesizeSpeechRequest {
            engine: profile.engine.as_str(),
            output_format: self.codec.format_name(),
            sample_rate,
            text,
            voice_id: profile.voice_id,
        };
        Ok(serde_json::to_vec(&request)?)
    }
}

#[async_trait]
impl SpeechSynthesizer for PollyClient {
    fn codec(&self) -> FragmentCodec {
        self.codec
    }

    async fn synthesize(&self, text: &str, profile: &VoiceProfile) -> Result<Vec<u8>> {
        let body = self.request_body(text, profile)?;

        let signed = sigv4::sign(
            &SigningRequest {
                method: "POST",
                host: &self.host,
                path: SPEECH_PATH,
                headers: &[("content-type", "application/json")],
                payload: &body,
            },
            &self.credentials,
            &self.region,
            SERVICE,
            chrono::Utc::now(),
        )?;

        let mut request = self
            .client
            .post(format!("{}{SPEECH_PATH}", self.endpoint))
            .header("content-type", "application/json")
            .header("x-amz-date", &signed.amz_date)
            .header("authorization", &signed.authorization);
        if let Some(token) = &signed.security_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request.body(body).send().await.map_err(|e| {
            tracing::error!(error = %e, voice = profile.voice_id, "Polly request failed");
            Error::Synthesis(format!("Polly request error: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Polly API error");
            return Err(Error::Synthesis(format!("Polly error {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Synthesis(format!("Polly response read error: {e}")))?;

        tracing::debug!(
            voice = profile.voice_id,
            engine = profile.engine.as_str(),
            bytes = audio.len(),
            "Polly synthesis complete"
        );
        Ok(audio.to_vec())
    }
}
