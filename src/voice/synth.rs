//! Speech synthesis contract and per-word fan-out

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};

use super::profile::{Language, VoiceProfile};
use crate::{Error, Result};

/// Encoding of the bytes a synthesizer returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentCodec {
    /// MPEG layer III
    Mp3,
    /// Headerless signed 16-bit little-endian mono PCM
    Pcm {
        /// Samples per second
        sample_rate: u32,
    },
}

impl FragmentCodec {
    /// Backend name of the output format
    #[must_use]
    pub const fn format_name(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Pcm { .. } => "pcm",
        }
    }
}

/// One word to synthesize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRequest {
    /// Position in the word sequence
    pub index: usize,
    /// Reversed word text
    pub text: String,
    /// Session language at the time of the request
    pub language: Language,
}

impl FragmentRequest {
    /// Build requests for a reversed word sequence
    #[must_use]
    pub fn for_words(words: &[String], language: Language) -> Vec<Self> {
        words
            .iter()
            .enumerate()
            .map(|(index, text)| Self {
                index,
                text: text.clone(),
                language,
            })
            .collect()
    }
}

/// Raw audio returned for one fragment request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFragment {
    /// Position in the word sequence
    pub index: usize,
    /// Encoded audio bytes
    pub bytes: Vec<u8>,
}

/// Remote text-to-speech backend
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Encoding of the bytes returned by `synthesize`
    fn codec(&self) -> FragmentCodec;

    /// Synthesize a single text fragment
    ///
    /// # Errors
    ///
    /// Returns `Error::Synthesis` if the backend call fails
    async fn synthesize(&self, text: &str, profile: &VoiceProfile) -> Result<Vec<u8>>;
}

/// Synthesize every request, at most `max_concurrency` at a time
///
/// Fragments come back in request order no matter which call finishes first.
///
/// # Errors
///
/// Returns the first synthesis error; no partial set of fragments is returned
pub async fn synthesize_all(
    synthesizer: &dyn SpeechSynthesizer,
    requests: &[FragmentRequest],
    max_concurrency: usize,
) -> Result<Vec<AudioFragment>> {
    // Collected eagerly; a lazy `map` adapter here makes the future non-Send
    let calls: Vec<_> = requests
        .iter()
        .map(|request| synthesize_one(synthesizer, request))
        .collect();

    stream::iter(calls)
        .buffered(max_concurrency.max(1))
        .try_collect()
        .await
}

async fn synthesize_one(
    synthesizer: &dyn SpeechSynthesizer,
    request: &FragmentRequest,
) -> Result<AudioFragment> {
    let profile = VoiceProfile::for_language(request.language);
    let bytes = synthesizer
        .synthesize(&request.text, &profile)
        .await
        .map_err(|e| match e {
            Error::Synthesis(msg) => Error::Synthesis(format!("word {}: {msg}", request.index)),
            other => other,
        })?;

    tracing::trace!(index = request.index, bytes = bytes.len(), "fragment synthesized");

    Ok(AudioFragment {
        index: request.index,
        bytes,
    })
}
