//! Utterance to audio: synthesis fan-out followed by assembly

use std::sync::Arc;

use super::assembler::{AudioAssembler, OutputArtifact};
use super::profile::Language;
use super::synth::{FragmentRequest, SpeechSynthesizer, synthesize_all};
use crate::config::AudioConfig;
use crate::{Error, Result};

/// Renders a reversed word sequence as one audio artifact
#[derive(Clone)]
pub struct AudioPipeline {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    assembler: AudioAssembler,
    max_concurrency: usize,
}

impl AudioPipeline {
    /// Create a pipeline around a synthesis backend
    #[must_use]
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, config: &AudioConfig) -> Self {
        let assembler = AudioAssembler::new(synthesizer.codec(), config.silence);
        Self {
            synthesizer,
            assembler,
            max_concurrency: config.max_concurrency,
        }
    }

    /// Synthesize every word and assemble the result
    ///
    /// Decoding and encoding run on the blocking pool once every fragment is in.
    ///
    /// # Errors
    ///
    /// Returns `Error::Synthesis` if any word fails to synthesize, or
    /// `Error::Decode` / `Error::Encode` if assembly fails
    pub async fn render(&self, words: &[String], language: Language) -> Result<OutputArtifact> {
        let requests = FragmentRequest::for_words(words, language);
        let fragments =
            synthesize_all(self.synthesizer.as_ref(), &requests, self.max_concurrency).await?;

        let assembler = self.assembler.clone();
        tokio::task::spawn_blocking(move || assembler.assemble(fragments))
            .await
            .map_err(|e| Error::Audio(format!("assembly task failed: {e}")))?
    }
}
