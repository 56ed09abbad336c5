//! Shared test utilities
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mirror_bot::channels::{AudioReply, Channel, IncomingMessage, OutgoingMessage};
use mirror_bot::config::AudioConfig;
use mirror_bot::voice::{
    AudioAssembler, AudioFragment, AudioPipeline, DEFAULT_SILENCE, DecodedSegment, FragmentCodec,
    SpeechSynthesizer, VoiceProfile,
};
use mirror_bot::{Error, InMemorySessionStore, MirrorBot, Result};

/// Sample rate of the fake PCM fragments
pub const TEST_RATE: u32 = 1000;

/// Samples per fake word
pub const WORD_SAMPLES: usize = 50;

/// Sample value that marks a word in the output
#[must_use]
pub fn marker(text: &str) -> i16 {
    i16::from(text.as_bytes().first().copied().unwrap_or(b'?')) * 100
}

/// Synthesizer that returns constant-valued PCM per word
///
/// Words starting earlier in the alphabet take longer, so `a b c` completes
/// in the order `c b a`.
pub struct FakeSynth {
    pub calls: Mutex<Vec<(String, VoiceProfile)>>,
    pub fail_on: Option<String>,
    /// Word answered with bytes that are not valid PCM
    pub corrupt_on: Option<String>,
}

impl FakeSynth {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
            corrupt_on: None,
        }
    }

    #[must_use]
    pub fn failing_on(word: &str) -> Self {
        Self {
            fail_on: Some(word.to_string()),
            ..Self::new()
        }
    }

    #[must_use]
    pub fn corrupting(word: &str) -> Self {
        Self {
            corrupt_on: Some(word.to_string()),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<(String, VoiceProfile)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    fn codec(&self) -> FragmentCodec {
        FragmentCodec::Pcm {
            sample_rate: TEST_RATE,
        }
    }

    async fn synthesize(&self, text: &str, profile: &VoiceProfile) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push((text.to_string(), *profile));

        let first = text.as_bytes().first().copied().unwrap_or(b'z');
        let delay = u64::from(b'z'.saturating_sub(first)) * 5;
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if self.fail_on.as_deref() == Some(text) {
            return Err(Error::Synthesis("backend unavailable".to_string()));
        }
        if self.corrupt_on.as_deref() == Some(text) {
            return Ok(vec![0x7f; 3]);
        }

        let value = marker(text);
        Ok((0..WORD_SAMPLES).flat_map(|_| value.to_le_bytes()).collect())
    }
}

/// Default audio settings with a 200 ms spacer
#[must_use]
pub fn audio_config() -> AudioConfig {
    AudioConfig::default()
}

/// Something a channel was asked to deliver
#[derive(Debug, Clone)]
pub enum Sent {
    Text(OutgoingMessage),
    Audio(AudioReply),
}

/// Channel that records everything it is asked to send
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<Sent>>,
    /// Reject every audio upload
    pub fail_audio: bool,
}

impl RecordingChannel {
    /// Channel whose audio uploads always fail
    #[must_use]
    pub fn failing_audio() -> Self {
        Self {
            fail_audio: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(m) => Some(m.content),
                Sent::Audio(_) => None,
            })
            .collect()
    }

    pub fn audio(&self) -> Vec<AudioReply> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Audio(a) => Some(a),
                Sent::Text(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text(message));
        Ok(())
    }

    async fn send_audio(&self, audio: AudioReply) -> Result<()> {
        if self.fail_audio {
            return Err(Error::Channel("sendAudio rejected: file too large".to_string()));
        }
        self.sent.lock().unwrap().push(Sent::Audio(audio));
        Ok(())
    }
}

/// Bot over a recording channel and the given synthesizer
pub fn test_bot(synth: Arc<FakeSynth>) -> (MirrorBot<RecordingChannel>, Arc<RecordingChannel>) {
    test_bot_with(synth, RecordingChannel::default())
}

/// Bot over a preconfigured recording channel
pub fn test_bot_with(
    synth: Arc<FakeSynth>,
    channel: RecordingChannel,
) -> (MirrorBot<RecordingChannel>, Arc<RecordingChannel>) {
    let channel = Arc::new(channel);
    let pipeline = AudioPipeline::new(synth, &audio_config());
    let bot = MirrorBot::new(
        Arc::clone(&channel),
        Arc::new(InMemorySessionStore::new()),
        pipeline,
    );
    (bot, channel)
}

/// A text message from `user`
#[must_use]
pub fn message(user: &str, id: u32, text: &str) -> IncomingMessage {
    IncomingMessage {
        id: id.to_string(),
        chat_id: format!("chat-{user}"),
        sender_id: user.to_string(),
        sender_name: user.to_string(),
        text: text.to_string(),
    }
}

/// Decode an MP3 artifact back to mono samples
pub fn decode_mp3(bytes: &[u8]) -> DecodedSegment {
    AudioAssembler::new(FragmentCodec::Mp3, DEFAULT_SILENCE)
        .decode(AudioFragment {
            index: 0,
            bytes: bytes.to_vec(),
        })
        .unwrap()
}
