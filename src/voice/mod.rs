//! Speech pipeline
//!
//! Voice selection, per-word synthesis through Amazon Polly, and assembly of
//! the fragments into one audio reply.

mod assembler;
mod pipeline;
mod polly;
mod profile;
pub mod sigv4;
mod synth;

pub use assembler::{
    AssembledTrack, AudioAssembler, DEFAULT_SILENCE, DecodedSegment, EMPTY_TRACK_SAMPLE_RATE,
    OUTPUT_FILE_NAME, OUTPUT_MIME_TYPE, OutputArtifact, SpanKind, TrackSpan, encode_track,
};
pub use pipeline::AudioPipeline;
pub use polly::PollyClient;
pub use profile::{Engine, Language, VoiceProfile, select_voice};
pub use synth::{
    AudioFragment, FragmentCodec, FragmentRequest, SpeechSynthesizer, synthesize_all,
};
