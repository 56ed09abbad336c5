//! Audio assembly: decode fragments, join them with silence, encode one track

use std::borrow::Cow;
use std::io::Cursor;
use std::time::Duration;

use mp3lame_encoder::{FlushNoGap, MonoPcm};

use super::synth::{AudioFragment, FragmentCodec};
use crate::{Error, Result};

/// Silence inserted after every word
pub const DEFAULT_SILENCE: Duration = Duration::from_millis(200);

/// Sample rate of a track with no segments
pub const EMPTY_TRACK_SAMPLE_RATE: u32 = 22050;

/// MIME type of the output artifact
pub const OUTPUT_MIME_TYPE: &str = "audio/mpeg";

/// File name the artifact is delivered under
pub const OUTPUT_FILE_NAME: &str = "mirror.mp3";

/// Sample rates an MPEG layer III stream can carry
const MP3_SAMPLE_RATES: [u32; 9] = [
    8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000,
];

/// Audio decoded from one fragment
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSegment {
    /// Position in the word sequence
    pub index: usize,
    /// Samples per second
    pub sample_rate: u32,
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
}

/// What a span of the assembled track contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Decoded audio of the word at this index
    Segment(usize),
    /// Inter-word spacer
    Silence,
}

/// A contiguous run of samples in the assembled track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackSpan {
    /// Word segment or spacer
    pub kind: SpanKind,
    /// First sample of the span
    pub start: usize,
    /// Number of samples
    pub len: usize,
}

/// Segments and spacers laid out in word order
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTrack {
    /// Samples per second, taken from the first segment
    pub sample_rate: u32,
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Where each segment and spacer sits in `samples`
    pub spans: Vec<TrackSpan>,
}

impl AssembledTrack {
    /// Playback length of the track
    #[must_use]
    pub fn duration(&self) -> Duration {
        duration_of(self.samples.len(), self.sample_rate)
    }

    /// Span kinds in track order
    #[must_use]
    pub fn layout(&self) -> Vec<SpanKind> {
        self.spans.iter().map(|s| s.kind).collect()
    }
}

/// Final encoded audio reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    /// Encoded MP3 stream
    pub bytes: Vec<u8>,
    /// Content type for the upload
    pub mime_type: &'static str,
    /// Upload file name
    pub file_name: String,
    /// Playback length of the assembled track
    pub duration: Duration,
}

/// Turns synthesized fragments into one playable artifact
#[derive(Debug, Clone)]
pub struct AudioAssembler {
    codec: FragmentCodec,
    silence: Duration,
}

impl AudioAssembler {
    /// Create an assembler for fragments encoded with `codec`
    #[must_use]
    pub const fn new(codec: FragmentCodec, silence: Duration) -> Self {
        Self { codec, silence }
    }

    /// Decode, join and encode `fragments`
    ///
    /// Fragments may arrive in any order; they are laid out by index. An
    /// empty input yields a zero-duration artifact.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if any fragment is not valid audio; nothing is
    /// produced in that case
    pub fn assemble(&self, fragments: Vec<AudioFragment>) -> Result<OutputArtifact> {
        let segments = fragments
            .into_iter()
            .map(|fragment| self.decode(fragment))
            .collect::<Result<Vec<_>>>()?;

        let track = self.build_track(segments)?;
        tracing::debug!(
            segments = track.spans.len() / 2,
            samples = track.samples.len(),
            sample_rate = track.sample_rate,
            "track assembled"
        );

        encode_track(&track)
    }

    /// Decode one fragment, keeping its index
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if the bytes are not valid for the codec
    pub fn decode(&self, fragment: AudioFragment) -> Result<DecodedSegment> {
        let (sample_rate, samples) = match self.codec {
            FragmentCodec::Mp3 => decode_mp3(&fragment.bytes),
            FragmentCodec::Pcm { sample_rate } => {
                decode_pcm(&fragment.bytes).map(|s| (sample_rate, s))
            }
        }
        .map_err(|e| match e {
            Error::Decode(msg) => Error::Decode(format!("fragment {}: {msg}", fragment.index)),
            other => other,
        })?;

        Ok(DecodedSegment {
            index: fragment.index,
            sample_rate,
            samples,
        })
    }

    /// Lay segments out in index order, each followed by a spacer
    ///
    /// Segments whose rate differs from the first segment are resampled.
    ///
    /// # Errors
    ///
    /// Returns error if resampling fails
    pub fn build_track(&self, mut segments: Vec<DecodedSegment>) -> Result<AssembledTrack> {
        segments.sort_by_key(|s| s.index);

        let sample_rate = segments
            .first()
            .map_or(EMPTY_TRACK_SAMPLE_RATE, |s| s.sample_rate);
        let silence_len = samples_for(self.silence, sample_rate);

        let total: usize = segments.iter().map(|s| s.samples.len() + silence_len).sum();
        let mut samples = Vec::with_capacity(total);
        let mut spans = Vec::with_capacity(segments.len() * 2);

        for segment in segments {
            let audio = if segment.sample_rate == sample_rate {
                segment.samples
            } else {
                resample(&segment.samples, segment.sample_rate, sample_rate)?
            };

            spans.push(TrackSpan {
                kind: SpanKind::Segment(segment.index),
                start: samples.len(),
                len: audio.len(),
            });
            samples.extend_from_slice(&audio);

            spans.push(TrackSpan {
                kind: SpanKind::Silence,
                start: samples.len(),
                len: silence_len,
            });
            samples.resize(samples.len() + silence_len, 0.0);
        }

        Ok(AssembledTrack {
            sample_rate,
            samples,
            spans,
        })
    }
}

/// Encode a track as a mono MP3 stream
///
/// Tracks at a rate MP3 cannot carry are resampled up to the nearest one
/// that it can.
///
/// # Errors
///
/// Returns `Error::Encode` if LAME rejects the parameters or the input
pub fn encode_track(track: &AssembledTrack) -> Result<OutputArtifact> {
    let sample_rate = mp3_sample_rate(track.sample_rate);
    let samples = if sample_rate == track.sample_rate {
        Cow::Borrowed(track.samples.as_slice())
    } else {
        Cow::Owned(resample(&track.samples, track.sample_rate, sample_rate)?)
    };
    let pcm: Vec<i16> = samples.iter().map(|&s| to_i16(s)).collect();

    let mut builder = mp3lame_encoder::Builder::new()
        .ok_or_else(|| Error::Encode("failed to allocate LAME encoder".to_string()))?;
    builder.set_num_channels(1).map_err(lame_error)?;
    builder.set_sample_rate(sample_rate).map_err(lame_error)?;
    let mut encoder = builder.build().map_err(lame_error)?;

    let mut bytes = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(pcm.len()));
    if !pcm.is_empty() {
        encoder
            .encode_to_vec(MonoPcm(pcm.as_slice()), &mut bytes)
            .map_err(lame_error)?;
    }
    // Room for the final frames
    bytes.reserve(mp3lame_encoder::max_required_buffer_size(0));
    encoder
        .flush_to_vec::<FlushNoGap>(&mut bytes)
        .map_err(lame_error)?;

    Ok(OutputArtifact {
        bytes,
        mime_type: OUTPUT_MIME_TYPE,
        file_name: OUTPUT_FILE_NAME.to_string(),
        duration: track.duration(),
    })
}

/// Smallest MP3 sample rate at or above `rate`
fn mp3_sample_rate(rate: u32) -> u32 {
    MP3_SAMPLE_RATES
        .iter()
        .copied()
        .find(|&supported| supported >= rate)
        .unwrap_or(MP3_SAMPLE_RATES[MP3_SAMPLE_RATES.len() - 1])
}

#[allow(clippy::needless_pass_by_value)]
fn lame_error(e: impl std::fmt::Debug) -> Error {
    Error::Encode(format!("MP3 encoder: {e:?}"))
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(data: &[u8]) -> Result<(u32, Vec<f32>)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let rate = u32::try_from(frame.sample_rate)
                    .map_err(|_| Error::Decode("negative sample rate".to_string()))?;
                sample_rate.get_or_insert(rate);

                if frame.channels == 2 {
                    // Stereo: average channels
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = i16_to_f32(chunk[0]);
                        let right = i16_to_f32(chunk.get(1).copied().unwrap_or(chunk[0]));
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().copied().map(i16_to_f32));
                }
            }
            Err(minimp3::Error::Eof) => break,
            // ID3 tags and padding between frames
            Err(minimp3::Error::SkippedData) => {}
            Err(e) => return Err(Error::Decode(format!("MP3 decode error: {e}"))),
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| Error::Decode("no MP3 frames found".to_string()))?;
    Ok((sample_rate, samples))
}

/// Decode headerless 16-bit little-endian PCM
fn decode_pcm(data: &[u8]) -> Result<Vec<f32>> {
    if data.is_empty() {
        return Err(Error::Decode("empty PCM fragment".to_string()));
    }
    if data.len() % 2 != 0 {
        return Err(Error::Decode(format!(
            "PCM fragment has odd length {}",
            data.len()
        )));
    }

    Ok(data
        .chunks_exact(2)
        .map(|pair| i16_to_f32(i16::from_le_bytes([pair[0], pair[1]])))
        .collect())
}

/// Resample mono audio using rubato
#[allow(clippy::cast_possible_truncation)]
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    let chunk_size = 1024;
    let sub_chunks = 2;

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, sub_chunks, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let expected =
        (samples.len() as u128 * u128::from(to_rate) / u128::from(from_rate)) as usize;
    let delay = resampler.output_delay();

    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    let mut output = Vec::with_capacity(expected + delay);

    for chunk in input.chunks(chunk_size) {
        let result = if chunk.len() == chunk_size {
            resampler.process(&[chunk][..], None)
        } else {
            resampler.process_partial(Some(&[chunk][..]), None)
        }
        .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    // Flush the filter tail
    while output.len() < delay + expected {
        let result = resampler
            .process_partial::<Vec<f64>>(None, None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        if result[0].is_empty() {
            break;
        }
        output.extend_from_slice(&result[0]);
    }

    Ok(output
        .iter()
        .skip(delay)
        .take(expected)
        .map(|&s| s as f32)
        .collect())
}

fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

#[allow(clippy::cast_possible_truncation)]
fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}

#[allow(clippy::cast_possible_truncation)]
fn samples_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_millis() * u128::from(sample_rate) / 1000) as usize
}

#[allow(clippy::cast_precision_loss)]
fn duration_of(samples: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(samples as f64 / f64::from(sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 8000;

    fn pcm_assembler() -> AudioAssembler {
        AudioAssembler::new(FragmentCodec::Pcm { sample_rate: RATE }, DEFAULT_SILENCE)
    }

    fn mp3_assembler() -> AudioAssembler {
        AudioAssembler::new(FragmentCodec::Mp3, DEFAULT_SILENCE)
    }

    /// 440 Hz tone
    #[allow(clippy::cast_precision_loss)]
    fn sine(sample_rate: u32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| {
                let t = n as f32 / sample_rate as f32;
                amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            })
            .collect()
    }

    fn to_pcm(samples: &[f32]) -> Vec<i16> {
        samples.iter().map(|&s| to_i16(s)).collect()
    }

    #[allow(clippy::cast_precision_loss)]
    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    fn stereo_mp3(left: &[i16], right: &[i16], sample_rate: u32) -> Vec<u8> {
        let mut builder = mp3lame_encoder::Builder::new().unwrap();
        builder.set_num_channels(2).unwrap();
        builder.set_sample_rate(sample_rate).unwrap();
        let mut encoder = builder.build().unwrap();

        let mut out = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(left.len()));
        encoder
            .encode_to_vec(mp3lame_encoder::DualPcm { left, right }, &mut out)
            .unwrap();
        out.reserve(mp3lame_encoder::max_required_buffer_size(0));
        encoder.flush_to_vec::<FlushNoGap>(&mut out).unwrap();
        out
    }

    fn pcm_fragment(index: usize, value: i16, len: usize) -> AudioFragment {
        AudioFragment {
            index,
            bytes: std::iter::repeat_n(value.to_le_bytes(), len)
                .flatten()
                .collect(),
        }
    }

    #[test]
    fn test_silence_after_every_segment() {
        let assembler = pcm_assembler();
        let segments = vec![
            assembler.decode(pcm_fragment(1, 2000, 10)).unwrap(),
            assembler.decode(pcm_fragment(0, 1000, 10)).unwrap(),
        ];

        let track = assembler.build_track(segments).unwrap();

        assert_eq!(
            track.layout(),
            vec![
                SpanKind::Segment(0),
                SpanKind::Silence,
                SpanKind::Segment(1),
                SpanKind::Silence,
            ]
        );
        // 200ms at 8kHz
        assert_eq!(track.spans[1].len, 1600);
        assert_eq!(track.samples.len(), 2 * (10 + 1600));
        assert!(track.samples[10..1610].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_pcm_decode_values() {
        let segment = pcm_assembler().decode(pcm_fragment(3, -16384, 4)).unwrap();
        assert_eq!(segment.index, 3);
        assert_eq!(segment.sample_rate, RATE);
        assert_eq!(segment.samples, vec![-0.5; 4]);
    }

    #[test]
    fn test_odd_pcm_is_decode_error() {
        let fragment = AudioFragment {
            index: 2,
            bytes: vec![1, 2, 3],
        };
        let err = pcm_assembler().decode(fragment).unwrap_err();
        assert!(matches!(err, Error::Decode(msg) if msg.starts_with("fragment 2")));
    }

    #[test]
    fn test_garbage_mp3_is_decode_error() {
        let assembler = AudioAssembler::new(FragmentCodec::Mp3, DEFAULT_SILENCE);
        let fragment = AudioFragment {
            index: 0,
            bytes: b"definitely not an mp3 stream".to_vec(),
        };
        assert!(matches!(assembler.decode(fragment), Err(Error::Decode(_))));
    }

    #[test]
    fn test_one_bad_fragment_fails_assembly() {
        let fragments = vec![
            pcm_fragment(0, 100, 4),
            AudioFragment {
                index: 1,
                bytes: Vec::new(),
            },
            pcm_fragment(2, 100, 4),
        ];
        assert!(matches!(
            pcm_assembler().assemble(fragments),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_empty_input_is_zero_duration() {
        let artifact = pcm_assembler().assemble(Vec::new()).unwrap();
        assert_eq!(artifact.duration, Duration::ZERO);
        assert_eq!(artifact.mime_type, OUTPUT_MIME_TYPE);
        assert_eq!(artifact.file_name, OUTPUT_FILE_NAME);
    }

    #[test]
    fn test_track_encodes_to_mp3() {
        let assembler = pcm_assembler();
        let track = assembler
            .build_track(vec![DecodedSegment {
                index: 0,
                sample_rate: RATE,
                samples: sine(RATE, 0.5, 8000),
            }])
            .unwrap();

        let artifact = encode_track(&track).unwrap();
        assert_eq!(artifact.mime_type, "audio/mpeg");
        assert_eq!(artifact.duration, Duration::from_millis(1200));

        let decoded = mp3_assembler()
            .decode(AudioFragment {
                index: 0,
                bytes: artifact.bytes,
            })
            .unwrap();
        assert_eq!(decoded.sample_rate, RATE);
        assert!(decoded.samples.len() >= track.samples.len());
        assert!(rms(&decoded.samples) > 0.1);
    }

    #[test]
    fn test_unsupported_rate_is_raised_for_mp3() {
        assert_eq!(mp3_sample_rate(1000), 8000);
        assert_eq!(mp3_sample_rate(22050), 22050);
        assert_eq!(mp3_sample_rate(23000), 24000);
        assert_eq!(mp3_sample_rate(96000), 48000);

        let track = pcm_assembler()
            .build_track(vec![DecodedSegment {
                index: 0,
                sample_rate: 1000,
                samples: vec![0.0; 500],
            }])
            .unwrap();
        let artifact = encode_track(&track).unwrap();
        assert_eq!(artifact.duration, Duration::from_millis(700));

        let decoded = mp3_assembler()
            .decode(AudioFragment {
                index: 0,
                bytes: artifact.bytes,
            })
            .unwrap();
        assert_eq!(decoded.sample_rate, 8000);
        assert!(decoded.samples.len() >= 5600);
    }

    #[test]
    fn test_mp3_fixture_reports_its_rate() {
        let tone = to_pcm(&sine(16000, 0.5, 16000));
        let segment = mp3_assembler()
            .decode(AudioFragment {
                index: 4,
                bytes: stereo_mp3(&tone, &tone, 16000),
            })
            .unwrap();

        assert_eq!(segment.index, 4);
        assert_eq!(segment.sample_rate, 16000);
        assert!(segment.samples.len() >= 16000);
        // Identical channels average to the same tone
        assert!(rms(&segment.samples) > 0.25);
    }

    #[test]
    fn test_mp3_stereo_is_averaged_to_mono() {
        let left = to_pcm(&sine(16000, 0.5, 16000));
        let right: Vec<i16> = left.iter().map(|&s| s.saturating_neg()).collect();

        let segment = mp3_assembler()
            .decode(AudioFragment {
                index: 0,
                bytes: stereo_mp3(&left, &right, 16000),
            })
            .unwrap();

        // Opposite-phase channels cancel out
        assert!(segment.samples.len() >= 16000);
        assert!(rms(&segment.samples) < 0.05);
    }

    #[test]
    fn test_mismatched_rate_is_resampled() {
        let assembler = pcm_assembler();
        let first = DecodedSegment {
            index: 0,
            sample_rate: 16000,
            samples: vec![0.1; 1600],
        };
        let second = DecodedSegment {
            index: 1,
            sample_rate: 8000,
            samples: vec![0.1; 4000],
        };

        let track = assembler.build_track(vec![first, second]).unwrap();

        assert_eq!(track.sample_rate, 16000);
        assert_eq!(track.spans[0].len, 1600);
        assert_eq!(track.spans[2].len, 8000);
    }

    #[test]
    fn test_sample_conversion_is_exact() {
        for value in [0i16, 1, -1, 1000, -32768, 32767] {
            assert_eq!(to_i16(i16_to_f32(value)), value);
        }
    }
}
