//! Decoding capabilities consumed by the playback core.
//!
//! Container parsing and codec internals live outside this crate. The core
//! only sees them through the traits below: a [`MediaParser`] hands out
//! timestamped encoded frames, decoders turn them into raw images or PCM,
//! and a [`MediaHandler`] is the explicit context that constructs decoders.
//!
//! Decoded audio is always interleaved stereo signed 16-bit at the output
//! sample rate (see [`crate::core::time::constants`]).

use crate::core::time::{constants, Millis};
use crate::decode::stream_info::{AudioInfo, SoundInfo, StreamKind, VideoInfo};

/// Error type for decoding operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported codec: {0}")]
    Unsupported(String),
    #[error("decoder resources exhausted: {0}")]
    Resource(String),
    #[error("corrupt frame at {timestamp} ms: {reason}")]
    Corrupt { timestamp: Millis, reason: String },
    #[error("seek to {0} ms rejected")]
    SeekRejected(Millis),
}

impl DecodeError {
    /// Whether the failure ends the whole session rather than one frame or stream
    pub fn is_fatal(&self) -> bool {
        matches!(self, DecodeError::Resource(_))
    }
}

/// Encoded frame as delivered by the parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    pub timestamp: Millis,
    pub kind: StreamKind,
}

impl EncodedFrame {
    pub fn new(kind: StreamKind, timestamp: Millis, data: Vec<u8>) -> Self {
        Self {
            data,
            timestamp,
            kind,
        }
    }
}

/// Decoded video frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub data: Vec<u8>, // Raw pixel data, layout owned by the decoder
    pub width: u32,
    pub height: u32,
    pub timestamp: Millis,
}

/// Decoded audio: interleaved stereo i16 at the output rate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmChunk {
    pub samples: Vec<i16>,
    pub timestamp: Millis,
}

impl PcmChunk {
    pub fn new(timestamp: Millis, samples: Vec<i16>) -> Self {
        Self { samples, timestamp }
    }

    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / constants::OUTPUT_CHANNELS
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Scale every sample by `volume` percent, truncating toward zero
    pub fn apply_volume(&mut self, volume: u8) {
        crate::audio::buffer::scale(&mut self.samples, volume as i32, 100);
    }
}

/// Result of one byte-oriented sound decode call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoundOutput {
    pub samples: Vec<i16>,
    /// Input bytes consumed
    pub consumed: usize,
}

/// Source of timestamped encoded frames (container parser).
///
/// Absence of a frame means "not parsed yet" unless `parsing_complete()`
/// says no more data will ever arrive. Implementations must not block.
pub trait MediaParser: Send {
    /// Timestamp of the next frame of `kind`, if one has been parsed
    fn next_frame_timestamp(&mut self, kind: StreamKind) -> Option<Millis>;

    /// Take the next frame of `kind`
    fn next_frame(&mut self, kind: StreamKind) -> Option<EncodedFrame>;

    /// Reposition the input near `position`, returning the actual position
    /// (usually a keyframe)
    fn seek(&mut self, position: Millis) -> Result<Millis, DecodeError>;

    /// Parse a bit more input. Returns `false` once nothing is left.
    fn parse_next_chunk(&mut self) -> bool;

    fn parsing_complete(&self) -> bool;

    /// Timestamp of the newest frame parsed and not yet handed out
    fn buffered_until(&self) -> Option<Millis>;

    fn bytes_loaded(&self) -> u64;

    fn bytes_total(&self) -> u64;

    fn audio_info(&self) -> Option<&AudioInfo>;

    fn video_info(&self) -> Option<&VideoInfo>;
}

/// Decodes one encoded video frame into an image
pub trait VideoDecoder: Send {
    fn decode(&mut self, frame: EncodedFrame) -> Result<VideoFrame, DecodeError>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;
}

/// Decodes one encoded audio frame into PCM
pub trait AudioDecoder: Send {
    fn decode(&mut self, frame: EncodedFrame) -> Result<PcmChunk, DecodeError>;
}

/// Decodes event sound data on demand, without a frame parser
pub trait SoundDecoder: Send {
    /// Decode from the start of `input`. A result with no samples and nothing
    /// consumed means the decoder cannot make progress.
    fn decode(&mut self, input: &[u8]) -> Result<SoundOutput, DecodeError>;
}

/// Explicit decoder construction context, passed to the stream and the mixer
pub trait MediaHandler: Send + Sync {
    fn create_video_decoder(&self, info: &VideoInfo) -> Result<Box<dyn VideoDecoder>, DecodeError>;

    fn create_audio_decoder(&self, info: &AudioInfo) -> Result<Box<dyn AudioDecoder>, DecodeError>;

    fn create_sound_decoder(&self, info: &SoundInfo) -> Result<Box<dyn SoundDecoder>, DecodeError>;
}

/// Opens parsers for URLs
pub trait StreamProvider {
    fn open(&self, url: &str) -> Option<Box<dyn MediaParser>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(DecodeError::Resource("oom".into()).is_fatal());
        assert!(!DecodeError::Unsupported("vp6".into()).is_fatal());
        assert!(!DecodeError::SeekRejected(10).is_fatal());
    }

    #[test]
    fn test_pcm_chunk_frames_and_volume() {
        let mut chunk = PcmChunk::new(0, vec![200, -200, 1000, 3]);
        assert_eq!(chunk.frames(), 2);
        chunk.apply_volume(50);
        assert_eq!(chunk.samples, vec![100, -100, 500, 1]);
    }
}
