//! Default decoder construction context.
//!
//! PCM (raw and uncompressed) is decoded in-crate. Everything else is
//! delegated to factories registered by the embedder; an unregistered codec
//! is reported as unsupported.

use crate::decode::decoder::{
    AudioDecoder, DecodeError, EncodedFrame, MediaHandler, PcmChunk, SoundDecoder, VideoDecoder,
};
use crate::decode::pcm::PcmDecoder;
use crate::decode::stream_info::{AudioCodec, AudioInfo, SoundInfo, VideoInfo};

pub type AudioDecoderFactory =
    Box<dyn Fn(&AudioInfo) -> Result<Box<dyn AudioDecoder>, DecodeError> + Send + Sync>;
pub type VideoDecoderFactory =
    Box<dyn Fn(&VideoInfo) -> Result<Box<dyn VideoDecoder>, DecodeError> + Send + Sync>;
pub type SoundDecoderFactory =
    Box<dyn Fn(&SoundInfo) -> Result<Box<dyn SoundDecoder>, DecodeError> + Send + Sync>;

fn is_pcm(codec: AudioCodec) -> bool {
    matches!(codec, AudioCodec::Raw | AudioCodec::Uncompressed)
}

/// Stream audio decoder for PCM frames
pub struct PcmStreamDecoder {
    inner: PcmDecoder,
}

impl PcmStreamDecoder {
    pub fn new(info: &AudioInfo) -> Result<Self, DecodeError> {
        Ok(Self {
            inner: PcmDecoder::new(&SoundInfo::from(info))?,
        })
    }
}

impl AudioDecoder for PcmStreamDecoder {
    fn decode(&mut self, frame: EncodedFrame) -> Result<PcmChunk, DecodeError> {
        let mut samples = Vec::new();
        let mut input = frame.data.as_slice();
        while !input.is_empty() {
            let out = self.inner.decode(input)?;
            if out.consumed == 0 {
                return Err(DecodeError::Corrupt {
                    timestamp: frame.timestamp,
                    reason: "decoder made no progress".to_string(),
                });
            }
            samples.extend_from_slice(&out.samples);
            input = &input[out.consumed..];
        }
        Ok(PcmChunk::new(frame.timestamp, samples))
    }
}

/// Media handler with built-in PCM support and pluggable codecs
#[derive(Default)]
pub struct DefaultMediaHandler {
    audio: Option<AudioDecoderFactory>,
    video: Option<VideoDecoderFactory>,
    sound: Option<SoundDecoderFactory>,
}

impl DefaultMediaHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `factory` for compressed audio streams
    pub fn with_audio_decoder(mut self, factory: AudioDecoderFactory) -> Self {
        self.audio = Some(factory);
        self
    }

    pub fn with_video_decoder(mut self, factory: VideoDecoderFactory) -> Self {
        self.video = Some(factory);
        self
    }

    /// Use `factory` for compressed event sounds
    pub fn with_sound_decoder(mut self, factory: SoundDecoderFactory) -> Self {
        self.sound = Some(factory);
        self
    }
}

impl MediaHandler for DefaultMediaHandler {
    fn create_video_decoder(&self, info: &VideoInfo) -> Result<Box<dyn VideoDecoder>, DecodeError> {
        match &self.video {
            Some(factory) => factory(info),
            None => Err(DecodeError::Unsupported(info.codec.clone())),
        }
    }

    fn create_audio_decoder(&self, info: &AudioInfo) -> Result<Box<dyn AudioDecoder>, DecodeError> {
        if is_pcm(info.codec) {
            return Ok(Box::new(PcmStreamDecoder::new(info)?));
        }
        match &self.audio {
            Some(factory) => factory(info),
            None => Err(DecodeError::Unsupported(format!("{:?}", info.codec))),
        }
    }

    fn create_sound_decoder(&self, info: &SoundInfo) -> Result<Box<dyn SoundDecoder>, DecodeError> {
        if is_pcm(info.codec) {
            return Ok(Box::new(PcmDecoder::new(info)?));
        }
        match &self.sound {
            Some(factory) => factory(info),
            None => Err(DecodeError::Unsupported(format!("{:?}", info.codec))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::stream_info::StreamKind;

    fn pcm_stream() -> AudioInfo {
        AudioInfo {
            codec: AudioCodec::Uncompressed,
            sample_rate: 44_100,
            sample_size: 2,
            stereo: true,
            duration: 0,
        }
    }

    #[test]
    fn test_pcm_stream_decodes_whole_frame() {
        let handler = DefaultMediaHandler::new();
        let mut decoder = handler.create_audio_decoder(&pcm_stream()).unwrap();
        // Larger than one internal decode step
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 7) as u8).collect();
        let chunk = decoder
            .decode(EncodedFrame::new(StreamKind::Audio, 40, data))
            .unwrap();
        assert_eq!(chunk.timestamp, 40);
        assert_eq!(chunk.samples.len(), 10_000);
    }

    #[test]
    fn test_unregistered_codecs_are_unsupported() {
        let handler = DefaultMediaHandler::new();
        let mp3 = AudioInfo {
            codec: AudioCodec::Mp3,
            ..pcm_stream()
        };
        assert!(matches!(
            handler.create_audio_decoder(&mp3),
            Err(DecodeError::Unsupported(_))
        ));
        let video = VideoInfo {
            codec: "vp6".to_string(),
            width: 320,
            height: 240,
            frame_rate: 25,
            duration: 0,
        };
        assert!(matches!(
            handler.create_video_decoder(&video),
            Err(DecodeError::Unsupported(_))
        ));
    }

    #[test]
    fn test_registered_factory_is_used() {
        let handler = DefaultMediaHandler::new().with_audio_decoder(Box::new(
            |_: &AudioInfo| -> Result<Box<dyn AudioDecoder>, DecodeError> {
                Err(DecodeError::Resource("no slots".to_string()))
            },
        ));
        let aac = AudioInfo {
            codec: AudioCodec::Aac,
            ..pcm_stream()
        };
        assert!(matches!(
            handler.create_audio_decoder(&aac),
            Err(DecodeError::Resource(_))
        ));
    }
}
