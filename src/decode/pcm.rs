//! Built-in PCM sound decoder.
//!
//! Converts raw/uncompressed PCM (8-bit unsigned or 16-bit signed
//! little-endian, mono or stereo, any sample rate) into the mixer format:
//! 44100 Hz interleaved stereo i16. Rate conversion repeats or drops
//! samples (nearest neighbour), which is exact repetition for the
//! 5512/11025/22050 Hz rates sounds normally use.

use crate::core::time::constants::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::decode::decoder::{DecodeError, SoundDecoder, SoundOutput};
use crate::decode::stream_info::{AudioCodec, SoundInfo};

/// Input bytes decoded per call at most
const MAX_INPUT_BYTES: usize = 8192;

/// PCM to mixer-format converter
#[derive(Debug, Clone)]
pub struct PcmDecoder {
    stereo: bool,
    is_16bit: bool,
    sample_rate: u32,
}

impl PcmDecoder {
    pub fn new(info: &SoundInfo) -> Result<Self, DecodeError> {
        match info.codec {
            AudioCodec::Raw | AudioCodec::Uncompressed => {}
            other => return Err(DecodeError::Unsupported(format!("{:?}", other))),
        }
        if info.sample_rate == 0 {
            return Err(DecodeError::Unsupported("zero sample rate".to_string()));
        }
        Ok(Self {
            stereo: info.stereo,
            is_16bit: info.is_16bit,
            sample_rate: info.sample_rate,
        })
    }

    fn bytes_per_frame(&self) -> usize {
        let per_sample = if self.is_16bit { 2 } else { 1 };
        let channels = if self.stereo { 2 } else { 1 };
        per_sample * channels
    }

    fn read_sample(&self, bytes: &[u8]) -> i16 {
        if self.is_16bit {
            i16::from_le_bytes([bytes[0], bytes[1]])
        } else {
            (bytes[0] as i16 - 128) << 8
        }
    }

    /// Input frames to stereo frames at the input rate
    fn to_stereo(&self, input: &[u8]) -> Vec<[i16; 2]> {
        let per_sample = if self.is_16bit { 2 } else { 1 };
        input
            .chunks_exact(self.bytes_per_frame())
            .map(|frame| {
                let left = self.read_sample(frame);
                let right = if self.stereo {
                    self.read_sample(&frame[per_sample..])
                } else {
                    left
                };
                [left, right]
            })
            .collect()
    }
}

/// Nearest-neighbour rate conversion to the output rate
pub fn resample(frames: &[[i16; 2]], from_rate: u32) -> Vec<i16> {
    if from_rate == OUTPUT_SAMPLE_RATE {
        return frames.iter().flatten().copied().collect();
    }
    let out_frames = frames.len() as u64 * OUTPUT_SAMPLE_RATE as u64 / from_rate as u64;
    let mut out = Vec::with_capacity(out_frames as usize * OUTPUT_CHANNELS);
    for j in 0..out_frames {
        let src = (j * from_rate as u64 / OUTPUT_SAMPLE_RATE as u64) as usize;
        let frame = frames[src.min(frames.len() - 1)];
        out.extend_from_slice(&frame);
    }
    out
}

impl SoundDecoder for PcmDecoder {
    fn decode(&mut self, input: &[u8]) -> Result<SoundOutput, DecodeError> {
        let frame_bytes = self.bytes_per_frame();
        if input.len() < frame_bytes {
            // Trailing partial frame: swallow it so the caller reaches the end
            return Ok(SoundOutput {
                samples: Vec::new(),
                consumed: input.len(),
            });
        }

        let take = input.len().min(MAX_INPUT_BYTES) / frame_bytes * frame_bytes;
        let frames = self.to_stereo(&input[..take]);
        Ok(SoundOutput {
            samples: resample(&frames, self.sample_rate),
            consumed: take,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(stereo: bool, rate: u32, is_16bit: bool) -> SoundInfo {
        SoundInfo::new(AudioCodec::Uncompressed, stereo, rate, 0, is_16bit)
    }

    fn le(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_stereo_44k_passthrough() {
        let mut decoder = PcmDecoder::new(&info(true, 44_100, true)).unwrap();
        let out = decoder.decode(&le(&[1, -2, 3, -4])).unwrap();
        assert_eq!(out.samples, vec![1, -2, 3, -4]);
        assert_eq!(out.consumed, 8);
    }

    #[test]
    fn test_mono_22k_upsamples() {
        let mut decoder = PcmDecoder::new(&info(false, 22_050, true)).unwrap();
        let out = decoder.decode(&le(&[10, 20])).unwrap();
        assert_eq!(out.samples, vec![10, 10, 10, 10, 20, 20, 20, 20]);
    }

    #[test]
    fn test_8bit_unsigned() {
        let mut decoder = PcmDecoder::new(&info(false, 44_100, false)).unwrap();
        let out = decoder.decode(&[128, 255, 0]).unwrap();
        assert_eq!(out.samples, vec![0, 0, 127 << 8, 127 << 8, -128 << 8, -128 << 8]);
    }

    #[test]
    fn test_large_input_is_chunked() {
        let mut decoder = PcmDecoder::new(&info(true, 44_100, true)).unwrap();
        let input = vec![0u8; MAX_INPUT_BYTES * 2 + 4];
        let out = decoder.decode(&input).unwrap();
        assert_eq!(out.consumed, MAX_INPUT_BYTES);
        assert_eq!(out.samples.len(), MAX_INPUT_BYTES / 2);
    }

    #[test]
    fn test_partial_frame_is_swallowed() {
        let mut decoder = PcmDecoder::new(&info(true, 44_100, true)).unwrap();
        let out = decoder.decode(&[1, 2, 3]).unwrap();
        assert!(out.samples.is_empty());
        assert_eq!(out.consumed, 3);
    }

    #[test]
    fn test_rejects_compressed_codecs() {
        let mp3 = SoundInfo::new(AudioCodec::Mp3, true, 44_100, 0, true);
        assert!(matches!(PcmDecoder::new(&mp3), Err(DecodeError::Unsupported(_))));
    }
}
