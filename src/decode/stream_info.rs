//! Stream metadata reported by parsers and attached to sounds.

use crate::core::time::Millis;

/// Which elementary stream a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Audio,
    Video,
}

/// Audio codec identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    /// Native-endian PCM
    Raw,
    /// Little-endian PCM
    Uncompressed,
    Adpcm,
    Mp3,
    Nellymoser,
    Aac,
    Speex,
}

/// Information about an audio stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInfo {
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub sample_size: u8, // bytes per sample: 1 or 2
    pub stereo: bool,
    pub duration: Millis,
}

/// Information about a video stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u16,
    pub duration: Millis,
}

/// Format description of an event sound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundInfo {
    pub codec: AudioCodec,
    pub stereo: bool,
    pub sample_rate: u32,
    pub sample_count: u32, // per channel, at `sample_rate`
    pub is_16bit: bool,
}

impl SoundInfo {
    pub fn new(
        codec: AudioCodec,
        stereo: bool,
        sample_rate: u32,
        sample_count: u32,
        is_16bit: bool,
    ) -> Self {
        Self {
            codec,
            stereo,
            sample_rate,
            sample_count,
            is_16bit,
        }
    }

    /// Duration in milliseconds, 0 when unknown
    pub fn duration(&self) -> Millis {
        if self.sample_count == 0 || self.sample_rate == 0 {
            return 0;
        }
        let count = self.sample_count as u64;
        let rate = self.sample_rate as u64;
        count / rate * 1000 + (count % rate) * 1000 / rate
    }
}

impl From<&AudioInfo> for SoundInfo {
    fn from(info: &AudioInfo) -> Self {
        Self {
            codec: info.codec,
            stereo: info.stereo,
            sample_rate: info.sample_rate,
            sample_count: 0,
            is_16bit: info.sample_size == 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sound_duration() {
        let info = SoundInfo::new(AudioCodec::Uncompressed, false, 22_050, 33_075, true);
        assert_eq!(info.duration(), 1_500);
    }

    #[test]
    fn test_unknown_duration() {
        let info = SoundInfo::new(AudioCodec::Raw, true, 0, 100, true);
        assert_eq!(info.duration(), 0);
    }
}
