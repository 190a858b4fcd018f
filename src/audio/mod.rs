pub mod buffer;
pub mod envelope;
pub mod mixer;
pub mod player;
pub mod voice;

pub use envelope::SoundEnvelope;
pub use mixer::{
    AudioOutput, AudioSource, Mixer, MixerError, MixerStats, SoundId, SourceId, VoiceHandle,
    VoiceParams,
};
pub use player::{AudioDevice, AudioError};
