//! The sound handler: mixes event-sound voices and attached audio sources
//! into the output buffer requested by the audio device.
//!
//! [`Mixer::fill`] runs on the device's real-time thread. It never waits for
//! the lock: if another thread holds it the buffer is left silent.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio::buffer;
use crate::audio::envelope::SoundEnvelope;
use crate::audio::voice::{SoundData, Voice};
use crate::config::MixerConfig;
use crate::core::time::Millis;
use crate::decode::decoder::{DecodeError, MediaHandler};
use crate::decode::stream_info::SoundInfo;

/// Error type for sound handler operations
#[derive(Debug, thiserror::Error)]
pub enum MixerError {
    #[error("unknown sound {0:?}")]
    UnknownSound(SoundId),
    #[error("cannot create sound decoder: {0}")]
    Decode(#[from] DecodeError),
}

/// Index of a sound resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundId(usize);

/// One playing voice of a sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceHandle {
    pub sound: SoundId,
    voice: u64,
}

/// Registration of an attached audio source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

/// Producer of interleaved stereo i16 samples at the output rate.
pub trait AudioSource: Send {
    /// Write into `out`, which arrives zeroed. Return `false` to be detached.
    fn fill(&mut self, out: &mut [i16]) -> bool;
}

/// Something audio sources can be plugged into
pub trait AudioOutput: Send + Sync {
    fn attach(&self, source: Box<dyn AudioSource>) -> SourceId;

    /// Unplug a source. No `fill` call on it happens after this returns.
    fn detach(&self, id: SourceId) -> Option<Box<dyn AudioSource>>;
}

/// Parameters of a new voice
#[derive(Debug, Clone, Default)]
pub struct VoiceParams {
    /// Extra passes after the first; negative loops forever
    pub loops: i32,
    /// In-point, applied on every pass
    pub offset_ms: Millis,
    /// Additional skip on the first pass only. A non-zero value marks a
    /// stream-block voice, which is not started if the sound is playing.
    pub start_position_ms: Millis,
    pub envelope: Option<Vec<SoundEnvelope>>,
}

/// Voice lifetime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixerStats {
    pub voices_started: u64,
    pub voices_stopped: u64,
}

struct MixerState {
    sounds: Vec<Option<SoundData>>,
    sources: Vec<(SourceId, Box<dyn AudioSource>)>,
    next_source: u64,
    next_voice: u64,
    global_volume: i32,
    muted: bool,
    paused: bool,
    stats: MixerStats,
    scratch: Vec<i16>,
}

impl MixerState {
    fn sound(&self, id: SoundId) -> Result<&SoundData, MixerError> {
        self.sounds
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(MixerError::UnknownSound(id))
    }

    fn sound_mut(&mut self, id: SoundId) -> Result<&mut SoundData, MixerError> {
        self.sounds
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(MixerError::UnknownSound(id))
    }

    fn stop_voices(&mut self, id: SoundId) -> Result<(), MixerError> {
        let sound = self.sound_mut(id)?;
        let stopped = sound.voices.len() as u64;
        sound.voices.clear();
        self.stats.voices_stopped += stopped;
        Ok(())
    }

    fn mix(&mut self, out: &mut [i16]) {
        if self.paused {
            return;
        }
        let MixerState {
            sounds,
            sources,
            global_volume,
            muted,
            stats,
            scratch,
            ..
        } = self;

        sources.retain_mut(|(id, source)| {
            scratch.clear();
            scratch.resize(out.len(), 0);
            let keep = source.fill(scratch);
            buffer::apply_volume(scratch, buffer::FULL_VOLUME, *global_volume);
            buffer::mix_into(out, scratch);
            if !keep {
                log::debug!("audio source {:?} finished, detaching", id);
            }
            keep
        });

        for sound in sounds.iter_mut().flatten() {
            stats.voices_stopped += sound.mix(out, *global_volume) as u64;
        }

        if *muted {
            out.fill(0);
        }
    }
}

/// Shared handle to the mixer
#[derive(Clone)]
pub struct Mixer {
    state: Arc<Mutex<MixerState>>,
    handler: Arc<dyn MediaHandler>,
}

impl Mixer {
    pub fn new(handler: Arc<dyn MediaHandler>, config: &MixerConfig) -> Self {
        let state = MixerState {
            sounds: Vec::new(),
            sources: Vec::new(),
            next_source: 0,
            next_voice: 0,
            global_volume: config.global_volume.clamp(0, 100),
            muted: config.start_muted,
            paused: false,
            stats: MixerStats::default(),
            scratch: Vec::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            handler,
        }
    }

    /// Register an encoded sound
    pub fn create_sound(&self, data: Vec<u8>, info: SoundInfo) -> SoundId {
        let mut state = self.state.lock();
        state.sounds.push(Some(SoundData::new(data, info)));
        SoundId(state.sounds.len() - 1)
    }

    /// Append encoded bytes to a streaming sound
    pub fn append_sound_data(&self, id: SoundId, bytes: &[u8]) -> Result<(), MixerError> {
        self.state.lock().sound_mut(id)?.append(bytes);
        Ok(())
    }

    /// Start a voice. `Ok(None)` means a stream-block voice was skipped
    /// because the sound is already playing.
    pub fn create_voice(
        &self,
        id: SoundId,
        params: VoiceParams,
    ) -> Result<Option<VoiceHandle>, MixerError> {
        let mut state = self.state.lock();
        let sound = state.sound(id)?;
        if params.start_position_ms > 0 && sound.is_playing() {
            return Ok(None);
        }
        let decoder = self.handler.create_sound_decoder(&sound.info)?;

        let voice_id = state.next_voice;
        state.next_voice += 1;
        let envelopes = params.envelope.map(Arc::from);
        let voice = Voice::new(
            voice_id,
            decoder,
            params.loops,
            params.offset_ms,
            params.start_position_ms,
            envelopes,
        );
        state.sound_mut(id)?.voices.push(voice);
        state.stats.voices_started += 1;
        log::debug!("started voice {} of sound {:?} (loops {})", voice_id, id, params.loops);

        Ok(Some(VoiceHandle {
            sound: id,
            voice: voice_id,
        }))
    }

    /// Stop one voice. Returns `false` if it had already ended.
    pub fn stop_voice(&self, handle: VoiceHandle) -> bool {
        let mut state = self.state.lock();
        let Ok(sound) = state.sound_mut(handle.sound) else {
            return false;
        };
        let before = sound.voices.len();
        sound.voices.retain(|voice| voice.id() != handle.voice);
        let stopped = before != sound.voices.len();
        if stopped {
            state.stats.voices_stopped += 1;
        }
        stopped
    }

    /// Stop every voice of a sound
    pub fn stop_sound(&self, id: SoundId) -> Result<(), MixerError> {
        self.state.lock().stop_voices(id)
    }

    pub fn stop_all_sounds(&self) {
        let mut state = self.state.lock();
        let mut stopped = 0;
        for sound in state.sounds.iter_mut().flatten() {
            stopped += sound.voices.len() as u64;
            sound.voices.clear();
        }
        state.stats.voices_stopped += stopped;
    }

    /// Stop a sound's voices and release its data
    pub fn delete_sound(&self, id: SoundId) -> Result<(), MixerError> {
        let mut state = self.state.lock();
        state.stop_voices(id)?;
        state.sounds[id.0] = None;
        Ok(())
    }

    /// Release every sound. Slots are emptied, not reused, so old ids stay
    /// invalid instead of naming newer sounds.
    pub fn delete_all_sounds(&self) {
        self.stop_all_sounds();
        let mut state = self.state.lock();
        for slot in state.sounds.iter_mut() {
            *slot = None;
        }
    }

    /// Stop all sounds. Attached sources stay attached.
    pub fn reset(&self) {
        self.stop_all_sounds();
    }

    /// Set a sound's volume, clamped to 0..=100
    pub fn set_volume(&self, id: SoundId, volume: i32) -> Result<(), MixerError> {
        self.state.lock().sound_mut(id)?.volume = volume.clamp(0, buffer::FULL_VOLUME);
        Ok(())
    }

    pub fn volume(&self, id: SoundId) -> Result<i32, MixerError> {
        Ok(self.state.lock().sound(id)?.volume)
    }

    pub fn set_global_volume(&self, volume: i32) {
        self.state.lock().global_volume = volume.clamp(0, buffer::FULL_VOLUME);
    }

    pub fn global_volume(&self) -> i32 {
        self.state.lock().global_volume
    }

    pub fn mute(&self) {
        self.state.lock().muted = true;
    }

    pub fn unmute(&self) {
        self.state.lock().muted = false;
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    /// Stop producing output; voices keep their positions
    pub fn pause(&self) {
        self.state.lock().paused = true;
    }

    pub fn resume(&self) {
        self.state.lock().paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Duration of a sound, 0 when its sample count is unknown
    pub fn duration_ms(&self, id: SoundId) -> Result<Millis, MixerError> {
        Ok(self.state.lock().sound(id)?.info.duration())
    }

    /// Position of the sound's first playing voice, 0 when silent
    pub fn position_ms(&self, id: SoundId) -> Result<Millis, MixerError> {
        let state = self.state.lock();
        let sound = state.sound(id)?;
        Ok(sound.voices.first().map(Voice::position_ms).unwrap_or(0))
    }

    pub fn is_sound_playing(&self, id: SoundId) -> bool {
        self.state
            .lock()
            .sound(id)
            .map(SoundData::is_playing)
            .unwrap_or(false)
    }

    /// Number of attached audio sources
    pub fn source_count(&self) -> usize {
        self.state.lock().sources.len()
    }

    pub fn stats(&self) -> MixerStats {
        self.state.lock().stats
    }

    /// Audio device entry point: overwrite `out` with the next mixed samples
    pub fn fill(&self, out: &mut [i16]) {
        out.fill(0);
        let Some(mut state) = self.state.try_lock() else {
            log::trace!("mixer busy, emitting {} samples of silence", out.len());
            return;
        };
        state.mix(out);
    }
}

impl AudioOutput for Mixer {
    fn attach(&self, source: Box<dyn AudioSource>) -> SourceId {
        let mut state = self.state.lock();
        let id = SourceId(state.next_source);
        state.next_source += 1;
        state.sources.push((id, source));
        log::debug!("attached audio source {:?}", id);
        id
    }

    fn detach(&self, id: SourceId) -> Option<Box<dyn AudioSource>> {
        let mut state = self.state.lock();
        let index = state.sources.iter().position(|(source_id, _)| *source_id == id)?;
        log::debug!("detached audio source {:?}", id);
        Some(state.sources.remove(index).1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::handler::DefaultMediaHandler;
    use crate::decode::stream_info::AudioCodec;

    fn mixer() -> Mixer {
        Mixer::new(Arc::new(DefaultMediaHandler::new()), &MixerConfig::default())
    }

    fn info() -> SoundInfo {
        SoundInfo::new(AudioCodec::Uncompressed, true, 44_100, 0, true)
    }

    fn constant(value: i16, frames: usize) -> Vec<u8> {
        std::iter::repeat(value)
            .take(frames * 2)
            .flat_map(|s| s.to_le_bytes())
            .collect()
    }

    fn play(mixer: &Mixer, sound: SoundId, loops: i32) -> VoiceHandle {
        let params = VoiceParams {
            loops,
            ..Default::default()
        };
        mixer.create_voice(sound, params).unwrap().unwrap()
    }

    struct Constant(i16);

    impl AudioSource for Constant {
        fn fill(&mut self, out: &mut [i16]) -> bool {
            out.fill(self.0);
            true
        }
    }

    #[test]
    fn test_voices_are_additive() {
        let mixer = mixer();
        let a = mixer.create_sound(constant(1_000, 64), info());
        let b = mixer.create_sound(constant(234, 64), info());
        play(&mixer, a, 0);
        play(&mixer, b, 0);
        let mut out = vec![0i16; 64];
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 1_234));
    }

    #[test]
    fn test_mix_clips_at_range() {
        let mixer = mixer();
        let a = mixer.create_sound(constant(30_000, 8), info());
        let b = mixer.create_sound(constant(30_000, 8), info());
        play(&mixer, a, 0);
        play(&mixer, b, 0);
        let mut out = vec![0i16; 16];
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == i16::MAX));
    }

    #[test]
    fn test_half_volume_truncates() {
        let mixer = mixer();
        let sound = mixer.create_sound(constant(201, 8), info());
        mixer.set_volume(sound, 50).unwrap();
        play(&mixer, sound, 0);
        let mut out = vec![0i16; 16];
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 100));
        assert_eq!(mixer.volume(sound).unwrap(), 50);
    }

    #[test]
    fn test_loop_count_drains() {
        let mixer = mixer();
        let sound = mixer.create_sound(constant(7, 8), info());
        play(&mixer, sound, 2);
        // One pass per call: 8 frames = 16 samples
        for _ in 0..3 {
            let mut out = vec![0i16; 16];
            mixer.fill(&mut out);
            assert!(out.iter().all(|&s| s == 7));
        }
        assert!(!mixer.is_sound_playing(sound));
        assert_eq!(mixer.stats().voices_stopped, 1);
    }

    #[test]
    fn test_infinite_loop_keeps_playing() {
        let mixer = mixer();
        let sound = mixer.create_sound(constant(7, 8), info());
        play(&mixer, sound, -1);
        for _ in 0..10 {
            let mut out = vec![0i16; 16];
            mixer.fill(&mut out);
        }
        assert!(mixer.is_sound_playing(sound));
    }

    #[test]
    fn test_mute_zeroes_output_but_voices_advance() {
        let mixer = mixer();
        let sound = mixer.create_sound(constant(500, 8), info());
        play(&mixer, sound, 0);
        mixer.mute();
        let mut out = vec![0i16; 8];
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0));
        mixer.unmute();
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 500));
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_stream_block_voice_skipped_while_playing() {
        let mixer = mixer();
        let sound = mixer.create_sound(constant(1, 441), info());
        play(&mixer, sound, 0);
        let params = VoiceParams {
            start_position_ms: 5,
            ..Default::default()
        };
        assert!(mixer.create_voice(sound, params).unwrap().is_none());
    }

    #[test]
    fn test_stop_and_delete() {
        let mixer = mixer();
        let sound = mixer.create_sound(constant(1, 100), info());
        let handle = play(&mixer, sound, -1);
        assert!(mixer.stop_voice(handle));
        assert!(!mixer.stop_voice(handle));
        play(&mixer, sound, -1);
        mixer.delete_sound(sound).unwrap();
        assert!(matches!(mixer.volume(sound), Err(MixerError::UnknownSound(_))));
        assert_eq!(mixer.stats().voices_started, 2);
        assert_eq!(mixer.stats().voices_stopped, 2);
    }

    #[test]
    fn test_append_extends_playing_sound() {
        let mixer = mixer();
        let sound = mixer.create_sound(constant(300, 32), info());
        play(&mixer, sound, 0);
        let mut out = vec![0i16; 32];
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 300));

        mixer.append_sound_data(sound, &constant(300, 32)).unwrap();
        let mut out = vec![0i16; 96];
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 300));
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0));
        assert!(!mixer.is_sound_playing(sound));
    }

    #[test]
    fn test_stop_all_and_delete_all_silence_output() {
        let mixer = mixer();
        let a = mixer.create_sound(constant(10, 100), info());
        let b = mixer.create_sound(constant(20, 100), info());
        play(&mixer, a, -1);
        play(&mixer, b, -1);
        mixer.stop_all_sounds();
        let mut out = vec![0i16; 16];
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0));
        assert_eq!(mixer.stats().voices_stopped, 2);

        play(&mixer, a, -1);
        mixer.delete_all_sounds();
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0));
        assert!(matches!(mixer.volume(a), Err(MixerError::UnknownSound(_))));
        assert!(matches!(mixer.volume(b), Err(MixerError::UnknownSound(_))));
    }

    #[test]
    fn test_ids_not_reused_after_delete_all() {
        let mixer = mixer();
        let old = mixer.create_sound(constant(10, 8), info());
        mixer.delete_all_sounds();
        let new = mixer.create_sound(constant(20, 8), info());
        assert_ne!(old, new);
        assert!(mixer.create_voice(old, VoiceParams::default()).is_err());
        assert_eq!(mixer.volume(new).unwrap(), 100);
    }

    #[test]
    fn test_reset_stops_voices_keeps_sources() {
        let mixer = mixer();
        let sound = mixer.create_sound(constant(10, 100), info());
        play(&mixer, sound, -1);
        mixer.attach(Box::new(Constant(3)));
        mixer.reset();
        let mut out = vec![0i16; 8];
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 3));
        assert!(!mixer.is_sound_playing(sound));
        assert_eq!(mixer.source_count(), 1);
    }

    #[test]
    fn test_paused_fill_is_silent_until_resume() {
        let mixer = mixer();
        let sound = mixer.create_sound(constant(500, 8), info());
        play(&mixer, sound, 0);
        mixer.pause();
        assert!(mixer.is_paused());
        let mut out = vec![0i16; 16];
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0));

        mixer.resume();
        // The voice did not move while paused
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 500));
    }

    #[test]
    fn test_sources_are_mixed_and_detached() {
        let mixer = mixer();
        let id = mixer.attach(Box::new(Constant(40)));
        mixer.set_global_volume(50);
        let mut out = vec![0i16; 8];
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 20));

        assert!(mixer.detach(id).is_some());
        assert!(mixer.detach(id).is_none());
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_contended_fill_is_silent() {
        let mixer = mixer();
        mixer.attach(Box::new(Constant(40)));
        let guard = mixer.state.lock();
        let mut out = vec![5i16; 8];
        mixer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0));
        drop(guard);
    }

    #[test]
    fn test_duration_and_position() {
        let mixer = mixer();
        let info = SoundInfo::new(AudioCodec::Uncompressed, true, 44_100, 44_100, true);
        let sound = mixer.create_sound(constant(1, 44_100), info);
        assert_eq!(mixer.duration_ms(sound).unwrap(), 1_000);
        play(&mixer, sound, 0);
        let mut out = vec![0i16; 4_410 * 2];
        mixer.fill(&mut out);
        assert_eq!(mixer.position_ms(sound).unwrap(), 100);
    }
}
