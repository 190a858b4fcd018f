//! Event sounds and their playing instances.
//!
//! A [`SoundData`] owns the encoded bytes of one sound resource and every
//! [`Voice`] currently playing it. Voices decode lazily from the shared
//! bytes while mixing, so a sound is only decoded as far as it is heard.

use std::sync::Arc;

use crate::audio::buffer;
use crate::audio::envelope::{apply_envelopes, SoundEnvelope};
use crate::core::time::{self, constants::OUTPUT_CHANNELS, Millis};
use crate::decode::decoder::SoundDecoder;
use crate::decode::stream_info::SoundInfo;

fn frames_to_samples(frames: u64) -> usize {
    usize::try_from(frames)
        .unwrap_or(usize::MAX)
        .saturating_mul(OUTPUT_CHANNELS)
}

/// One playing instance of a sound
pub struct Voice {
    id: u64,
    decoder: Box<dyn SoundDecoder>,
    /// Decode cursor into the encoded data
    position: usize,
    decoded: Vec<i16>,
    /// Play cursor into `decoded`
    raw_position: usize,
    /// Remaining extra passes; negative loops forever
    loop_count: i32,
    envelopes: Option<Arc<[SoundEnvelope]>>,
    current_env: usize,
    /// Frames output since the start of the current pass
    frames_played: u64,
    /// Samples dropped at the start of every pass
    in_point: usize,
    /// Samples still to drop before output resumes
    skip: usize,
    /// Whether the current pass produced anything audible
    pass_produced: bool,
    scratch: Vec<i16>,
}

impl Voice {
    pub fn new(
        id: u64,
        decoder: Box<dyn SoundDecoder>,
        loop_count: i32,
        offset: Millis,
        start_position: Millis,
        envelopes: Option<Arc<[SoundEnvelope]>>,
    ) -> Self {
        let in_point = frames_to_samples(time::millis_to_frames(offset));
        let start = frames_to_samples(time::millis_to_frames(start_position));
        Self {
            id,
            decoder,
            position: 0,
            decoded: Vec::new(),
            raw_position: 0,
            loop_count,
            envelopes,
            current_env: 0,
            frames_played: 0,
            in_point,
            skip: in_point.saturating_add(start),
            pass_produced: false,
            scratch: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn loop_count(&self) -> i32 {
        self.loop_count
    }

    /// Playback position within the current pass
    pub fn position_ms(&self) -> Millis {
        let in_point_frames = (self.in_point / OUTPUT_CHANNELS) as u64;
        time::frames_to_millis(self.frames_played + in_point_frames)
    }

    /// Whether every byte is decoded, every sample played and no loop remains
    pub fn is_finished(&self, data_len: usize) -> bool {
        self.position >= data_len && self.raw_position >= self.decoded.len() && self.loop_count == 0
    }

    /// Decode the next block, wrapping at a loop boundary.
    /// Returns `false` once the voice has nothing more to give.
    fn refill(&mut self, data: &[u8]) -> bool {
        if self.position >= data.len() {
            if self.loop_count == 0 || data.is_empty() {
                return false;
            }
            if !self.pass_produced {
                // A pass with no output would loop forever
                log::debug!("voice {} produced nothing in a full pass, stopping", self.id);
                self.loop_count = 0;
                return false;
            }
            if self.loop_count > 0 {
                self.loop_count -= 1;
            }
            self.position = 0;
            self.frames_played = 0;
            self.current_env = 0;
            self.skip = self.in_point;
            self.pass_produced = false;
        }

        let output = match self.decoder.decode(&data[self.position..]) {
            Ok(output) => output,
            Err(e) => {
                log::error!("voice {} decode failed: {}", self.id, e);
                self.end_here(data.len());
                return false;
            }
        };
        if output.consumed == 0 && output.samples.is_empty() {
            log::error!("voice {} decoder made no progress", self.id);
            self.end_here(data.len());
            return false;
        }

        self.position = (self.position + output.consumed).min(data.len());
        self.decoded = output.samples;
        let dropped = self.skip.min(self.decoded.len());
        self.skip -= dropped;
        self.raw_position = dropped;
        true
    }

    fn end_here(&mut self, data_len: usize) {
        self.position = data_len;
        self.decoded.clear();
        self.raw_position = 0;
        self.loop_count = 0;
    }

    /// Add this voice's next `out.len()` samples into `out`.
    /// Decodes more input whenever the decoded buffer runs dry.
    pub fn mix(&mut self, data: &[u8], out: &mut [i16], volume: i32, global_volume: i32) {
        let mut written = 0;
        while written < out.len() {
            if self.raw_position >= self.decoded.len() {
                if !self.refill(data) {
                    break;
                }
                continue;
            }

            let available = self.decoded.len() - self.raw_position;
            let n = available.min(out.len() - written);
            self.scratch.clear();
            self.scratch
                .extend_from_slice(&self.decoded[self.raw_position..self.raw_position + n]);

            match &self.envelopes {
                Some(envelopes) => apply_envelopes(
                    envelopes,
                    &mut self.current_env,
                    &mut self.scratch,
                    self.frames_played,
                ),
                None => buffer::apply_volume(&mut self.scratch, volume, global_volume),
            }
            buffer::mix_into(&mut out[written..written + n], &self.scratch);

            self.raw_position += n;
            self.frames_played += (n / OUTPUT_CHANNELS) as u64;
            self.pass_produced = true;
            written += n;
        }
    }
}

/// Encoded sound resource shared by its voices
pub struct SoundData {
    pub data: Vec<u8>,
    pub info: SoundInfo,
    /// Volume in percent
    pub volume: i32,
    pub voices: Vec<Voice>,
}

impl SoundData {
    pub fn new(data: Vec<u8>, info: SoundInfo) -> Self {
        Self {
            data,
            info,
            volume: buffer::FULL_VOLUME,
            voices: Vec::new(),
        }
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn is_playing(&self) -> bool {
        !self.voices.is_empty()
    }

    /// Mix every voice into `out`, then drop voices that have finished.
    /// Returns how many voices finished.
    pub fn mix(&mut self, out: &mut [i16], global_volume: i32) -> usize {
        let Self {
            data,
            volume,
            voices,
            ..
        } = self;
        for voice in voices.iter_mut() {
            voice.mix(data, out, *volume, global_volume);
        }

        let before = voices.len();
        voices.retain(|voice| !voice.is_finished(data.len()));
        before - voices.len()
    }
}
