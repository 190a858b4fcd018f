//! Volume envelopes for sound voices.
//!
//! An envelope is an ordered list of points, each giving left/right gain at a
//! frame position (44100 Hz frames from the start of the current pass). Gain
//! is interpolated linearly between consecutive points and held after the
//! last one. Frames before the first point are not touched.

/// Gain value meaning "unchanged"
pub const UNITY_LEVEL: u32 = 32_768;

/// One envelope point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundEnvelope {
    /// Position in 44100 Hz frames
    pub mark44: u32,
    /// Left gain, 0..=32768
    pub level_left: u32,
    /// Right gain, 0..=32768
    pub level_right: u32,
}

impl SoundEnvelope {
    pub fn new(mark44: u32, level_left: u32, level_right: u32) -> Self {
        Self {
            mark44,
            level_left,
            level_right,
        }
    }
}

/// Left/right gain at `frame` while `current` is the active point
fn gain_at(envelopes: &[SoundEnvelope], current: usize, frame: u64) -> (f32, f32) {
    let here = envelopes[current];
    let left = here.level_left as f32;
    let right = here.level_right as f32;

    let Some(next) = envelopes.get(current + 1) else {
        return (left / UNITY_LEVEL as f32, right / UNITY_LEVEL as f32);
    };

    let span = next.mark44.saturating_sub(here.mark44) as f32;
    if span == 0.0 {
        return (left / UNITY_LEVEL as f32, right / UNITY_LEVEL as f32);
    }
    let t = ((frame.saturating_sub(here.mark44 as u64)) as f32 / span).min(1.0);
    let l = left + (next.level_left as f32 - left) * t;
    let r = right + (next.level_right as f32 - right) * t;
    (l / UNITY_LEVEL as f32, r / UNITY_LEVEL as f32)
}

/// Apply envelope gains to interleaved stereo `samples` whose first frame is
/// `start_frame`. `current` is the active point index; it only ever moves
/// forward, switching as soon as a frame reaches the next point's mark.
pub fn apply_envelopes(
    envelopes: &[SoundEnvelope],
    current: &mut usize,
    samples: &mut [i16],
    start_frame: u64,
) {
    let Some(first) = envelopes.first() else {
        return;
    };
    let first_mark = first.mark44 as u64;

    for (i, frame) in samples.chunks_exact_mut(2).enumerate() {
        let position = start_frame + i as u64;
        if position < first_mark {
            continue;
        }
        while *current + 1 < envelopes.len() && envelopes[*current + 1].mark44 as u64 <= position {
            *current += 1;
        }

        let (left, right) = gain_at(envelopes, *current, position);
        frame[0] = (frame[0] as f32 * left) as i16;
        frame[1] = (frame[1] as f32 * right) as i16;
    }
}
