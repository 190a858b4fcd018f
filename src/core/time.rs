//! Time representation for playback positions.
//! Media timestamps and clock readings are whole milliseconds (u64).

/// Time in milliseconds since the start of the media (or since a clock started)
pub type Millis = u64;

/// Time constants for conversions
pub mod constants {
    use super::Millis;

    pub const MILLIS_PER_SECOND: Millis = 1_000;

    /// Output sample rate of the mixer, in Hz
    pub const OUTPUT_SAMPLE_RATE: u32 = 44_100;

    /// Output channel count of the mixer (interleaved stereo)
    pub const OUTPUT_CHANNELS: usize = 2;
}

/// Convert seconds (f64) to milliseconds, truncating negative values to zero
#[inline]
pub fn from_seconds(seconds: f64) -> Millis {
    if seconds <= 0.0 {
        return 0;
    }
    (seconds * constants::MILLIS_PER_SECOND as f64) as Millis
}

/// Convert milliseconds to seconds (f64)
#[inline]
pub fn to_seconds(millis: Millis) -> f64 {
    millis as f64 / constants::MILLIS_PER_SECOND as f64
}

/// Convert a `Duration` to milliseconds
#[inline]
pub fn from_duration(duration: std::time::Duration) -> Millis {
    duration.as_millis() as Millis
}

/// Number of output frames (one sample per channel) covering `millis`.
/// Saturates instead of overflowing.
#[inline]
pub fn millis_to_frames(millis: Millis) -> u64 {
    millis.saturating_mul(constants::OUTPUT_SAMPLE_RATE as u64) / constants::MILLIS_PER_SECOND
}

/// Milliseconds covered by `frames` output frames (truncated, saturating)
#[inline]
pub fn frames_to_millis(frames: u64) -> Millis {
    frames.saturating_mul(constants::MILLIS_PER_SECOND) / constants::OUTPUT_SAMPLE_RATE as u64
}

/// Format time as HH:MM:SS.mmm
pub fn format_time(millis: Millis) -> String {
    let total_seconds = millis / constants::MILLIS_PER_SECOND;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let ms = millis % constants::MILLIS_PER_SECOND;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, ms)
}
