//! Logical playback position driven by a virtual clock.
//!
//! The playhead only moves once every available consumer (audio, video) has
//! consumed the current position, so neither stream can race ahead of what
//! was actually rendered or played.

use std::sync::Arc;

use crate::core::clock::VirtualClock;
use crate::core::time::Millis;

/// Playhead state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
}

/// Bitmask over the playhead consumers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Consumers(u8);

impl Consumers {
    pub const NONE: Consumers = Consumers(0);
    pub const VIDEO: Consumers = Consumers(1);
    pub const AUDIO: Consumers = Consumers(1 << 1);

    pub fn contains(self, other: Consumers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Consumers) {
        self.0 |= other.0;
    }

    pub fn intersection(self, other: Consumers) -> Consumers {
        Consumers(self.0 & other.0)
    }
}

/// Maps a virtual clock onto a media position.
///
/// Invariant while playing: `clock.elapsed() - clock_offset == position`
/// as of the last advance.
pub struct PlayHead {
    clock: Arc<dyn VirtualClock>,
    position: Millis,
    state: PlaybackStatus,
    available: Consumers,
    consumed: Consumers,
    /// Signed: seeking ahead of the clock makes it negative
    clock_offset: i64,
}

impl PlayHead {
    /// Create a paused playhead at position zero with no consumers
    pub fn new(clock: Arc<dyn VirtualClock>) -> Self {
        let clock_offset = clock.elapsed() as i64;
        Self {
            clock,
            position: 0,
            state: PlaybackStatus::Paused,
            available: Consumers::NONE,
            consumed: Consumers::NONE,
            clock_offset,
        }
    }

    /// Declare which consumers exist and rewind to zero
    pub fn init(&mut self, has_video: bool, has_audio: bool) {
        self.available = Consumers::NONE;
        if has_video {
            self.available.insert(Consumers::VIDEO);
        }
        if has_audio {
            self.available.insert(Consumers::AUDIO);
        }
        self.position = 0;
        self.consumed = Consumers::NONE;
        self.clock_offset = self.clock.elapsed() as i64;
    }

    pub fn position(&self) -> Millis {
        self.position
    }

    pub fn state(&self) -> PlaybackStatus {
        self.state
    }

    pub fn available_consumers(&self) -> Consumers {
        self.available
    }

    /// Change state, returning the previous one.
    ///
    /// Going from paused to playing re-anchors the clock offset on the
    /// current position, so playback resumes exactly where it stopped.
    pub fn set_state(&mut self, new_state: PlaybackStatus) -> PlaybackStatus {
        let previous = self.state;
        if previous == new_state {
            return previous;
        }

        if new_state == PlaybackStatus::Playing {
            self.clock_offset = self.clock.elapsed() as i64 - self.position as i64;
        }
        self.state = new_state;
        previous
    }

    pub fn toggle_state(&mut self) -> PlaybackStatus {
        match self.state {
            PlaybackStatus::Paused => self.set_state(PlaybackStatus::Playing),
            PlaybackStatus::Playing => self.set_state(PlaybackStatus::Paused),
        }
    }

    pub fn is_video_consumed(&self) -> bool {
        self.consumed.contains(Consumers::VIDEO)
    }

    pub fn is_audio_consumed(&self) -> bool {
        self.consumed.contains(Consumers::AUDIO)
    }

    pub fn set_video_consumed(&mut self) {
        self.consumed.insert(Consumers::VIDEO);
        self.advance_if_consumed();
    }

    pub fn set_audio_consumed(&mut self) {
        self.consumed.insert(Consumers::AUDIO);
        self.advance_if_consumed();
    }

    /// Hot-plug a video consumer (first video info seen)
    pub fn set_video_consumer_available(&mut self) {
        self.available.insert(Consumers::VIDEO);
    }

    /// Hot-plug an audio consumer (first audio info seen)
    pub fn set_audio_consumer_available(&mut self) {
        self.available.insert(Consumers::AUDIO);
    }

    /// Move the position to the clock time if every available consumer has
    /// consumed the current one. No-op while paused.
    pub fn advance_if_consumed(&mut self) {
        if self.consumed.intersection(self.available) != self.available {
            return;
        }
        if self.state == PlaybackStatus::Paused {
            return;
        }

        let now = self.clock.elapsed() as i64;
        let next = (now - self.clock_offset).max(0) as Millis;
        self.position = self.position.max(next);
        self.consumed = Consumers::NONE;
    }

    /// Jump to `position`, clearing the consumed flags
    pub fn seek_to(&mut self, position: Millis) {
        let now = self.clock.elapsed() as i64;
        self.position = position;
        self.clock_offset = now - position as i64;
        self.consumed = Consumers::NONE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;

    fn playhead(has_video: bool, has_audio: bool) -> (Arc<ManualClock>, PlayHead) {
        let clock = Arc::new(ManualClock::new());
        let mut head = PlayHead::new(clock.clone());
        head.init(has_video, has_audio);
        head.set_state(PlaybackStatus::Playing);
        (clock, head)
    }

    #[test]
    fn test_advances_only_when_all_consumed() {
        let (clock, mut head) = playhead(true, true);
        clock.advance(100);

        head.set_video_consumed();
        assert_eq!(head.position(), 0);
        assert!(head.is_video_consumed());

        head.set_audio_consumed();
        assert_eq!(head.position(), 100);
        assert!(!head.is_video_consumed());
        assert!(!head.is_audio_consumed());
    }

    #[test]
    fn test_audio_only_consumer() {
        let (clock, mut head) = playhead(false, true);
        clock.advance(40);
        head.set_audio_consumed();
        assert_eq!(head.position(), 40);
    }

    #[test]
    fn test_position_monotonic() {
        let (clock, mut head) = playhead(true, true);
        let mut last = head.position();
        for i in 0..100u64 {
            clock.advance(i % 5);
            if i % 2 == 0 {
                head.set_video_consumed();
            } else {
                head.set_audio_consumed();
            }
            assert!(head.position() >= last);
            last = head.position();
        }
    }

    #[test]
    fn test_pause_resume_preserves_position() {
        let (clock, mut head) = playhead(false, true);
        clock.advance(250);
        head.set_audio_consumed();
        assert_eq!(head.position(), 250);

        assert_eq!(head.set_state(PlaybackStatus::Paused), PlaybackStatus::Playing);
        clock.advance(10_000);
        head.set_audio_consumed();
        assert_eq!(head.position(), 250);

        assert_eq!(head.set_state(PlaybackStatus::Playing), PlaybackStatus::Paused);
        head.advance_if_consumed();
        assert_eq!(head.position(), 250);

        clock.advance(20);
        head.set_audio_consumed();
        assert_eq!(head.position(), 270);
    }

    #[test]
    fn test_set_state_unchanged_is_noop() {
        let (_clock, mut head) = playhead(true, false);
        assert_eq!(head.set_state(PlaybackStatus::Playing), PlaybackStatus::Playing);
        assert_eq!(head.toggle_state(), PlaybackStatus::Playing);
        assert_eq!(head.state(), PlaybackStatus::Paused);
    }

    #[test]
    fn test_seek_postcondition() {
        let (clock, mut head) = playhead(true, true);
        clock.advance(500);
        head.set_video_consumed();
        head.seek_to(3_000);
        assert_eq!(head.position(), 3_000);
        assert!(!head.is_video_consumed());
        assert!(!head.is_audio_consumed());

        clock.advance(40);
        head.set_video_consumed();
        head.set_audio_consumed();
        assert_eq!(head.position(), 3_040);
    }

    #[test]
    fn test_hot_plug_consumer() {
        let clock = Arc::new(ManualClock::new());
        let mut head = PlayHead::new(clock.clone());
        head.set_state(PlaybackStatus::Playing);
        head.set_audio_consumer_available();
        clock.advance(30);
        head.advance_if_consumed();
        assert_eq!(head.position(), 0);
        head.set_audio_consumed();
        assert_eq!(head.position(), 30);
        assert!(head.available_consumers().contains(Consumers::AUDIO));
        assert!(!head.available_consumers().contains(Consumers::VIDEO));
    }
}
