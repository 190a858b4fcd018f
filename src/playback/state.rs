//! Decode/buffer state machine.
//!
//! All transitions go through [`DecodingMachine::apply`]. The machine only
//! decides; the session carries out the clock action and pushes the status.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::playback::status::StatusCode;

/// Decoding state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodingState {
    /// Nothing started yet
    None,
    /// Input finished, failed or closed
    Stopped,
    Decoding,
    /// Clock frozen until enough is decoded ahead
    Buffering,
}

impl DecodingState {
    fn to_u8(self) -> u8 {
        match self {
            DecodingState::None => 0,
            DecodingState::Stopped => 1,
            DecodingState::Decoding => 2,
            DecodingState::Buffering => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => DecodingState::Stopped,
            2 => DecodingState::Decoding,
            3 => DecodingState::Buffering,
            _ => DecodingState::None,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, DecodingState::Decoding | DecodingState::Buffering)
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodingEvent {
    /// Playback started on a new input
    Start,
    /// Seek accepted by the parser
    Seek,
    /// Nothing buffered ahead and more input is coming
    BufferLow,
    /// Buffer threshold reached or parsing complete
    BufferReady,
    /// Every stream exhausted and the audio queue drained
    InputExhausted,
    /// Input unplayable
    Fail,
    Close,
}

/// What the session must do to the playback clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockAction {
    None,
    Pause,
    Resume,
}

/// Outcome of an accepted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: DecodingState,
    pub to: DecodingState,
    pub status: Option<StatusCode>,
    pub clock: ClockAction,
}

/// Decoding state readable from any thread
#[derive(Debug)]
pub struct SharedDecodingState(AtomicU8);

impl SharedDecodingState {
    pub fn new(state: DecodingState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub fn get(&self) -> DecodingState {
        DecodingState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: DecodingState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }
}

/// How `pause` treats the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseMode {
    Toggle,
    Pause,
    Unpause,
}

/// Owner of the decoding state
#[derive(Debug)]
pub struct DecodingMachine {
    state: Arc<SharedDecodingState>,
}

impl Default for DecodingMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodingMachine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SharedDecodingState::new(DecodingState::None)),
        }
    }

    pub fn state(&self) -> DecodingState {
        self.state.get()
    }

    /// Handle for observers on other threads
    pub fn shared(&self) -> Arc<SharedDecodingState> {
        Arc::clone(&self.state)
    }

    /// Apply `event`. Returns `None` when the event means nothing in the
    /// current state.
    pub fn apply(&mut self, event: DecodingEvent) -> Option<Transition> {
        use DecodingState::*;

        let from = self.state();
        let (to, status, clock) = match (from, event) {
            (None | Stopped, DecodingEvent::Start) => {
                (Buffering, Some(StatusCode::PlayStart), ClockAction::Pause)
            }
            (Stopped | Decoding | Buffering, DecodingEvent::Seek) => {
                (Buffering, Some(StatusCode::SeekNotify), ClockAction::Pause)
            }
            (Decoding, DecodingEvent::BufferLow) => {
                (Buffering, Some(StatusCode::BufferEmpty), ClockAction::Pause)
            }
            (Buffering, DecodingEvent::BufferReady) => {
                (Decoding, Some(StatusCode::BufferFull), ClockAction::Resume)
            }
            (Decoding | Buffering, DecodingEvent::InputExhausted) => {
                (Stopped, Some(StatusCode::PlayStop), ClockAction::Pause)
            }
            (None | Decoding | Buffering, DecodingEvent::Fail) => {
                (Stopped, Some(StatusCode::StreamNotFound), ClockAction::Pause)
            }
            (Decoding | Buffering, DecodingEvent::Close) => {
                (Stopped, Option::None, ClockAction::Pause)
            }
            _ => return Option::None,
        };

        self.state.set(to);
        log::debug!("decoding state {:?} -> {:?} on {:?}", from, to, event);
        Some(Transition {
            from,
            to,
            status,
            clock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_enters_buffering() {
        let mut machine = DecodingMachine::new();
        let t = machine.apply(DecodingEvent::Start).unwrap();
        assert_eq!(t.to, DecodingState::Buffering);
        assert_eq!(t.status, Some(StatusCode::PlayStart));
        assert_eq!(t.clock, ClockAction::Pause);
        assert!(machine.apply(DecodingEvent::Start).is_none());
    }

    #[test]
    fn test_buffering_hysteresis() {
        let mut machine = DecodingMachine::new();
        machine.apply(DecodingEvent::Start);
        // Low-buffer reports while already buffering change nothing
        assert!(machine.apply(DecodingEvent::BufferLow).is_none());
        assert_eq!(machine.state(), DecodingState::Buffering);

        let t = machine.apply(DecodingEvent::BufferReady).unwrap();
        assert_eq!(t.to, DecodingState::Decoding);
        assert_eq!(t.clock, ClockAction::Resume);
        assert!(machine.apply(DecodingEvent::BufferReady).is_none());

        let t = machine.apply(DecodingEvent::BufferLow).unwrap();
        assert_eq!(t.status, Some(StatusCode::BufferEmpty));
        assert_eq!(machine.state(), DecodingState::Buffering);
    }

    #[test]
    fn test_exhaustion_stops() {
        let mut machine = DecodingMachine::new();
        machine.apply(DecodingEvent::Start);
        machine.apply(DecodingEvent::BufferReady);
        let t = machine.apply(DecodingEvent::InputExhausted).unwrap();
        assert_eq!(t.status, Some(StatusCode::PlayStop));
        assert_eq!(machine.state(), DecodingState::Stopped);
        assert!(machine.apply(DecodingEvent::InputExhausted).is_none());
        assert!(machine.apply(DecodingEvent::BufferLow).is_none());
    }

    #[test]
    fn test_seek_from_stopped_rebuffers() {
        let mut machine = DecodingMachine::new();
        assert!(machine.apply(DecodingEvent::Seek).is_none());
        machine.apply(DecodingEvent::Start);
        machine.apply(DecodingEvent::Fail);
        let t = machine.apply(DecodingEvent::Seek).unwrap();
        assert_eq!(t.from, DecodingState::Stopped);
        assert_eq!(t.to, DecodingState::Buffering);
    }

    #[test]
    fn test_shared_state_tracks_machine() {
        let mut machine = DecodingMachine::new();
        let shared = machine.shared();
        assert_eq!(shared.get(), DecodingState::None);
        machine.apply(DecodingEvent::Start);
        assert_eq!(shared.get(), DecodingState::Buffering);
        machine.apply(DecodingEvent::Close);
        assert_eq!(shared.get(), DecodingState::Stopped);
    }
}
