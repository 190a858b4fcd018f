//! Virtual clocks.
//!
//! A [`VirtualClock`] is a monotonic source of elapsed milliseconds. Two raw
//! sources are provided ([`SystemClock`] for wall time, [`ManualClock`] for
//! hosts and tests that drive time themselves) and [`InterruptableClock`]
//! wraps either one so playback time can be frozen while buffering without
//! losing its absolute position.
//!
//! # Thread Safety
//!
//! All clocks take `&self` and can be shared behind an `Arc`. Pause/resume on
//! an [`InterruptableClock`] is serialized with `elapsed()` reads, so a read
//! racing a pause or resume never observes time moving backward.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::core::time::{self, Millis};

/// Monotonic source of elapsed time
pub trait VirtualClock: Send + Sync {
    /// Milliseconds elapsed since the clock started. Never decreases.
    fn elapsed(&self) -> Millis;
}

/// Wall clock measuring time since construction
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualClock for SystemClock {
    fn elapsed(&self) -> Millis {
        time::from_duration(self.start.elapsed())
    }
}

/// Clock that only moves when told to
#[derive(Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `millis`
    pub fn advance(&self, millis: Millis) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    /// Move the clock to `millis`; earlier values are ignored
    pub fn set(&self, millis: Millis) {
        self.now.fetch_max(millis, Ordering::SeqCst);
    }
}

impl VirtualClock for ManualClock {
    fn elapsed(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

struct InterruptState {
    paused: bool,
    /// Source time that does not count (time spent paused, plus the start)
    offset: Millis,
    /// Our elapsed value at the moment of pausing
    frozen: Millis,
}

/// Clock that can be paused and resumed on top of another clock.
///
/// Invariant: while paused, `elapsed()` does not advance; after `resume()`
/// it continues from exactly the value it had when paused.
///
/// The clock starts paused at zero.
pub struct InterruptableClock {
    source: Arc<dyn VirtualClock>,
    state: Mutex<InterruptState>,
}

impl InterruptableClock {
    pub fn new(source: Arc<dyn VirtualClock>) -> Self {
        let offset = source.elapsed();
        Self {
            source,
            state: Mutex::new(InterruptState {
                paused: true,
                offset,
                frozen: 0,
            }),
        }
    }

    /// Freeze the clock. Returns `false` if it was already paused.
    pub fn pause(&self) -> bool {
        let mut state = self.state.lock();
        if state.paused {
            return false;
        }
        state.frozen = self.source.elapsed().saturating_sub(state.offset);
        state.paused = true;
        true
    }

    /// Unfreeze the clock. Returns `false` if it was already running.
    pub fn resume(&self) -> bool {
        let mut state = self.state.lock();
        if !state.paused {
            return false;
        }
        state.offset = self.source.elapsed().saturating_sub(state.frozen);
        state.paused = false;
        true
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }
}

impl VirtualClock for InterruptableClock {
    fn elapsed(&self) -> Millis {
        let state = self.state.lock();
        if state.paused {
            state.frozen
        } else {
            self.source.elapsed().saturating_sub(state.offset)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interruptable() -> (Arc<ManualClock>, InterruptableClock) {
        let source = Arc::new(ManualClock::new());
        let clock = InterruptableClock::new(source.clone());
        (source, clock)
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        assert_eq!(clock.elapsed(), 0);
        clock.advance(40);
        clock.advance(10);
        assert_eq!(clock.elapsed(), 50);
        clock.set(20);
        assert_eq!(clock.elapsed(), 50);
        clock.set(70);
        assert_eq!(clock.elapsed(), 70);
    }

    #[test]
    fn test_interruptable_starts_paused() {
        let (source, clock) = interruptable();
        assert!(clock.is_paused());
        source.advance(100);
        assert_eq!(clock.elapsed(), 0);
    }

    #[test]
    fn test_pause_freezes_and_resume_continues() {
        let (source, clock) = interruptable();
        source.advance(500);
        assert!(clock.resume());
        source.advance(120);
        assert_eq!(clock.elapsed(), 120);

        assert!(clock.pause());
        source.advance(1_000);
        assert_eq!(clock.elapsed(), 120);

        assert!(clock.resume());
        assert_eq!(clock.elapsed(), 120);
        source.advance(30);
        assert_eq!(clock.elapsed(), 150);
    }

    #[test]
    fn test_pause_resume_idempotent() {
        let (source, clock) = interruptable();
        assert!(!clock.pause());
        assert!(clock.resume());
        assert!(!clock.resume());
        source.advance(10);
        assert!(clock.pause());
        assert!(!clock.pause());
        assert_eq!(clock.elapsed(), 10);
    }

    #[test]
    fn test_never_moves_backward_across_cycles() {
        let (source, clock) = interruptable();
        let mut last = 0;
        for step in 0..50u64 {
            source.advance(step % 7);
            if step % 3 == 0 {
                clock.pause();
            } else {
                clock.resume();
            }
            let now = clock.elapsed();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.elapsed();
        let b = clock.elapsed();
        assert!(b >= a);
    }
}
