//! Core timing types: millisecond time, virtual clocks and the playhead.

pub mod clock;
pub mod playhead;
pub mod time;

pub use clock::{InterruptableClock, ManualClock, SystemClock, VirtualClock};
pub use playhead::{Consumers, PlayHead, PlaybackStatus};
pub use time::Millis;
