pub mod driver;
pub mod queue;
pub mod state;
pub mod status;
pub mod stream;
pub mod video;

pub use driver::AdvanceDriver;
pub use queue::{AudioQueue, QueueSource};
pub use state::{DecodingEvent, DecodingMachine, DecodingState, PauseMode, SharedDecodingState};
pub use status::{StatusCode, StatusQueue};
pub use stream::{MediaStream, StreamError};
pub use video::VideoSlot;
