//! Streaming media playback: a clock-synchronized session that decodes
//! audio and video from a pull parser, and a software mixer that combines
//! session audio with event sounds for a single output device.

pub mod audio;
pub mod config;
pub mod core;
pub mod decode;
pub mod playback;

pub use audio::{AudioDevice, Mixer};
pub use config::Config;
pub use decode::{DefaultMediaHandler, MediaHandler, MediaParser};
pub use playback::{AdvanceDriver, MediaStream, StatusCode};
