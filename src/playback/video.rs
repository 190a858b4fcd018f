//! Video frame selection and the single-frame display slot.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::core::time::Millis;
use crate::decode::decoder::{DecodeError, MediaParser, VideoDecoder, VideoFrame};
use crate::decode::stream_info::StreamKind;

/// Result of one selection pass
#[derive(Debug, Default)]
pub struct FrameSelection {
    pub frame: Option<VideoFrame>,
    pub decoded: u32,
    pub failed: u32,
}

/// Decode the frame that should be visible at `time`.
///
/// Every due frame is decoded, since later frames may depend on earlier
/// ones, but only the last due one is returned. A frame whose successor is
/// also due is never shown. Returns `Err` only for fatal decoder errors.
pub fn select_frame(
    parser: &mut dyn MediaParser,
    decoder: &mut dyn VideoDecoder,
    time: Millis,
) -> Result<FrameSelection, DecodeError> {
    let mut selection = FrameSelection::default();

    match parser.next_frame_timestamp(StreamKind::Video) {
        Some(ts) if ts <= time => {}
        _ => return Ok(selection),
    }

    loop {
        let Some(encoded) = parser.next_frame(StreamKind::Video) else {
            break;
        };
        let timestamp = encoded.timestamp;
        match decoder.decode(encoded) {
            Ok(frame) => {
                selection.decoded += 1;
                selection.frame = Some(frame);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::error!("video frame at {} ms failed to decode: {}", timestamp, e);
                selection.failed += 1;
            }
        }

        match parser.next_frame_timestamp(StreamKind::Video) {
            Some(ts) if ts <= time => continue,
            _ => break,
        }
    }

    Ok(selection)
}

/// Holds the most recent decoded frame for the display
#[derive(Debug, Default)]
pub struct VideoSlot {
    frame: Mutex<Option<VideoFrame>>,
    new_frame: AtomicBool,
}

impl VideoSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame
    pub fn publish(&self, frame: VideoFrame) {
        *self.frame.lock() = Some(frame);
        self.new_frame.store(true, Ordering::Release);
    }

    /// Whether a frame was published since the last call
    pub fn new_frame_ready(&self) -> bool {
        self.new_frame.swap(false, Ordering::AcqRel)
    }

    /// Take the current frame out of the slot
    pub fn take(&self) -> Option<VideoFrame> {
        self.frame.lock().take()
    }

    pub fn timestamp(&self) -> Option<Millis> {
        self.frame.lock().as_ref().map(|frame| frame.timestamp)
    }

    pub fn clear(&self) {
        *self.frame.lock() = None;
        self.new_frame.store(false, Ordering::Release);
    }
}
