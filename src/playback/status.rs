//! Status notifications raised by a playback session.
//!
//! Codes are pushed by the advance step and drained by whatever thread
//! dispatches events to the host. Never drain from the audio callback.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Notification codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    BufferEmpty,
    BufferFull,
    BufferFlush,
    PlayStart,
    PlayStop,
    SeekNotify,
    StreamNotFound,
    InvalidTime,
}

impl StatusCode {
    /// Script-visible `(code, level)` pair
    pub fn info(self) -> (&'static str, &'static str) {
        match self {
            StatusCode::BufferEmpty => ("NetStream.Buffer.Empty", "status"),
            StatusCode::BufferFull => ("NetStream.Buffer.Full", "status"),
            StatusCode::BufferFlush => ("NetStream.Buffer.Flush", "status"),
            StatusCode::PlayStart => ("NetStream.Play.Start", "status"),
            StatusCode::PlayStop => ("NetStream.Play.Stop", "status"),
            StatusCode::SeekNotify => ("NetStream.Seek.Notify", "status"),
            StatusCode::StreamNotFound => ("NetStream.Play.StreamNotFound", "error"),
            StatusCode::InvalidTime => ("NetStream.Seek.InvalidTime", "error"),
        }
    }

    pub fn is_error(self) -> bool {
        self.info().1 == "error"
    }
}

struct Inner {
    queue: VecDeque<StatusCode>,
    last: Option<StatusCode>,
}

/// Thread-safe queue of pending status codes.
///
/// A code equal to the previously pushed one is dropped, so a state that
/// has not changed is not reported twice in a row.
pub struct StatusQueue {
    inner: Mutex<Inner>,
}

impl Default for StatusQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                last: None,
            }),
        }
    }

    /// Queue `code`. Returns `false` if it repeated the previous code.
    pub fn push(&self, code: StatusCode) -> bool {
        let mut inner = self.inner.lock();
        if inner.last == Some(code) {
            return false;
        }
        inner.last = Some(code);
        inner.queue.push_back(code);
        log::debug!("status {}", code.info().0);
        true
    }

    pub fn pop_next(&self) -> Option<StatusCode> {
        self.inner.lock().queue.pop_front()
    }

    pub fn pop_all(&self) -> Vec<StatusCode> {
        self.inner.lock().queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    /// Drop pending codes and forget the last one
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.queue.clear();
        inner.last = None;
    }
}
