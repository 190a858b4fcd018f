//! Bounded queue of decoded stream audio.
//!
//! The advance step pushes through [`AudioQueue`]; the mixer pulls through
//! [`QueueSource`] on the audio thread. The channel capacity is the hard
//! cap, so a full queue is reported to the producer instead of growing.
//! A flush bumps the generation so chunks already held by the consumer
//! are dropped too.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use crate::audio::mixer::AudioSource;
use crate::decode::decoder::PcmChunk;

struct QueuedChunk {
    generation: u64,
    chunk: PcmChunk,
}

/// Producer side of the stream audio queue
pub struct AudioQueue {
    tx: Sender<QueuedChunk>,
    rx: Receiver<QueuedChunk>,
    capacity: usize,
    generation: Arc<AtomicU64>,
    /// Samples queued or held by the consumer, not yet played
    outstanding: Arc<AtomicUsize>,
}

impl AudioQueue {
    /// Create a queue holding at most `capacity` chunks, and its consumer
    pub fn new(capacity: usize) -> (Self, QueueSource) {
        let capacity = capacity.max(1);
        let (tx, rx) = channel::bounded(capacity);
        let generation = Arc::new(AtomicU64::new(0));
        let outstanding = Arc::new(AtomicUsize::new(0));
        let source = QueueSource {
            rx: rx.clone(),
            pending: None,
            offset: 0,
            generation: Arc::clone(&generation),
            outstanding: Arc::clone(&outstanding),
        };
        let queue = Self {
            tx,
            rx,
            capacity,
            generation,
            outstanding,
        };
        (queue, source)
    }

    /// Queue a chunk, handing it back if the queue is full
    pub fn push(&self, chunk: PcmChunk) -> Result<(), PcmChunk> {
        let samples = chunk.samples.len();
        let queued = QueuedChunk {
            generation: self.generation.load(Ordering::Acquire),
            chunk,
        };
        // Count first so the consumer never subtracts more than was added
        self.outstanding.fetch_add(samples, Ordering::AcqRel);
        match self.tx.try_send(queued) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(queued)) | Err(TrySendError::Disconnected(queued)) => {
                self.outstanding.fetch_sub(samples, Ordering::AcqRel);
                Err(queued.chunk)
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }

    /// Chunks waiting in the channel
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether every queued sample has been played
    pub fn is_drained(&self) -> bool {
        self.outstanding.load(Ordering::Acquire) == 0
    }

    /// Drop everything queued, including a chunk the consumer is partway through
    pub fn flush(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let mut dropped = 0;
        for queued in self.rx.try_iter() {
            dropped += queued.chunk.samples.len();
        }
        self.outstanding.fetch_sub(dropped, Ordering::AcqRel);
        log::debug!("flushed {} queued audio samples", dropped);
    }
}

/// Consumer side, attached to the mixer as an audio source
pub struct QueueSource {
    rx: Receiver<QueuedChunk>,
    pending: Option<QueuedChunk>,
    offset: usize,
    generation: Arc<AtomicU64>,
    outstanding: Arc<AtomicUsize>,
}

impl AudioSource for QueueSource {
    fn fill(&mut self, out: &mut [i16]) -> bool {
        let current = self.generation.load(Ordering::Acquire);
        let mut written = 0;

        while written < out.len() {
            if self.pending.is_none() {
                match self.rx.try_recv() {
                    Ok(queued) => {
                        self.pending = Some(queued);
                        self.offset = 0;
                    }
                    Err(_) => break,
                }
            }
            let Some(queued) = &self.pending else {
                break;
            };
            let samples = &queued.chunk.samples;

            if queued.generation != current {
                self.outstanding
                    .fetch_sub(samples.len() - self.offset, Ordering::AcqRel);
                self.pending = None;
                continue;
            }

            let n = (samples.len() - self.offset).min(out.len() - written);
            out[written..written + n].copy_from_slice(&samples[self.offset..self.offset + n]);
            self.offset += n;
            written += n;
            self.outstanding.fetch_sub(n, Ordering::AcqRel);
            if self.offset >= samples.len() {
                self.pending = None;
            }
        }
        if written < out.len() {
            log::trace!("stream audio underrun: {} of {} samples", written, out.len());
        }
        true
    }
}
