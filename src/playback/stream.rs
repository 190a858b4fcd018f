//! Playback session for one media input.
//!
//! A [`MediaStream`] pulls encoded frames from a parser, decodes video into
//! a single display slot and audio into a bounded queue drained by the
//! mixer, and keeps both in step with a [`PlayHead`] running on an
//! interruptable clock. The clock is frozen while buffering and while the
//! audio queue is full, so the position never runs ahead of decoded data.
//!
//! `advance` must be called periodically (see `playback::driver`). Every
//! failure inside it ends up as a state transition and a status code.

use std::sync::Arc;

use crate::audio::mixer::{AudioOutput, AudioSource, SourceId};
use crate::config::PlaybackConfig;
use crate::core::clock::{InterruptableClock, SystemClock, VirtualClock};
use crate::core::playhead::{PlayHead, PlaybackStatus};
use crate::core::time::{self, Millis};
use crate::decode::decoder::{
    AudioDecoder, MediaHandler, MediaParser, StreamProvider, VideoDecoder, VideoFrame,
};
use crate::decode::stream_info::StreamKind;
use crate::playback::queue::AudioQueue;
use crate::playback::state::{
    ClockAction, DecodingEvent, DecodingMachine, DecodingState, PauseMode, SharedDecodingState,
};
use crate::playback::status::{StatusCode, StatusQueue};
use crate::playback::video::{self, VideoSlot};

/// Error type for session control
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("already streaming")]
    AlreadyStreaming,
    #[error("stream is closed")]
    Closed,
    #[error("stream not found: {0}")]
    NotFound(String),
}

/// Where the session's queue consumer currently lives
enum SourceState {
    None,
    Attached(SourceId),
    /// Unplugged while paused
    Detached(Box<dyn AudioSource>),
}

pub struct MediaStream {
    config: PlaybackConfig,
    handler: Arc<dyn MediaHandler>,
    output: Option<Arc<dyn AudioOutput>>,
    clock: Arc<InterruptableClock>,
    playhead: PlayHead,
    machine: DecodingMachine,
    status: Arc<StatusQueue>,
    parser: Option<Box<dyn MediaParser>>,
    video_decoder: Option<Box<dyn VideoDecoder>>,
    audio_decoder: Option<Box<dyn AudioDecoder>>,
    video_info_known: bool,
    audio_info_known: bool,
    video: Arc<VideoSlot>,
    audio_queue: Option<AudioQueue>,
    source: SourceState,
    buffer_time: Millis,
    volume: u8,
    decoded_frames: u32,
    failed_frames: u32,
    closed: bool,
}

impl MediaStream {
    /// Create an idle session timed by `clock_source`
    pub fn new(
        config: PlaybackConfig,
        handler: Arc<dyn MediaHandler>,
        output: Option<Arc<dyn AudioOutput>>,
        clock_source: Arc<dyn VirtualClock>,
    ) -> Self {
        let clock = Arc::new(InterruptableClock::new(clock_source));
        let playhead_clock: Arc<dyn VirtualClock> = clock.clone();
        Self {
            buffer_time: config.buffer_time_ms,
            config,
            handler,
            output,
            clock,
            playhead: PlayHead::new(playhead_clock),
            machine: DecodingMachine::new(),
            status: Arc::new(StatusQueue::new()),
            parser: None,
            video_decoder: None,
            audio_decoder: None,
            video_info_known: false,
            audio_info_known: false,
            video: Arc::new(VideoSlot::new()),
            audio_queue: None,
            source: SourceState::None,
            volume: 100,
            decoded_frames: 0,
            failed_frames: 0,
            closed: false,
        }
    }

    /// Create an idle session timed by the wall clock
    pub fn with_system_clock(
        config: PlaybackConfig,
        handler: Arc<dyn MediaHandler>,
        output: Option<Arc<dyn AudioOutput>>,
    ) -> Self {
        Self::new(config, handler, output, Arc::new(SystemClock::new()))
    }

    /// Start playing `parser`'s input
    pub fn play(&mut self, parser: Box<dyn MediaParser>) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        if self.parser.is_some() {
            log::error!("play called while already streaming");
            return Err(StreamError::AlreadyStreaming);
        }

        self.parser = Some(parser);
        self.playhead.init(false, false);

        let (queue, source) = AudioQueue::new(self.config.audio_queue_capacity);
        self.audio_queue = Some(queue);
        if self.output.is_some() {
            self.source = SourceState::Detached(Box::new(source));
        }

        self.apply(DecodingEvent::Start);
        self.playhead.set_state(PlaybackStatus::Playing);
        self.attach_source();
        Ok(())
    }

    /// Open `url` through `provider` and play it. An `mp3:` prefix is ignored.
    pub fn play_url(
        &mut self,
        provider: &dyn StreamProvider,
        url: &str,
    ) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        if self.parser.is_some() {
            return Err(StreamError::AlreadyStreaming);
        }

        let url = url.strip_prefix("mp3:").unwrap_or(url);
        match provider.open(url) {
            Some(parser) => self.play(parser),
            None => {
                log::error!("could not open {}", url);
                self.status.push(StatusCode::StreamNotFound);
                Err(StreamError::NotFound(url.to_string()))
            }
        }
    }

    pub fn pause(&mut self, mode: PauseMode) {
        match mode {
            PauseMode::Toggle if self.playhead.state() == PlaybackStatus::Paused => {
                self.unpause_playback()
            }
            PauseMode::Toggle | PauseMode::Pause => self.pause_playback(),
            PauseMode::Unpause => self.unpause_playback(),
        }
    }

    fn pause_playback(&mut self) {
        if self.playhead.set_state(PlaybackStatus::Paused) == PlaybackStatus::Playing {
            self.detach_source();
        }
    }

    fn unpause_playback(&mut self) {
        if self.playhead.set_state(PlaybackStatus::Playing) == PlaybackStatus::Paused {
            self.attach_source();
        }
    }

    /// Jump to `seconds`. The re-decode happens on the next advance.
    pub fn seek(&mut self, seconds: f64) {
        let target = time::from_seconds(seconds);
        let Some(parser) = self.parser.as_deref_mut() else {
            log::debug!("seek({} ms) with no input", target);
            return;
        };

        // Freeze now so the next advance doesn't find the clock far ahead
        let paused_here = self.clock.pause();
        let actual = match parser.seek(target) {
            Ok(actual) => actual,
            Err(e) => {
                log::debug!("seek to {} ms failed: {}", target, e);
                self.status.push(StatusCode::InvalidTime);
                if paused_here {
                    self.clock.resume();
                }
                return;
            }
        };
        log::debug!("seek to {} ms landed on {} ms", target, actual);

        if let Some(queue) = &self.audio_queue {
            queue.flush();
        }
        self.playhead.seek_to(actual);
        self.apply(DecodingEvent::Seek);
        self.refresh_video_frame(true);
    }

    /// Stop playback and release the input. The session cannot be reused.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(queue) = &self.audio_queue {
            queue.flush();
        }
        self.detach_source();
        self.source = SourceState::None;
        self.video.clear();
        self.status.clear();
        self.apply(DecodingEvent::Close);
        self.clock.pause();

        self.parser = None;
        self.video_decoder = None;
        self.audio_decoder = None;
        self.audio_queue = None;
        self.closed = true;
        log::debug!("stream closed");
    }

    /// One step of decoding and buffering
    pub fn advance(&mut self) {
        if self.closed {
            return;
        }
        let Some(parser) = self.parser.as_deref_mut() else {
            return;
        };
        if !self.machine.state().is_active() {
            return;
        }

        let parsing_complete = parser.parsing_complete();
        if !parsing_complete {
            for _ in 0..self.config.parse_chunks_per_advance {
                if !parser.parse_next_chunk() {
                    break;
                }
            }
        }

        let buffer_len = self.buffer_length();

        if self.machine.state() == DecodingState::Decoding && buffer_len == 0 {
            if !parsing_complete {
                log::debug!("buffer empty while decoding, pausing playback clock");
                self.apply(DecodingEvent::BufferLow);
            } else {
                log::trace!("buffer empty, parsing complete");
            }
        }

        if self.machine.state() == DecodingState::Buffering {
            if buffer_len < self.buffer_time && !parsing_complete {
                log::trace!(
                    "buffering: position {} ms, buffer {}/{} ms",
                    self.playhead.position(),
                    buffer_len,
                    self.buffer_time
                );
                if self.video.timestamp().is_none()
                    && self.playhead.state() != PlaybackStatus::Paused
                {
                    self.refresh_video_frame(true);
                }
                return;
            }
            log::debug!(
                "buffer full (or parsing complete) at {} ms, buffer {}/{} ms",
                self.playhead.position(),
                buffer_len,
                self.buffer_time
            );
            self.apply(DecodingEvent::BufferReady);
        }

        self.refresh_video_frame(false);
        if !self.machine.state().is_active() {
            return;
        }
        self.refresh_audio_buffer();
        if !self.machine.state().is_active() {
            return;
        }
        self.playhead.advance_if_consumed();
        self.check_input_exhausted();
    }

    /// Carry out a state machine transition
    fn apply(&mut self, event: DecodingEvent) -> bool {
        let Some(transition) = self.machine.apply(event) else {
            return false;
        };
        match transition.clock {
            ClockAction::Pause => {
                self.clock.pause();
            }
            ClockAction::Resume => {
                self.clock.resume();
            }
            ClockAction::None => {}
        }
        if let Some(code) = transition.status {
            self.status.push(code);
        }
        true
    }

    /// Give up on the input
    fn fail(&mut self, reason: &str) {
        log::error!("stream failed: {}", reason);
        if let Some(queue) = &self.audio_queue {
            queue.flush();
        }
        self.apply(DecodingEvent::Fail);
    }

    /// Returns `true` if the failure count ended the session
    fn check_decode_failures(&mut self) -> bool {
        if self.decoded_frames == 0 && self.failed_frames >= self.config.max_decode_failures {
            self.fail("no frame could be decoded");
            return true;
        }
        false
    }

    fn check_input_exhausted(&mut self) {
        if !self.machine.state().is_active() {
            return;
        }
        let Some(parser) = self.parser.as_deref_mut() else {
            return;
        };
        if !parser.parsing_complete() {
            return;
        }
        let video_done = self.video_decoder.is_none()
            || parser.next_frame_timestamp(StreamKind::Video).is_none();
        let audio_done = self.audio_decoder.is_none()
            || parser.next_frame_timestamp(StreamKind::Audio).is_none();
        let drained = self.audio_queue.as_ref().map_or(true, AudioQueue::is_drained);
        if !(video_done && audio_done && drained) {
            return;
        }

        if self.decoded_frames == 0 && self.failed_frames > 0 {
            self.fail("input ended without a decodable frame");
            return;
        }
        log::debug!("input exhausted at {} ms", self.playhead.position());
        self.apply(DecodingEvent::InputExhausted);
    }

    /// Construct the video decoder once video info shows up
    fn ensure_video_decoder(&mut self) -> bool {
        if self.video_decoder.is_some() {
            return true;
        }
        if self.video_info_known {
            return false;
        }
        let Some(info) = self.parser.as_ref().and_then(|parser| parser.video_info()).cloned() else {
            return false;
        };
        self.video_info_known = true;
        match self.handler.create_video_decoder(&info) {
            Ok(decoder) => {
                log::debug!(
                    "hot-plugging video consumer ({}, {}x{})",
                    info.codec,
                    info.width,
                    info.height
                );
                self.video_decoder = Some(decoder);
                self.playhead.set_video_consumer_available();
                true
            }
            Err(e) if e.is_fatal() => {
                self.fail(&format!("video decoder: {}", e));
                false
            }
            Err(e) => {
                log::error!("could not create video decoder: {}", e);
                false
            }
        }
    }

    /// Construct the audio decoder once audio info shows up
    fn ensure_audio_decoder(&mut self) -> bool {
        if self.audio_decoder.is_some() {
            return true;
        }
        if self.audio_info_known {
            return false;
        }
        let Some(info) = self.parser.as_ref().and_then(|parser| parser.audio_info()).cloned() else {
            return false;
        };
        self.audio_info_known = true;
        match self.handler.create_audio_decoder(&info) {
            Ok(decoder) => {
                log::debug!(
                    "hot-plugging audio consumer ({:?}, {} Hz)",
                    info.codec,
                    info.sample_rate
                );
                self.audio_decoder = Some(decoder);
                self.playhead.set_audio_consumer_available();
                true
            }
            Err(e) if e.is_fatal() => {
                self.fail(&format!("audio decoder: {}", e));
                false
            }
            Err(e) => {
                log::error!("could not create audio decoder: {}", e);
                false
            }
        }
    }

    fn refresh_video_frame(&mut self, also_if_paused: bool) {
        if !self.ensure_video_decoder() {
            return;
        }
        if !also_if_paused && self.playhead.state() == PlaybackStatus::Paused {
            return;
        }
        if self.playhead.is_video_consumed() {
            return;
        }

        let position = self.playhead.position();
        let (Some(parser), Some(decoder)) =
            (self.parser.as_deref_mut(), self.video_decoder.as_deref_mut())
        else {
            return;
        };
        match video::select_frame(parser, decoder, position) {
            Ok(selection) => {
                self.decoded_frames += selection.decoded;
                self.failed_frames += selection.failed;
                if let Some(frame) = selection.frame {
                    self.video.publish(frame);
                }
            }
            Err(e) => {
                self.fail(&format!("video decode: {}", e));
                return;
            }
        }
        if self.check_decode_failures() {
            return;
        }
        self.playhead.set_video_consumed();
    }

    fn refresh_audio_buffer(&mut self) {
        if self.playhead.state() == PlaybackStatus::Paused {
            return;
        }
        if self.playhead.is_audio_consumed() {
            return;
        }
        let position = self.playhead.position();
        self.push_decoded_audio_frames(position);
    }

    /// Decode audio up to `ts` plus the lookahead into the queue.
    ///
    /// A full queue pauses the playback clock and leaves the position
    /// unconsumed; the next call picks up where this one stopped.
    fn push_decoded_audio_frames(&mut self, ts: Millis) {
        if !self.machine.state().is_active() || !self.ensure_audio_decoder() {
            return;
        }
        let queue_enabled = matches!(self.source, SourceState::Attached(_));
        let lookahead = self.config.audio_lookahead_ms;
        let (Some(parser), Some(decoder), Some(queue)) = (
            self.parser.as_deref_mut(),
            self.audio_decoder.as_deref_mut(),
            self.audio_queue.as_ref(),
        ) else {
            return;
        };

        let mut consumed = false;
        let mut fatal = None;
        loop {
            if queue.is_full() {
                log::debug!(
                    "audio queue overrun ({}/{}), pausing playback clock",
                    queue.len(),
                    queue.capacity()
                );
                self.clock.pause();
                return;
            }

            let parsing_complete = parser.parsing_complete();
            let Some(next) = parser.next_frame_timestamp(StreamKind::Audio) else {
                if parsing_complete {
                    consumed = true;
                }
                break;
            };
            if next > ts {
                consumed = true;
                if next > ts + lookahead {
                    break;
                }
            }

            let Some(frame) = parser.next_frame(StreamKind::Audio) else {
                break;
            };
            let timestamp = frame.timestamp;
            match decoder.decode(frame) {
                Ok(mut chunk) => {
                    self.decoded_frames += 1;
                    if chunk.is_empty() || !queue_enabled {
                        continue;
                    }
                    chunk.apply_volume(self.volume);
                    if queue.push(chunk).is_err() {
                        log::debug!("audio queue filled while pushing frame at {} ms", timestamp);
                    }
                }
                Err(e) if e.is_fatal() => {
                    fatal = Some(e);
                    break;
                }
                Err(e) => {
                    log::error!("audio frame at {} ms failed to decode: {}", timestamp, e);
                    self.failed_frames += 1;
                }
            }
        }

        if let Some(e) = fatal {
            self.fail(&format!("audio decode: {}", e));
            return;
        }
        if self.check_decode_failures() {
            return;
        }
        if consumed && self.machine.state().is_active() {
            self.clock.resume();
            self.playhead.set_audio_consumed();
        }
    }

    fn attach_source(&mut self) {
        let Some(output) = &self.output else {
            return;
        };
        match std::mem::replace(&mut self.source, SourceState::None) {
            SourceState::Detached(source) => {
                self.source = SourceState::Attached(output.attach(source));
            }
            other => self.source = other,
        }
    }

    fn detach_source(&mut self) {
        let (Some(output), SourceState::Attached(id)) = (&self.output, &self.source) else {
            return;
        };
        self.source = match output.detach(*id) {
            Some(source) => SourceState::Detached(source),
            None => SourceState::None,
        };
    }

    /// Current playhead position
    pub fn time(&self) -> Millis {
        self.playhead.position()
    }

    /// Parsed-ahead time beyond the playhead
    pub fn buffer_length(&self) -> Millis {
        let Some(parser) = self.parser.as_deref() else {
            return 0;
        };
        parser
            .buffered_until()
            .map_or(0, |until| until.saturating_sub(self.playhead.position()))
    }

    pub fn set_buffer_time(&mut self, millis: Millis) {
        self.buffer_time = millis;
    }

    pub fn buffer_time(&self) -> Millis {
        self.buffer_time
    }

    pub fn bytes_loaded(&self) -> u64 {
        self.parser.as_deref().map_or(0, |parser| parser.bytes_loaded())
    }

    pub fn bytes_total(&self) -> u64 {
        self.parser.as_deref().map_or(0, |parser| parser.bytes_total())
    }

    pub fn pop_next_status(&self) -> Option<StatusCode> {
        self.status.pop_next()
    }

    /// Drain pending status codes through `dispatch`
    pub fn process_status_notifications<F: FnMut(StatusCode)>(&self, mut dispatch: F) {
        for code in self.status.pop_all() {
            dispatch(code);
        }
    }

    /// Queue handle for draining from another thread
    pub fn status_queue(&self) -> Arc<StatusQueue> {
        Arc::clone(&self.status)
    }

    pub fn decoding_state(&self) -> DecodingState {
        self.machine.state()
    }

    pub fn decoding_state_handle(&self) -> Arc<SharedDecodingState> {
        self.machine.shared()
    }

    pub fn playback_status(&self) -> PlaybackStatus {
        self.playhead.state()
    }

    /// Whether the playback clock is frozen (buffering, overrun, stopped)
    pub fn is_clock_paused(&self) -> bool {
        self.clock.is_paused()
    }

    pub fn new_frame_ready(&self) -> bool {
        self.video.new_frame_ready()
    }

    pub fn take_video_frame(&self) -> Option<VideoFrame> {
        self.video.take()
    }

    /// Display slot handle for a render thread
    pub fn video_slot(&self) -> Arc<VideoSlot> {
        Arc::clone(&self.video)
    }

    pub fn video_width(&self) -> u32 {
        self.video_decoder.as_ref().map_or(0, |decoder| decoder.width())
    }

    pub fn video_height(&self) -> u32 {
        self.video_decoder.as_ref().map_or(0, |decoder| decoder.height())
    }

    /// Volume applied to decoded stream audio, 0..=100
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        // Unplug from the mixer before the queue goes away
        self.close();
    }
}
