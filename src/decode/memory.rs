//! In-memory media parser.
//!
//! Holds a complete list of encoded frames and releases them a chunk at a
//! time, the way a network-fed container parser exposes more frames as
//! bytes arrive. Used for generated streams and for driving sessions
//! without real input.

use crate::core::time::Millis;
use crate::decode::decoder::{DecodeError, EncodedFrame, MediaParser};
use crate::decode::stream_info::{AudioInfo, StreamKind, VideoInfo};

pub struct MemoryParser {
    frames: Vec<EncodedFrame>,
    /// Frames `..parsed` are visible
    parsed: usize,
    frames_per_chunk: usize,
    audio_cursor: usize,
    video_cursor: usize,
    bytes_loaded: u64,
    bytes_total: u64,
    audio_info: Option<AudioInfo>,
    video_info: Option<VideoInfo>,
}

impl MemoryParser {
    /// Frames are ordered by timestamp; nothing is parsed yet
    pub fn new(mut frames: Vec<EncodedFrame>) -> Self {
        frames.sort_by_key(|frame| frame.timestamp);
        let bytes_total = frames.iter().map(|frame| frame.data.len() as u64).sum();
        Self {
            frames,
            parsed: 0,
            frames_per_chunk: 1,
            audio_cursor: 0,
            video_cursor: 0,
            bytes_loaded: 0,
            bytes_total,
            audio_info: None,
            video_info: None,
        }
    }

    pub fn with_audio_info(mut self, info: AudioInfo) -> Self {
        self.audio_info = Some(info);
        self
    }

    pub fn with_video_info(mut self, info: VideoInfo) -> Self {
        self.video_info = Some(info);
        self
    }

    /// How many frames each `parse_next_chunk` call releases
    pub fn with_frames_per_chunk(mut self, count: usize) -> Self {
        self.frames_per_chunk = count.max(1);
        self
    }

    /// Release everything at once
    pub fn fully_parsed(mut self) -> Self {
        self.parsed = self.frames.len();
        self.bytes_loaded = self.bytes_total;
        self
    }

    fn cursor(&self, kind: StreamKind) -> usize {
        match kind {
            StreamKind::Audio => self.audio_cursor,
            StreamKind::Video => self.video_cursor,
        }
    }

    fn find_next(&self, kind: StreamKind) -> Option<usize> {
        let start = self.cursor(kind);
        self.frames[start.min(self.parsed)..self.parsed]
            .iter()
            .position(|frame| frame.kind == kind)
            .map(|offset| start + offset)
    }
}

impl MemoryParser {
    /// Timestamp of the newest parsed frame of `kind`, if any is unread
    fn newest_pending(&self, kind: StreamKind) -> Option<Millis> {
        self.find_next(kind)?;
        self.frames[..self.parsed]
            .iter()
            .rev()
            .find(|frame| frame.kind == kind)
            .map(|frame| frame.timestamp)
    }
}

impl MediaParser for MemoryParser {
    fn next_frame_timestamp(&mut self, kind: StreamKind) -> Option<Millis> {
        self.find_next(kind).map(|index| self.frames[index].timestamp)
    }

    fn next_frame(&mut self, kind: StreamKind) -> Option<EncodedFrame> {
        let index = self.find_next(kind)?;
        match kind {
            StreamKind::Audio => self.audio_cursor = index + 1,
            StreamKind::Video => self.video_cursor = index + 1,
        }
        Some(self.frames[index].clone())
    }

    /// Lands on the last frame boundary at or before `position`. Positions
    /// past the parsed data are rejected.
    fn seek(&mut self, position: Millis) -> Result<Millis, DecodeError> {
        let parsed = &self.frames[..self.parsed];
        match parsed.last() {
            Some(last) if last.timestamp >= position => {}
            _ => return Err(DecodeError::SeekRejected(position)),
        }

        let index = parsed
            .iter()
            .rposition(|frame| frame.timestamp <= position)
            .unwrap_or(0);
        let actual = parsed[index].timestamp;
        let first = parsed
            .iter()
            .position(|frame| frame.timestamp >= actual)
            .unwrap_or(index);
        self.audio_cursor = first;
        self.video_cursor = first;
        Ok(actual)
    }

    fn parse_next_chunk(&mut self) -> bool {
        if self.parsed >= self.frames.len() {
            return false;
        }
        let end = (self.parsed + self.frames_per_chunk).min(self.frames.len());
        self.bytes_loaded += self.frames[self.parsed..end]
            .iter()
            .map(|frame| frame.data.len() as u64)
            .sum::<u64>();
        self.parsed = end;
        true
    }

    fn parsing_complete(&self) -> bool {
        self.parsed >= self.frames.len()
    }

    /// The least buffered stream decides. A stream counts if it has info,
    /// or, without any info, if it has frames at all.
    fn buffered_until(&self) -> Option<Millis> {
        let with_info = [
            (StreamKind::Audio, self.audio_info.is_some()),
            (StreamKind::Video, self.video_info.is_some()),
        ];
        let any_info = with_info.iter().any(|(_, known)| *known);
        with_info
            .into_iter()
            .filter(|(kind, known)| {
                if any_info {
                    *known
                } else {
                    self.frames.iter().any(|frame| frame.kind == *kind)
                }
            })
            .map(|(kind, _)| self.newest_pending(kind))
            .min()
            .flatten()
    }

    fn bytes_loaded(&self) -> u64 {
        self.bytes_loaded
    }

    fn bytes_total(&self) -> u64 {
        self.bytes_total
    }

    fn audio_info(&self) -> Option<&AudioInfo> {
        self.audio_info.as_ref()
    }

    fn video_info(&self) -> Option<&VideoInfo> {
        self.video_info.as_ref()
    }
}
