//! Background thread that calls [`MediaStream::advance`] on a fixed tick.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;

use crate::playback::stream::MediaStream;

pub struct AdvanceDriver {
    stop_tx: Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl AdvanceDriver {
    /// Spawn the tick thread. The stream lock is held only for the
    /// duration of each `advance` call.
    pub fn start(stream: Arc<Mutex<MediaStream>>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let ticker = channel::tick(interval);

        let handle = thread::spawn(move || {
            log::debug!("advance driver started ({:?} tick)", interval);
            loop {
                channel::select! {
                    recv(ticker) -> _ => {
                        let mut stream = stream.lock();
                        if stream.is_closed() {
                            break;
                        }
                        stream.advance();
                    }
                    recv(stop_rx) -> _ => break,
                }
            }
            log::debug!("advance driver stopped");
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop the thread and wait for it. Safe to call twice.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.stop_tx.try_send(());
        if handle.join().is_err() {
            log::error!("advance driver thread panicked");
        }
    }
}

impl Drop for AdvanceDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mixer::{AudioOutput, Mixer};
    use crate::config::{MixerConfig, PlaybackConfig};
    use crate::core::clock::ManualClock;
    use crate::decode::decoder::{EncodedFrame, MediaHandler};
    use crate::decode::handler::DefaultMediaHandler;
    use crate::decode::memory::MemoryParser;
    use crate::decode::stream_info::{AudioCodec, AudioInfo, StreamKind};
    use crate::playback::state::DecodingState;

    fn stream() -> (Arc<ManualClock>, Arc<Mutex<MediaStream>>) {
        let handler: Arc<dyn MediaHandler> = Arc::new(DefaultMediaHandler::new());
        let mixer = Mixer::new(handler.clone(), &MixerConfig::default());
        let output: Arc<dyn AudioOutput> = Arc::new(mixer);
        let clock = Arc::new(ManualClock::new());
        let config = PlaybackConfig {
            buffer_time_ms: 0,
            ..Default::default()
        };
        let stream = MediaStream::new(config, handler, Some(output), clock.clone());
        (clock, Arc::new(Mutex::new(stream)))
    }

    #[test]
    fn test_driver_advances_stream() {
        let (_clock, stream) = stream();
        let frames = (0..4)
            .map(|i| EncodedFrame::new(StreamKind::Audio, i * 40, vec![1; 64]))
            .collect();
        let parser = MemoryParser::new(frames).with_audio_info(AudioInfo {
            codec: AudioCodec::Uncompressed,
            sample_rate: 44_100,
            sample_size: 2,
            stereo: true,
            duration: 0,
        });
        stream.lock().play(Box::new(parser)).unwrap();
        assert_eq!(stream.lock().decoding_state(), DecodingState::Buffering);

        let mut driver = AdvanceDriver::start(stream.clone(), Duration::from_millis(1));
        let mut left = 500;
        while stream.lock().decoding_state() == DecodingState::Buffering && left > 0 {
            thread::sleep(Duration::from_millis(2));
            left -= 1;
        }
        driver.stop();
        assert!(!driver.is_running());
        assert_ne!(stream.lock().decoding_state(), DecodingState::Buffering);
        assert!(stream.lock().bytes_loaded() > 0);
    }

    #[test]
    fn test_driver_exits_when_stream_closed() {
        let (_clock, stream) = stream();
        let mut driver = AdvanceDriver::start(stream.clone(), Duration::from_millis(1));
        stream.lock().close();
        let mut left = 500;
        while driver.is_running() && left > 0 {
            thread::sleep(Duration::from_millis(2));
            left -= 1;
        }
        assert!(!driver.is_running());
        driver.stop();
    }
}
