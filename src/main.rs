//! Demo player: plays a generated tone through a stream session and an
//! event sound on top of it, then exits when the stream stops.
//!
//! Usage: `mediasync [config.json]`

use std::f32::consts::TAU;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mediasync::audio::{AudioOutput, VoiceParams};
use mediasync::core::time::constants::OUTPUT_SAMPLE_RATE;
use mediasync::core::time::format_time;
use mediasync::decode::{AudioCodec, AudioInfo, EncodedFrame, SoundInfo, StreamKind};
use mediasync::{
    AdvanceDriver, AudioDevice, Config, DefaultMediaHandler, MediaHandler, MediaStream, Mixer,
    StatusCode,
};
use parking_lot::Mutex;

const FRAME_MS: u64 = 40;

/// Interleaved 16-bit stereo sine, little-endian bytes
fn tone(frequency: f32, start_frame: usize, frames: usize, amplitude: f32) -> Vec<u8> {
    let rate = OUTPUT_SAMPLE_RATE as f32;
    let mut bytes = Vec::with_capacity(frames * 4);
    for i in start_frame..start_frame + frames {
        let phase = TAU * frequency * i as f32 / rate;
        let value = (phase.sin() * amplitude * i16::MAX as f32) as i16;
        for _ in 0..2 {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

fn tone_frames(seconds: u64) -> Vec<EncodedFrame> {
    let per_frame = (OUTPUT_SAMPLE_RATE as u64 * FRAME_MS / 1000) as usize;
    (0..seconds * 1000 / FRAME_MS)
        .map(|i| {
            let data = tone(440.0, i as usize * per_frame, per_frame, 0.3);
            EncodedFrame::new(StreamKind::Audio, i * FRAME_MS, data)
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(Path::new(&path))?,
        None => Config::default(),
    };

    let handler: Arc<dyn MediaHandler> = Arc::new(DefaultMediaHandler::new());
    let mixer = Mixer::new(handler.clone(), &config.mixer);

    // Without a device the session still runs, timed by the wall clock only
    let device = match AudioDevice::new() {
        Ok(mut device) => match device.start(mixer.clone()) {
            Ok(()) => Some(device),
            Err(e) => {
                log::warn!("audio output unavailable: {}", e);
                None
            }
        },
        Err(e) => {
            log::warn!("audio output unavailable: {}", e);
            None
        }
    };
    let output = device
        .as_ref()
        .map(|_| Arc::new(mixer.clone()) as Arc<dyn AudioOutput>);

    let stream = MediaStream::with_system_clock(config.playback.clone(), handler, output);
    let stream = Arc::new(Mutex::new(stream));
    let status = stream.lock().status_queue();

    let parser = mediasync::decode::MemoryParser::new(tone_frames(3))
        .with_audio_info(AudioInfo {
            codec: AudioCodec::Uncompressed,
            sample_rate: OUTPUT_SAMPLE_RATE,
            sample_size: 2,
            stereo: true,
            duration: 3_000,
        })
        .with_frames_per_chunk(2);
    stream.lock().play(Box::new(parser))?;

    let interval = Duration::from_millis(config.playback.advance_interval_ms.max(1));
    let mut driver = AdvanceDriver::start(stream.clone(), interval);

    // A short beep repeated on top of the stream
    let beep_frames = OUTPUT_SAMPLE_RATE as usize / 10;
    let beep = mixer.create_sound(
        tone(880.0, 0, beep_frames, 0.2),
        SoundInfo::new(
            AudioCodec::Uncompressed,
            true,
            OUTPUT_SAMPLE_RATE,
            beep_frames as u32,
            true,
        ),
    );
    let params = VoiceParams {
        loops: 4,
        ..Default::default()
    };
    if mixer.create_voice(beep, params)?.is_none() {
        log::warn!("beep was not started");
    }

    let deadline = Instant::now() + Duration::from_secs(30);
    'wait: while Instant::now() < deadline {
        while let Some(code) = status.pop_next() {
            let (name, level) = code.info();
            log::info!("{} ({}) at {}", name, level, format_time(stream.lock().time()));
            if code == StatusCode::PlayStop || code.is_error() {
                break 'wait;
            }
        }
        thread::sleep(Duration::from_millis(20));
    }

    driver.stop();
    stream.lock().close();
    if mixer.source_count() > 0 {
        log::warn!("{} audio sources still attached", mixer.source_count());
    }
    let stats = mixer.stats();
    log::info!(
        "done: {} voices started, {} stopped",
        stats.voices_started,
        stats.voices_stopped
    );
    Ok(())
}
