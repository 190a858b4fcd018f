//! cpal output device driving the mixer.
//! The device callback is the only caller of `Mixer::fill` in a running
//! program; it pulls 44100 Hz interleaved stereo samples.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, SampleRate, StreamConfig};

use crate::audio::mixer::Mixer;
use crate::core::time::constants::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};

/// Error type for audio device operations
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("cpal default config error: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("cpal build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("cpal play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("cpal pause stream error: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),
    #[error("unsupported device sample format {0:?}")]
    UnsupportedFormat(SampleFormat),
}

/// Audio output using cpal
pub struct AudioDevice {
    device: Device,
    stream_config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<cpal::Stream>,
}

impl AudioDevice {
    /// Open the default output device
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let default_config = device.default_output_config()?;
        let sample_format = default_config.sample_format();
        let stream_config = StreamConfig {
            channels: OUTPUT_CHANNELS as u16,
            sample_rate: SampleRate(OUTPUT_SAMPLE_RATE),
            buffer_size: BufferSize::Default,
        };
        log::info!(
            "audio device {:?}, native format {:?}",
            device.name().unwrap_or_default(),
            sample_format
        );

        Ok(Self {
            device,
            stream_config,
            sample_format,
            stream: None,
        })
    }

    /// Start pulling samples from `mixer`
    pub fn start(&mut self, mixer: Mixer) -> Result<(), AudioError> {
        self.stop();

        let error_callback = |err: cpal::StreamError| log::error!("audio stream error: {}", err);
        let stream = match self.sample_format {
            SampleFormat::I16 => self.device.build_output_stream(
                &self.stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| mixer.fill(data),
                error_callback,
                None,
            )?,
            SampleFormat::F32 => {
                let mut scratch: Vec<i16> = Vec::new();
                self.device.build_output_stream(
                    &self.stream_config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        scratch.resize(data.len(), 0);
                        mixer.fill(&mut scratch);
                        for (out, sample) in data.iter_mut().zip(&scratch) {
                            *out = *sample as f32 / 32_768.0;
                        }
                    },
                    error_callback,
                    None,
                )?
            }
            other => return Err(AudioError::UnsupportedFormat(other)),
        };

        stream.play()?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Stop and drop the output stream
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }
    }

    pub fn pause(&mut self) -> Result<(), AudioError> {
        if let Some(stream) = &self.stream {
            stream.pause()?;
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), AudioError> {
        if let Some(stream) = &self.stream {
            stream.play()?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }
}
