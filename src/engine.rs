//! Real-time audio output using cpal.
//!
//! The render half of the graph runtime is moved into the device callback;
//! each callback renders whole blocks of at most `max_block` frames and
//! interleaves the sink's two channels into the device buffer.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::error::PatchError;
use crate::graph::RenderGraph;

/// Block size handed to `GraphRuntime::new` when driving a device stream.
pub const DEFAULT_MAX_BLOCK: usize = 512;

pub struct AudioEngine {
    sample_rate: u32,
    _stream: cpal::Stream,
}

/// Queries the default output device before the graph runtime exists, so
/// the runtime can be built with the right sample rate.
pub fn output_spec() -> Result<(f64, usize), PatchError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PatchError::Device("no audio output device found".into()))?;
    let config = device
        .default_output_config()
        .map_err(|err| PatchError::Device(err.to_string()))?;
    Ok((f64::from(config.sample_rate().0), DEFAULT_MAX_BLOCK))
}

impl AudioEngine {
    /// Opens the default output device and starts pulling blocks from the
    /// renderer. The stream keeps running for the engine's lifetime.
    pub fn start(render: RenderGraph) -> Result<Self, PatchError> {
        let host = cpal::default_host();
        info!("audio host: {:?}", host.id());

        let device = host
            .default_output_device()
            .ok_or_else(|| PatchError::Device("no audio output device found".into()))?;
        info!(
            "audio device: {}",
            device.name().map_err(|err| PatchError::Device(err.to_string()))?
        );

        let config = device
            .default_output_config()
            .map_err(|err| PatchError::Device(err.to_string()))?;
        info!("audio config: {:?}", config);

        let sample_rate = config.sample_rate().0;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(&device, &config.into(), render),
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(&device, &config.into(), render),
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(&device, &config.into(), render),
            other => {
                return Err(PatchError::Device(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|err| PatchError::Device(err.to_string()))?;
        info!("audio stream started at {} Hz", sample_rate);

        Ok(Self {
            sample_rate,
            _stream: stream,
        })
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut render: RenderGraph,
    ) -> Result<cpal::Stream, PatchError>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let channels = config.channels as usize;
        let max_block = render.max_block();
        let mut left = vec![0.0f32; max_block];
        let mut right = vec![0.0f32; max_block];

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let total = data.len() / channels;
                    let mut frames = data.chunks_mut(channels);
                    let mut rendered = 0;

                    while rendered < total {
                        let n = (total - rendered).min(max_block);
                        render.render_block(&mut left[..n], &mut right[..n]);

                        for i in 0..n {
                            let Some(frame) = frames.next() else { return };
                            write_frame(frame, left[i], right[i]);
                        }
                        rendered += n;
                    }
                },
                |err| error!("audio stream error: {}", err),
                None,
            )
            .map_err(|err| PatchError::Device(err.to_string()))?;

        Ok(stream)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn pause(&self) -> Result<(), PatchError> {
        self._stream
            .pause()
            .map_err(|err| PatchError::Device(err.to_string()))
    }

    pub fn resume(&self) -> Result<(), PatchError> {
        self._stream
            .play()
            .map_err(|err| PatchError::Device(err.to_string()))
    }
}

fn write_frame<T>(frame: &mut [T], left: f32, right: f32)
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    match frame.len() {
        0 => {}
        1 => frame[0] = T::from_sample((left + right) * 0.5),
        _ => {
            frame[0] = T::from_sample(left);
            frame[1] = T::from_sample(right);
            for sample in &mut frame[2..] {
                *sample = T::from_sample(0.0);
            }
        }
    }
}
