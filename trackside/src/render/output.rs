use crate::config::RenderDesc;
use crate::error::{Result, TracksideError};
use crate::render::AudioGraph;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Output stream settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputDesc {
    pub sample_rate: u32,
    pub block_size: usize,
    pub channels: u16,
}

impl From<&RenderDesc> for OutputDesc {
    fn from(desc: &RenderDesc) -> Self {
        Self {
            sample_rate: desc.sample_rate,
            block_size: desc.block_size,
            channels: desc.channels,
        }
    }
}

/// A cpal output stream pulling blocks from an [`AudioGraph`].
///
/// The device callback only ever `try_lock`s the graph; when the session
/// thread holds the lock the block is silent.
pub struct OutputStream {
    desc: OutputDesc,
    stream: Option<cpal::Stream>,
    contended_blocks: Arc<AtomicU64>,
}

impl OutputStream {
    /// Opens and starts a stream on the default output device.
    pub fn open(desc: OutputDesc, graph: Arc<Mutex<AudioGraph>>) -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            TracksideError::AudioDevice("No default output device available".into())
        })?;

        let config = cpal::StreamConfig {
            channels: desc.channels,
            sample_rate: cpal::SampleRate(desc.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(desc.block_size as u32),
        };

        let default_config = device.default_output_config().map_err(|e| {
            TracksideError::AudioDevice(format!("Failed to get default config: {}", e))
        })?;

        let contended_blocks = Arc::new(AtomicU64::new(0));

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => {
                create_stream::<f32>(&device, &config, desc, graph, contended_blocks.clone())?
            }
            cpal::SampleFormat::I16 => {
                create_stream::<i16>(&device, &config, desc, graph, contended_blocks.clone())?
            }
            cpal::SampleFormat::U16 => {
                create_stream::<u16>(&device, &config, desc, graph, contended_blocks.clone())?
            }
            _ => {
                return Err(TracksideError::AudioFormat(
                    "Unsupported sample format".into(),
                ));
            }
        };

        stream.play().map_err(|e| {
            TracksideError::AudioDevice(format!("Failed to start stream: {}", e))
        })?;

        log::debug!(
            "Output stream open: {} Hz, {} channels, {} frame blocks",
            desc.sample_rate,
            desc.channels,
            desc.block_size
        );

        Ok(Self {
            desc,
            stream: Some(stream),
            contended_blocks,
        })
    }

    /// Blocks rendered as silence because the graph was locked.
    pub fn contended_blocks(&self) -> u64 {
        self.contended_blocks.load(Ordering::Relaxed)
    }

    /// Stops and releases the device stream.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            let contended = self.contended_blocks();
            if contended > 0 {
                log::warn!(
                    "{} Hz output stream skipped {} blocks while its graph was busy",
                    self.desc.sample_rate,
                    contended
                );
            } else {
                log::debug!("{} Hz output stream closed", self.desc.sample_rate);
            }
        }
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fills device buffers from a graph, converting to the device format.
struct GraphPull {
    graph: Arc<Mutex<AudioGraph>>,
    channels: u16,
    scratch: Vec<f32>,
    contended_blocks: Arc<AtomicU64>,
}

impl GraphPull {
    fn fill<T: FromSample<f32>>(&mut self, data: &mut [T]) {
        self.scratch.resize(data.len(), 0.0);

        // Never wait on the session thread from the device callback
        match self.graph.try_lock() {
            Ok(mut graph) => graph.render(&mut self.scratch, self.channels),
            Err(_) => {
                self.scratch.fill(0.0);
                self.contended_blocks.fetch_add(1, Ordering::Relaxed);
            }
        }

        for (sample, value) in data.iter_mut().zip(&self.scratch) {
            *sample = T::from_sample(*value);
        }
    }
}

fn create_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    desc: OutputDesc,
    graph: Arc<Mutex<AudioGraph>>,
    contended_blocks: Arc<AtomicU64>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let mut pull = GraphPull {
        graph,
        channels: desc.channels,
        scratch: vec![0.0; desc.block_size * desc.channels as usize],
        contended_blocks,
    };

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| pull.fill(data),
            |err| log::error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| TracksideError::AudioDevice(format!("Failed to build stream: {}", e)))
}
