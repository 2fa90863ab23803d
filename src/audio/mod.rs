//! Audio transport: duplex cpal streams feeding the VM one buffer at a time.
//!
//! The VM only sees a [`Transport`]: something that, once opened, calls a
//! [`ProcessFn`] from its own thread with interleaved stereo input and
//! output buffers. [`CpalTransport`] drives it from the default sound card;
//! [`offline::OfflineTransport`] lets the caller pull buffers by hand.
//!
//! Captured input reaches the output callback through a lock-free ring
//! buffer, so the two cpal callbacks never share a lock.

pub mod callback;
pub mod offline;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Producer, Split},
    HeapRb,
};
use tracing::{error, info, warn};

use callback::DuplexCallback;

/// Captured samples buffered between the input and output callbacks.
const INPUT_RING_CAPACITY: usize = 16384;

/// Callback scratch when the device does not report its buffer range.
const DEFAULT_SCRATCH_FRAMES: usize = 8192;

/// Upper bound on callback scratch, whatever the device reports.
const MAX_SCRATCH_FRAMES: usize = 65536;

/// Called once per buffer with interleaved stereo `(input, output)`.
pub type ProcessFn = Box<dyn FnMut(&[f32], &mut [f32]) + Send + 'static>;

/// Stream shape requested from a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub sample_rate: u32,
    pub input_channels: u16,
    pub output_channels: u16,
}

impl StreamSettings {
    pub fn stereo(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            input_channels: 2,
            output_channels: 2,
        }
    }
}

/// Transport errors.
#[derive(Debug)]
pub enum TransportError {
    /// No audio output device found.
    NoOutputDevice,
    /// Failed to build an audio stream.
    StreamBuild(String),
    /// Failed to start an audio stream.
    StreamPlay(String),
    /// The transport refused to open.
    Unavailable(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::NoOutputDevice => write!(f, "no audio output device found"),
            TransportError::StreamBuild(e) => write!(f, "stream build error: {e}"),
            TransportError::StreamPlay(e) => write!(f, "stream play error: {e}"),
            TransportError::Unavailable(e) => write!(f, "transport unavailable: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Something that periodically calls back into the VM.
pub trait Transport {
    /// Start calling `process`. Replaces any previously installed function.
    fn open(&mut self, settings: &StreamSettings, process: ProcessFn)
        -> Result<(), TransportError>;

    /// Stop calling back. Safe to call when already closed.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Buffers that found less captured input than they needed.
    fn input_underruns(&self) -> u64 {
        0
    }
}

/// Open streams. Dropping a `cpal::Stream` stops it.
struct Streams {
    _output: cpal::Stream,
    _input: Option<cpal::Stream>,
}

/// Duplex transport on the default cpal host.
///
/// Output is mandatory. When no capture device is present the output
/// stream still runs and the VM sees silence on the sound-card source.
#[derive(Default)]
pub struct CpalTransport {
    streams: Option<Streams>,
    underruns: Arc<AtomicU64>,
}

impl CpalTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for CpalTransport {
    fn open(
        &mut self,
        settings: &StreamSettings,
        process: ProcessFn,
    ) -> Result<(), TransportError> {
        self.close();

        let host = cpal::default_host();
        let output_device = host
            .default_output_device()
            .ok_or(TransportError::NoOutputDevice)?;

        let output_config = cpal::StreamConfig {
            channels: settings.output_channels,
            sample_rate: cpal::SampleRate(settings.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let input_config = cpal::StreamConfig {
            channels: settings.input_channels,
            ..output_config.clone()
        };

        let err_fn = |err: cpal::StreamError| {
            error!("audio stream error: {err}");
        };

        let (input_stream, input_consumer) = match host.default_input_device() {
            Some(device) => {
                let (mut producer, consumer) = HeapRb::<f32>::new(INPUT_RING_CAPACITY).split();
                let stream = device
                    .build_input_stream(
                        &input_config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            // Excess input is dropped when the output side lags.
                            producer.push_slice(data);
                        },
                        err_fn,
                        None,
                    )
                    .map_err(|e| TransportError::StreamBuild(e.to_string()))?;
                (Some(stream), Some(consumer))
            }
            None => {
                warn!("no audio input device; sound-card source will be silent");
                (None, None)
            }
        };

        let scratch_frames = match output_device.default_output_config() {
            Ok(supported) => scratch_frames(supported.buffer_size()),
            Err(e) => {
                warn!("could not query output buffer size: {e}");
                DEFAULT_SCRATCH_FRAMES
            }
        };
        let scratch_samples = scratch_frames * usize::from(settings.output_channels.max(1));
        let mut duplex = DuplexCallback::new(
            input_consumer,
            process,
            scratch_samples,
            Arc::clone(&self.underruns),
        );
        let output_stream = output_device
            .build_output_stream(
                &output_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    duplex.process(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| TransportError::StreamBuild(e.to_string()))?;

        if let Some(stream) = &input_stream {
            stream
                .play()
                .map_err(|e| TransportError::StreamPlay(e.to_string()))?;
        }
        output_stream
            .play()
            .map_err(|e| TransportError::StreamPlay(e.to_string()))?;

        info!(
            sample_rate = settings.sample_rate,
            duplex = input_stream.is_some(),
            "audio streams open"
        );
        self.streams = Some(Streams {
            _output: output_stream,
            _input: input_stream,
        });
        Ok(())
    }

    fn close(&mut self) {
        if self.streams.take().is_some() {
            info!("audio streams closed");
        }
    }

    fn is_open(&self) -> bool {
        self.streams.is_some()
    }

    fn input_underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

/// Frames of scratch needed to hand any buffer of the stream to the VM in
/// one call.
fn scratch_frames(buffer_size: &cpal::SupportedBufferSize) -> usize {
    match buffer_size {
        cpal::SupportedBufferSize::Range { max, .. } => {
            (*max as usize).clamp(DEFAULT_SCRATCH_FRAMES, MAX_SCRATCH_FRAMES)
        }
        cpal::SupportedBufferSize::Unknown => DEFAULT_SCRATCH_FRAMES,
    }
}
