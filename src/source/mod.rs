//! Input sources: what feeds the `in`/`inl`/`inr` ports.
//!
//! Every source kind is a [`SampleProducer`]. All producers are built up
//! front so that switching sources on the audio thread is a field write,
//! never an allocation.

pub mod file;
pub mod impulse;
pub mod noise;
pub mod oscillator;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::frame::Frame;

pub use file::FilePlayer;
pub use impulse::ImpulseSource;
pub use noise::NoiseSource;
pub use oscillator::{QuadSineSource, SineSource};

/// Something that yields one input frame per tick.
///
/// `live` is the frame the transport delivered; generators that synthesise
/// their own signal ignore it.
pub trait SampleProducer: Send {
    fn next_frame(&mut self, live: Frame) -> Frame;
}

/// Selectable input source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Live input from the transport.
    #[default]
    Soundcard,
    /// Looped playback of preloaded frames.
    File,
    Noise,
    Sine,
    /// Sine on the left channel, cosine on the right.
    QuadSine,
    Impulse,
}

impl SourceKind {
    pub const ALL: [SourceKind; 6] = [
        SourceKind::Soundcard,
        SourceKind::File,
        SourceKind::Noise,
        SourceKind::Sine,
        SourceKind::QuadSine,
        SourceKind::Impulse,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Soundcard => "soundcard",
            SourceKind::File => "file",
            SourceKind::Noise => "noise",
            SourceKind::Sine => "sine",
            SourceKind::QuadSine => "quad_sine",
            SourceKind::Impulse => "impulse",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown source '{s}'"))
    }
}

/// Tuning for the synthetic generators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    #[serde(default = "default_sine_frequency")]
    pub sine_frequency: f32,
    #[serde(default = "default_sine_amplitude")]
    pub sine_amplitude: f32,
    /// Seconds between impulses.
    #[serde(default = "default_impulse_interval")]
    pub impulse_interval: f32,
    #[serde(default = "default_noise_seed")]
    pub noise_seed: u64,
}

fn default_sine_frequency() -> f32 {
    440.0
}

fn default_sine_amplitude() -> f32 {
    0.5
}

fn default_impulse_interval() -> f32 {
    1.0
}

fn default_noise_seed() -> u64 {
    42
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            sine_frequency: default_sine_frequency(),
            sine_amplitude: default_sine_amplitude(),
            impulse_interval: default_impulse_interval(),
            noise_seed: default_noise_seed(),
        }
    }
}

struct Passthrough;

impl SampleProducer for Passthrough {
    fn next_frame(&mut self, live: Frame) -> Frame {
        live
    }
}

/// One producer per [`SourceKind`] plus the current selection.
pub struct Sources {
    selected: SourceKind,
    soundcard: Passthrough,
    file: FilePlayer,
    noise: NoiseSource,
    sine: SineSource,
    quad_sine: QuadSineSource,
    impulse: ImpulseSource,
}

impl Sources {
    pub fn new(sample_rate: u32, settings: &SourceSettings) -> Self {
        Self {
            selected: SourceKind::default(),
            soundcard: Passthrough,
            file: FilePlayer::default(),
            noise: NoiseSource::new(settings.noise_seed),
            sine: SineSource::new(sample_rate, settings.sine_frequency, settings.sine_amplitude),
            quad_sine: QuadSineSource::new(
                sample_rate,
                settings.sine_frequency,
                settings.sine_amplitude,
            ),
            impulse: ImpulseSource::new(sample_rate, settings.impulse_interval),
        }
    }

    pub fn selected(&self) -> SourceKind {
        self.selected
    }

    pub fn select(&mut self, kind: SourceKind) {
        self.selected = kind;
    }

    /// Install frames for [`SourceKind::File`], returning the previous set
    /// so the caller can drop it outside any lock.
    pub fn set_file_frames(&mut self, frames: Arc<[Frame]>) -> Arc<[Frame]> {
        self.file.replace(frames)
    }

    #[inline]
    pub fn next_frame(&mut self, live: Frame) -> Frame {
        let producer: &mut dyn SampleProducer = match self.selected {
            SourceKind::Soundcard => &mut self.soundcard,
            SourceKind::File => &mut self.file,
            SourceKind::Noise => &mut self.noise,
            SourceKind::Sine => &mut self.sine,
            SourceKind::QuadSine => &mut self.quad_sine,
            SourceKind::Impulse => &mut self.impulse,
        };
        producer.next_frame(live)
    }
}
