//! Sine and quadrature-sine test tones.

use std::f64::consts::PI;

use super::SampleProducer;
use crate::frame::Frame;

/// Phase accumulator in cycles, kept in `[0, 1)`.
#[derive(Debug, Clone)]
struct Phasor {
    phase: f64,
    increment: f64,
}

impl Phasor {
    fn new(sample_rate: u32, frequency: f32) -> Self {
        Self {
            phase: 0.0,
            increment: frequency as f64 / sample_rate.max(1) as f64,
        }
    }

    /// Current phase in radians, then advance one sample.
    fn next(&mut self) -> f64 {
        let radians = self.phase * 2.0 * PI;
        self.phase = (self.phase + self.increment).fract();
        radians
    }
}

/// The same sine on both channels.
pub struct SineSource {
    phasor: Phasor,
    amplitude: f32,
}

impl SineSource {
    pub fn new(sample_rate: u32, frequency: f32, amplitude: f32) -> Self {
        Self {
            phasor: Phasor::new(sample_rate, frequency),
            amplitude,
        }
    }
}

impl SampleProducer for SineSource {
    fn next_frame(&mut self, _live: Frame) -> Frame {
        let value = self.phasor.next().sin() as f32 * self.amplitude;
        Frame::mono(value)
    }
}

/// Sine left, cosine right: a 90° phase pair.
pub struct QuadSineSource {
    phasor: Phasor,
    amplitude: f32,
}

impl QuadSineSource {
    pub fn new(sample_rate: u32, frequency: f32, amplitude: f32) -> Self {
        Self {
            phasor: Phasor::new(sample_rate, frequency),
            amplitude,
        }
    }
}

impl SampleProducer for QuadSineSource {
    fn next_frame(&mut self, _live: Frame) -> Frame {
        let radians = self.phasor.next();
        Frame::new(
            radians.sin() as f32 * self.amplitude,
            radians.cos() as f32 * self.amplitude,
        )
    }
}
