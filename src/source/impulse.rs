//! Periodic unit impulse.

use super::SampleProducer;
use crate::frame::Frame;

/// A single full-scale sample every `period` samples, starting on the first.
pub struct ImpulseSource {
    period: u64,
    counter: u64,
}

impl ImpulseSource {
    pub fn new(sample_rate: u32, interval_secs: f32) -> Self {
        let period = (sample_rate as f64 * interval_secs.max(0.0) as f64).round() as u64;
        Self {
            period: period.max(1),
            counter: 0,
        }
    }
}

impl SampleProducer for ImpulseSource {
    fn next_frame(&mut self, _live: Frame) -> Frame {
        let value = if self.counter == 0 { 1.0 } else { 0.0 };
        self.counter = (self.counter + 1) % self.period;
        Frame::mono(value)
    }
}
