//! Telemetry taps: lock-free SPSC rings carrying output frames to
//! visualisation consumers.
//!
//! The audio thread is the only producer, each tap has exactly one
//! consumer. Neither side touches the VM control lock. When a consumer
//! falls behind, the newest frames are dropped; the producer never waits.

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};

use crate::frame::Frame;

/// Number of independent taps fed by the VM.
pub const TAP_COUNT: usize = 2;

/// Default ring capacity in frames. At 44.1 kHz this is roughly 750 ms of
/// slack for the consumer.
pub const DEFAULT_TELEMETRY_CAPACITY: usize = 32768;

/// Producer half, owned by the VM and written once per tick.
pub struct TelemetryWriter {
    producers: [HeapProd<Frame>; TAP_COUNT],
    dropped: u64,
}

impl TelemetryWriter {
    /// Push one frame into every tap, dropping it where a tap is full.
    #[inline]
    pub fn push(&mut self, frame: Frame) {
        for producer in self.producers.iter_mut() {
            if producer.try_push(frame).is_err() {
                self.dropped += 1;
            }
        }
    }

    /// Frames dropped so far, summed over all taps.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Consumer half, handed to a visualisation thread.
pub struct TelemetryTap {
    consumer: HeapCons<Frame>,
}

impl TelemetryTap {
    /// Frames ready to read.
    pub fn available(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn capacity(&self) -> usize {
        self.consumer.capacity().get()
    }

    /// Read up to `max` frames, oldest first.
    pub fn read(&mut self, max: usize) -> Vec<Frame> {
        self.consumer.pop_iter().take(max).collect()
    }

    /// Fill `buf` from the ring without allocating; returns frames written.
    pub fn read_into(&mut self, buf: &mut [Frame]) -> usize {
        self.consumer.pop_slice(buf)
    }
}

/// Build the writer and its taps. `capacity` is rounded up to a power of two.
pub fn channel(capacity: usize) -> (TelemetryWriter, [TelemetryTap; TAP_COUNT]) {
    let capacity = capacity.max(1).next_power_of_two();
    let (p0, c0) = HeapRb::<Frame>::new(capacity).split();
    let (p1, c1) = HeapRb::<Frame>::new(capacity).split();
    (
        TelemetryWriter {
            producers: [p0, p1],
            dropped: 0,
        },
        [
            TelemetryTap { consumer: c0 },
            TelemetryTap { consumer: c1 },
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_to_power_of_two() {
        let (_writer, taps) = channel(1000);
        assert_eq!(taps[0].capacity(), 1024);
        let (_writer, taps) = channel(DEFAULT_TELEMETRY_CAPACITY);
        assert_eq!(taps[1].capacity(), DEFAULT_TELEMETRY_CAPACITY);
    }

    #[test]
    fn both_taps_see_every_frame() {
        let (mut writer, [mut a, mut b]) = channel(8);
        writer.push(Frame::new(0.1, 0.2));
        writer.push(Frame::new(0.3, 0.4));
        assert_eq!(a.available(), 2);
        assert_eq!(
            a.read(10),
            vec![Frame::new(0.1, 0.2), Frame::new(0.3, 0.4)]
        );
        assert_eq!(b.read(1), vec![Frame::new(0.1, 0.2)]);
        assert_eq!(b.available(), 1);
        assert_eq!(a.available(), 0);
    }

    #[test]
    fn overflow_drops_newest() {
        let (mut writer, [mut a, _b]) = channel(4);
        for i in 0..6 {
            writer.push(Frame::mono(i as f32));
        }
        let frames = a.read(10);
        assert_eq!(
            frames,
            (0..4).map(|i| Frame::mono(i as f32)).collect::<Vec<_>>()
        );
        // Two frames lost on each of two taps.
        assert_eq!(writer.dropped(), 4);
    }

    #[test]
    fn read_into_does_not_allocate_past_buffer() {
        let (mut writer, [mut a, _b]) = channel(8);
        for i in 0..5 {
            writer.push(Frame::mono(i as f32));
        }
        let mut buf = [Frame::SILENCE; 3];
        assert_eq!(a.read_into(&mut buf), 3);
        assert_eq!(buf[2], Frame::mono(2.0));
        assert_eq!(a.available(), 2);
    }

    #[test]
    fn taps_are_independent_across_threads() {
        let (mut writer, [mut a, _b]) = channel(1024);
        let reader = std::thread::spawn(move || {
            let mut seen = Vec::new();
            while seen.len() < 500 {
                seen.extend(a.read(64));
                std::thread::yield_now();
            }
            seen
        });
        for i in 0..500 {
            writer.push(Frame::mono(i as f32));
        }
        let seen = reader.join().unwrap();
        assert_eq!(seen.len(), 500);
        assert!(seen.windows(2).all(|w| w[1].left == w[0].left + 1.0));
    }
}
