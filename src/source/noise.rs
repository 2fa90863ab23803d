//! White noise from a seeded RNG.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::SampleProducer;
use crate::frame::Frame;

/// Independent uniform noise in `[-1, 1)` on each channel.
pub struct NoiseSource {
    rng: ChaCha8Rng,
}

impl NoiseSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SampleProducer for NoiseSource {
    fn next_frame(&mut self, _live: Frame) -> Frame {
        Frame::new(self.rng.gen_range(-1.0..1.0), self.rng.gen_range(-1.0..1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_stays_in_range() {
        let mut noise = NoiseSource::new(7);
        for _ in 0..10_000 {
            let f = noise.next_frame(Frame::SILENCE);
            assert!((-1.0..1.0).contains(&f.left));
            assert!((-1.0..1.0).contains(&f.right));
        }
    }

    #[test]
    fn same_seed_same_noise() {
        let mut a = NoiseSource::new(42);
        let mut b = NoiseSource::new(42);
        for _ in 0..64 {
            assert_eq!(a.next_frame(Frame::SILENCE), b.next_frame(Frame::SILENCE));
        }
    }

    #[test]
    fn channels_are_decorrelated() {
        let mut noise = NoiseSource::new(1);
        let same = (0..256)
            .map(|_| noise.next_frame(Frame::SILENCE))
            .filter(|f| f.left == f.right)
            .count();
        assert!(same < 4);
    }
}
