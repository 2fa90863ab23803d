//! Looped playback of preloaded frames.
//!
//! Decoding happens elsewhere; this only walks a shared, immutable buffer.

use std::sync::Arc;

use super::SampleProducer;
use crate::frame::Frame;

pub struct FilePlayer {
    frames: Arc<[Frame]>,
    pos: usize,
}

impl Default for FilePlayer {
    fn default() -> Self {
        Self {
            frames: Arc::from(Vec::new()),
            pos: 0,
        }
    }
}

impl FilePlayer {
    pub fn new(frames: Arc<[Frame]>) -> Self {
        Self { frames, pos: 0 }
    }

    /// Swap in new frames and rewind. Returns the previous frames.
    pub fn replace(&mut self, frames: Arc<[Frame]>) -> Arc<[Frame]> {
        self.pos = 0;
        std::mem::replace(&mut self.frames, frames)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl SampleProducer for FilePlayer {
    fn next_frame(&mut self, _live: Frame) -> Frame {
        let Some(&frame) = self.frames.get(self.pos) else {
            return Frame::SILENCE;
        };
        self.pos = (self.pos + 1) % self.frames.len();
        frame
    }
}
