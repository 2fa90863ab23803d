//! Stereo sample frame.

/// One stereo sample pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
}

impl Frame {
    pub const SILENCE: Frame = Frame {
        left: 0.0,
        right: 0.0,
    };

    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// The same value on both channels.
    pub fn mono(value: f32) -> Self {
        Self {
            left: value,
            right: value,
        }
    }
}

impl From<(f32, f32)> for Frame {
    fn from((left, right): (f32, f32)) -> Self {
        Self { left, right }
    }
}

impl From<Frame> for (f32, f32) {
    fn from(frame: Frame) -> Self {
        (frame.left, frame.right)
    }
}
