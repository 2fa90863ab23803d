//! Offline rendering: runs a patch through the VM without a sound card.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::audio::offline::OfflineTransport;
use crate::audio::TransportError;
use crate::config::EngineConfig;
use crate::frame::Frame;
use crate::vm::{Patch, VirtualMachine};

/// Frames per simulated callback buffer.
pub const BLOCK_FRAMES: usize = 512;

/// Interleaved stereo output plus what the runtime guard reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub samples: Vec<f32>,
    pub guard_trips: u64,
}

impl Rendered {
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}

/// Render `frames` frames of `patch`. The sound-card source sees silence.
pub fn render(
    config: &EngineConfig,
    patch: Patch,
    file_frames: Option<Arc<[Frame]>>,
    frames: usize,
) -> Result<Rendered, TransportError> {
    let (transport, driver) = OfflineTransport::new();
    let (mut vm, _taps) = VirtualMachine::new(config, Box::new(transport));
    if let Some(file_frames) = file_frames {
        vm.set_file_frames(file_frames);
    }
    vm.load(patch);
    vm.start()?;

    let silence = vec![0.0f32; BLOCK_FRAMES * 2];
    let mut samples = vec![0.0f32; frames * 2];
    for block in samples.chunks_mut(BLOCK_FRAMES * 2) {
        driver.render(&silence[..block.len()], block);
    }

    let guard_trips = vm.core().guard_trips();
    vm.stop();

    if guard_trips > 0 {
        warn!(guard_trips, "stack guard silenced some frames");
    }
    debug!(frames, "offline render complete");
    Ok(Rendered {
        samples,
        guard_trips,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::compile;
    use crate::source::SourceKind;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn renders_requested_length() {
        let rendered = render(
            &EngineConfig::default(),
            compile("out = 0.5").unwrap(),
            None,
            BLOCK_FRAMES + 7,
        )
        .unwrap();
        assert_eq!(rendered.frames(), BLOCK_FRAMES + 7);
        assert!(rendered.samples.iter().all(|&s| s == 0.5));
        assert_eq!(rendered.guard_trips, 0);
    }

    #[test]
    fn oscillator_patch_keeps_phase_across_blocks() {
        let src = "phase = mod1(phase + 0.01)\nout = sin1(phase)";
        let rendered = render(&EngineConfig::default(), compile(src).unwrap(), None, 1000).unwrap();
        // 100-frame period: frame n holds sin1((n + 1) * 0.01).
        let left: Vec<f32> = rendered.samples.iter().step_by(2).copied().collect();
        assert_approx_eq!(left[24], 1.0, 1e-3);
        assert_approx_eq!(left[624], 1.0, 1e-3);
        assert_approx_eq!(rendered.peak(), 1.0, 1e-3);
    }

    #[test]
    fn file_source_feeds_inputs() {
        let config = EngineConfig {
            source: SourceKind::File,
            ..EngineConfig::default()
        };
        let frames: Arc<[Frame]> = Arc::from(vec![Frame::new(0.1, 0.2), Frame::new(0.3, 0.4)]);
        let rendered = render(
            &config,
            compile("outl = inr\noutr = inl").unwrap(),
            Some(frames),
            3,
        )
        .unwrap();
        assert_eq!(rendered.samples, vec![0.2, 0.1, 0.4, 0.3, 0.2, 0.1]);
    }

    #[test]
    fn guard_trips_are_reported() {
        let config = EngineConfig {
            stack_capacity: 1,
            ..EngineConfig::default()
        };
        let rendered = render(&config, compile("out = 1 + 1").unwrap(), None, 10).unwrap();
        assert_eq!(rendered.guard_trips, 10);
        assert_eq!(rendered.peak(), 0.0);
    }
}
