//! Offline transport: buffers are pulled by the caller instead of a device.
//!
//! Used for rendering patches to files and for driving the VM in tests.

use std::sync::{Arc, Mutex, PoisonError};

use super::{ProcessFn, StreamSettings, Transport, TransportError};

type Slot = Arc<Mutex<Option<ProcessFn>>>;

/// The transport half, handed to the VM.
pub struct OfflineTransport {
    slot: Slot,
    settings: Option<StreamSettings>,
}

/// The driving half, kept by the caller.
#[derive(Clone)]
pub struct OfflineDriver {
    slot: Slot,
}

impl OfflineTransport {
    pub fn new() -> (Self, OfflineDriver) {
        let slot: Slot = Arc::new(Mutex::new(None));
        (
            Self {
                slot: Arc::clone(&slot),
                settings: None,
            },
            OfflineDriver { slot },
        )
    }

    /// Settings passed to the last successful `open`.
    pub fn settings(&self) -> Option<StreamSettings> {
        self.settings
    }
}

impl Transport for OfflineTransport {
    fn open(
        &mut self,
        settings: &StreamSettings,
        process: ProcessFn,
    ) -> Result<(), TransportError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(process);
        self.settings = Some(*settings);
        Ok(())
    }

    fn close(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn is_open(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl OfflineDriver {
    /// Run one buffer. Output is zeroed when the transport is closed.
    pub fn render(&self, input: &[f32], output: &mut [f32]) {
        match self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            Some(process) => process(input, output),
            None => output.fill(0.0),
        }
    }
}
