//! Output-stream callback: runs on the cpal audio thread.
//!
//! Pulls captured input from the input ring, hands input and output to the
//! process function, and never allocates after construction. Each cpal
//! buffer reaches the process function in exactly one call, so the VM
//! either renders all of it or silences all of it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::Consumer;
use ringbuf::HeapCons;

use super::ProcessFn;

/// State that lives on the audio thread. Accessed only from the cpal callback.
pub struct DuplexCallback {
    input: Option<HeapCons<f32>>,
    scratch: Box<[f32]>,
    process: ProcessFn,
    underruns: Arc<AtomicU64>,
}

impl DuplexCallback {
    /// `input` is `None` when the stream runs without a capture device;
    /// the process function then sees silence. `scratch_samples` should
    /// cover the largest buffer the stream delivers; input past it is
    /// read as silence.
    pub fn new(
        input: Option<HeapCons<f32>>,
        process: ProcessFn,
        scratch_samples: usize,
        underruns: Arc<AtomicU64>,
    ) -> Self {
        Self {
            input,
            scratch: vec![0.0; scratch_samples].into_boxed_slice(),
            process,
            underruns,
        }
    }

    /// Called by cpal for each output buffer.
    pub fn process(&mut self, output: &mut [f32]) {
        let len = output.len().min(self.scratch.len());
        let input = &mut self.scratch[..len];
        let filled = match self.input.as_mut() {
            Some(consumer) => consumer.pop_slice(input),
            None => 0,
        };
        if filled < input.len() {
            input[filled..].fill(0.0);
        }
        if self.input.is_some() && filled < output.len() {
            self.underruns.fetch_add(1, Ordering::Relaxed);
        }
        (self.process)(input, output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::{
        traits::{Producer, Split},
        HeapProd, HeapRb,
    };

    use crate::audio::offline::OfflineTransport;
    use crate::config::EngineConfig;
    use crate::dsl::compile;
    use crate::vm::{Acquire, VirtualMachine};

    fn passthrough() -> ProcessFn {
        Box::new(|input: &[f32], output: &mut [f32]| {
            output.fill(0.0);
            output[..input.len()].copy_from_slice(input);
        })
    }

    /// Helper: a callback that copies input to output, plus its input producer.
    fn setup(capacity: usize) -> (HeapProd<f32>, DuplexCallback, Arc<AtomicU64>) {
        let (prod, cons) = HeapRb::<f32>::new(capacity).split();
        let underruns = Arc::new(AtomicU64::new(0));
        let callback = DuplexCallback::new(Some(cons), passthrough(), 64, Arc::clone(&underruns));
        (prod, callback, underruns)
    }

    #[test]
    fn test_callback_forwards_captured_input() {
        let (mut prod, mut callback, underruns) = setup(16);
        prod.push_slice(&[0.1, 0.2, 0.3, 0.4]);

        let mut output = vec![0.0f32; 4];
        callback.process(&mut output);
        assert_eq!(output, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(underruns.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_callback_underrun_reads_silence() {
        let (mut prod, mut callback, underruns) = setup(16);
        prod.push_slice(&[0.5, 0.6]);

        let mut output = vec![999.0f32; 6];
        callback.process(&mut output);
        assert_eq!(output, vec![0.5, 0.6, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(underruns.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_callback_without_input_device() {
        let underruns = Arc::new(AtomicU64::new(0));
        let mut callback = DuplexCallback::new(None, passthrough(), 64, Arc::clone(&underruns));

        let mut output = vec![999.0f32; 8];
        callback.process(&mut output);
        assert!(output.iter().all(|&s| s == 0.0));
        assert_eq!(underruns.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_callback_persists_across_calls() {
        let (mut prod, mut callback, _) = setup(16);
        prod.push_slice(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8]);

        let mut first = vec![0.0f32; 4];
        callback.process(&mut first);
        let mut second = vec![0.0f32; 4];
        callback.process(&mut second);
        assert_eq!(first, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(second, vec![0.5, 0.6, 0.7, 0.8]);
    }

    #[test]
    fn test_oversized_buffer_is_one_call() {
        let (mut prod, cons) = HeapRb::<f32>::new(16).split();
        prod.push_slice(&[0.5; 8]);
        let calls = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&calls);
        let counter: ProcessFn = Box::new(move |input: &[f32], output: &mut [f32]| {
            seen.fetch_add(1, Ordering::Relaxed);
            assert_eq!(input.len(), 8);
            output.fill(input.len() as f32);
        });
        let underruns = Arc::new(AtomicU64::new(0));
        let mut callback = DuplexCallback::new(Some(cons), counter, 8, Arc::clone(&underruns));

        let mut output = vec![0.0f32; 100];
        callback.process(&mut output);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(output.iter().all(|&s| s == 8.0));
        assert_eq!(underruns.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_held_lock_silences_whole_oversized_buffer() {
        let (transport, _driver) = OfflineTransport::new();
        let (mut vm, _taps) = VirtualMachine::new(&EngineConfig::default(), Box::new(transport));
        vm.load(compile("out = 1").unwrap());
        vm.start().unwrap();
        let core = vm.core();

        let worker = Arc::clone(&core);
        let process: ProcessFn = Box::new(move |input: &[f32], output: &mut [f32]| {
            worker.process_block(input, output)
        });
        let mut callback = DuplexCallback::new(None, process, 16, Arc::new(AtomicU64::new(0)));

        let mut output = vec![9.0f32; 4096];
        {
            let _held = match core.try_acquire() {
                Acquire::Acquired(guard) => guard,
                Acquire::Busy => panic!("lock should be free"),
            };
            callback.process(&mut output);
        }
        assert!(output.iter().all(|&s| s == 0.0));

        callback.process(&mut output);
        assert!(output.iter().all(|&s| s == 1.0));
    }
}
