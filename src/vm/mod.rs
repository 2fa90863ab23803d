//! Virtual machine: runs a compiled patch once per sample frame.
//!
//! All mutable machine state lives in one [`MachineState`] behind one mutex
//! inside [`MachineCore`]. Two kinds of caller share it:
//!
//! - the audio callback, which only ever *tries* the lock through
//!   [`MachineCore::try_acquire`] and substitutes silence for the whole
//!   buffer when the lock is busy;
//! - the control side (program loads, control values, source switching),
//!   which blocks on the lock but only holds it for pointer swaps and a few
//!   float writes.
//!
//! [`VirtualMachine`] wraps the core together with the audio transport. The
//! transport stays on the control thread; the core is `Send + Sync` and is
//! shared with the audio callback and other control surfaces via `Arc`.

pub mod filter;
pub mod instruction;
pub mod stack;
pub mod variables;

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use tracing::{debug, info, warn};

use crate::audio::{ProcessFn, StreamSettings, Transport, TransportError};
use crate::config::EngineConfig;
use crate::frame::Frame;
use crate::source::{SourceKind, Sources};
use crate::telemetry::{self, TelemetryTap, TelemetryWriter, TAP_COUNT};

use filter::FilterBank;
use instruction::{Instruction, Opcode, Program};
use stack::{OperandStack, StackError};
use variables::{Ports, Variable, VariableTable, CONTROL_COUNT};

/// Input peak meters fall by this factor once per processed buffer.
const LEVEL_DECAY: f32 = 0.9;

/// A compiled program together with the variable table it addresses.
///
/// The two are produced together and only ever swapped together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    pub program: Program,
    pub vars: VariableTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
}

/// Why a tick was abandoned. The tick outputs silence; nothing else changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeGuard {
    Stack(StackError),
    FilterArguments,
}

impl From<StackError> for RuntimeGuard {
    fn from(err: StackError) -> Self {
        RuntimeGuard::Stack(err)
    }
}

impl fmt::Display for RuntimeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeGuard::Stack(e) => write!(f, "{e}"),
            RuntimeGuard::FilterArguments => write!(f, "filter call does not match its state slot"),
        }
    }
}

impl std::error::Error for RuntimeGuard {}

/// Everything guarded by the control lock.
pub struct MachineState {
    run_state: RunState,
    program: Program,
    vars: VariableTable,
    ports: Ports,
    filters: FilterBank,
    stack: OperandStack,
    sources: Sources,
    telemetry: TelemetryWriter,
    levels: [f32; 2],
    guard_trips: u64,
}

impl MachineState {
    /// One sample frame. `live` is what the transport delivered.
    ///
    /// Allocation-free; cost is bounded by program length.
    pub fn tick(&mut self, live: Frame) -> Frame {
        if self.run_state == RunState::Stopped || self.program.is_empty() {
            // Scopes keep scrolling through silence.
            self.telemetry.push(Frame::SILENCE);
            return Frame::SILENCE;
        }

        let input = self.sources.next_frame(live);
        self.levels[0] = self.levels[0].max(input.left.abs());
        self.levels[1] = self.levels[1].max(input.right.abs());
        self.ports
            .bind_inputs(&mut self.vars, input.left, input.right);

        let output = match self.execute() {
            Ok(()) => Frame::from(self.ports.read_outputs(&self.vars)),
            Err(_) => {
                self.guard_trips += 1;
                Frame::SILENCE
            }
        };

        self.telemetry.push(output);
        output
    }

    fn execute(&mut self) -> Result<(), RuntimeGuard> {
        let Self {
            program,
            vars,
            stack,
            filters,
            ..
        } = self;

        stack.clear();
        for instruction in program.instructions() {
            match *instruction {
                Instruction::PushLiteral(value) => stack.push(value)?,
                Instruction::ReadVar(idx) => stack.push(vars.get(idx).unwrap_or(0.0))?,
                Instruction::WriteVar(idx) => vars.set(idx, stack.pop()?),
                Instruction::Simple(op) => apply(op, stack)?,
                Instruction::Filter { kind, args, site } => {
                    let y = {
                        let args = stack.pop_n(args)?;
                        filters.process(site, kind, args)
                    };
                    stack.push(y.ok_or(RuntimeGuard::FilterArguments)?)?;
                }
            }
        }
        Ok(())
    }
}

#[inline]
fn unary(stack: &mut OperandStack, f: impl Fn(f32) -> f32) -> Result<(), StackError> {
    let top = stack.top_mut()?;
    *top = f(*top);
    Ok(())
}

/// `f(first_pushed, second_pushed)`, so `a - b` computes `a - b`.
#[inline]
fn binary(stack: &mut OperandStack, f: impl Fn(f32, f32) -> f32) -> Result<(), StackError> {
    let (a, b) = stack.pop_pair()?;
    stack.push(f(a, b))
}

#[inline]
fn apply(op: Opcode, stack: &mut OperandStack) -> Result<(), StackError> {
    use std::f32::consts::TAU;

    match op {
        Opcode::Add => binary(stack, |a, b| a + b),
        Opcode::Sub => binary(stack, |a, b| a - b),
        Opcode::Mul => binary(stack, |a, b| a * b),
        Opcode::Div => binary(stack, |a, b| a / b),
        Opcode::Rem => binary(stack, |a, b| a % b),
        Opcode::Pow => binary(stack, f32::powf),
        // Quantise `a` to a multiple of `b`; a zero step leaves `a` alone.
        Opcode::Round => binary(stack, |a, b| if b != 0.0 { b * (a / b).round() } else { a }),
        Opcode::Neg => unary(stack, |a| -a),
        Opcode::Sin => unary(stack, f32::sin),
        Opcode::Cos => unary(stack, f32::cos),
        Opcode::Sin1 => unary(stack, |a| (TAU * a).sin()),
        Opcode::Cos1 => unary(stack, |a| (TAU * a).cos()),
        Opcode::Tan => unary(stack, f32::tan),
        Opcode::Tanh => unary(stack, f32::tanh),
        Opcode::Sqrt => unary(stack, f32::sqrt),
        Opcode::Abs => unary(stack, f32::abs),
        Opcode::Limit => unary(stack, |a| a.clamp(-1.0, 1.0)),
        Opcode::Mod1 => unary(stack, |a| a - a.trunc()),
        Opcode::Pop => stack.pop().map(|_| ()),
    }
}

/// Result of a non-blocking lock attempt.
pub enum Acquire<'a> {
    Acquired(MutexGuard<'a, MachineState>),
    Busy,
}

/// The shared, thread-safe part of the machine.
pub struct MachineCore {
    state: Mutex<MachineState>,
}

impl MachineCore {
    pub fn new(config: &EngineConfig) -> (Self, [TelemetryTap; TAP_COUNT]) {
        let (telemetry, taps) = telemetry::channel(config.telemetry_capacity);
        let mut sources = Sources::new(config.sample_rate, &config.sources);
        sources.select(config.source);

        let state = MachineState {
            run_state: RunState::Stopped,
            program: Program::default(),
            vars: VariableTable::new(),
            ports: Ports::default(),
            filters: FilterBank::default(),
            stack: OperandStack::new(config.stack_capacity.max(1)),
            sources,
            telemetry,
            levels: [0.0; 2],
            guard_trips: 0,
        };

        (
            Self {
                state: Mutex::new(state),
            },
            taps,
        )
    }

    /// Real-time entry: never blocks.
    pub fn try_acquire(&self) -> Acquire<'_> {
        match self.state.try_lock() {
            Ok(guard) => Acquire::Acquired(guard),
            // A panic elsewhere must not silence the machine forever.
            Err(TryLockError::Poisoned(poisoned)) => Acquire::Acquired(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Acquire::Busy,
        }
    }

    /// Control-path entry: blocks.
    fn lock(&self) -> MutexGuard<'_, MachineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a single frame. Returns silence if the lock is busy.
    pub fn tick(&self, in_left: f32, in_right: f32) -> (f32, f32) {
        match self.try_acquire() {
            Acquire::Acquired(mut state) => state.tick(Frame::new(in_left, in_right)).into(),
            Acquire::Busy => (0.0, 0.0),
        }
    }

    /// Run one callback buffer of interleaved stereo frames.
    ///
    /// If the lock is busy the whole of `output` is zeroed. Missing input
    /// frames read as silence.
    pub fn process_block(&self, input: &[f32], output: &mut [f32]) {
        let mut state = match self.try_acquire() {
            Acquire::Acquired(state) => state,
            Acquire::Busy => {
                output.fill(0.0);
                return;
            }
        };

        state.levels = state.levels.map(|l| l * LEVEL_DECAY);

        for (i, out) in output.chunks_mut(2).enumerate() {
            let live = match input.get(2 * i..2 * i + 2) {
                Some(&[left, right]) => Frame::new(left, right),
                _ => Frame::SILENCE,
            };
            let frame = state.tick(live);
            out[0] = frame.left;
            if let Some(right) = out.get_mut(1) {
                *right = frame.right;
            }
        }
    }

    /// Swap in a new program and variable table.
    ///
    /// Port resolution and filter-state allocation happen before the lock
    /// is taken; the previous patch is dropped after it is released.
    pub fn load(&self, patch: Patch) {
        let Patch { program, vars } = patch;
        let mut ports = Ports::resolve(&vars);
        let mut filters = FilterBank::new(program.filter_sites());
        let mut program = program;
        let mut vars = vars;

        {
            let mut state = self.lock();
            mem::swap(&mut state.program, &mut program);
            mem::swap(&mut state.vars, &mut vars);
            mem::swap(&mut state.ports, &mut ports);
            mem::swap(&mut state.filters, &mut filters);
            state.stack.clear();
            state.levels = [0.0; 2];
        }

        debug!(
            previous_instructions = program.len(),
            previous_variables = vars.len(),
            "released previous patch"
        );
    }

    /// Set control `id` (0-based) if the loaded patch reads it.
    pub fn set_control(&self, id: usize, value: f32) {
        if id >= CONTROL_COUNT {
            return;
        }
        let mut state = self.lock();
        if let Some(slot) = state.ports.controls[id] {
            state.vars.set(slot, value);
        }
    }

    /// Takes effect on the next tick.
    pub fn set_source(&self, kind: SourceKind) {
        self.lock().sources.select(kind);
    }

    pub fn source(&self) -> SourceKind {
        self.lock().sources.selected()
    }

    /// Frames looped by [`SourceKind::File`].
    pub fn set_file_frames(&self, frames: Arc<[Frame]>) {
        let _previous = self.lock().sources.set_file_frames(frames);
    }

    pub fn run_state(&self) -> RunState {
        self.lock().run_state
    }

    fn set_run_state(&self, run_state: RunState) {
        let mut state = self.lock();
        state.run_state = run_state;
        state.levels = [0.0; 2];
    }

    /// Decaying input peak levels, left and right.
    pub fn levels(&self) -> (f32, f32) {
        let state = self.lock();
        (state.levels[0], state.levels[1])
    }

    /// Ticks abandoned by the runtime guard since creation.
    pub fn guard_trips(&self) -> u64 {
        self.lock().guard_trips
    }

    /// Telemetry frames dropped because a consumer fell behind.
    pub fn telemetry_dropped(&self) -> u64 {
        self.lock().telemetry.dropped()
    }

    /// Current variable values, for inspection.
    pub fn variables(&self) -> Vec<Variable> {
        self.lock().vars.iter().cloned().collect()
    }

    /// Disassembly of the loaded program.
    pub fn disassemble(&self) -> String {
        let state = self.lock();
        state.program.disassemble(&state.vars)
    }
}

/// The machine plus its audio transport. Lives on the control thread.
pub struct VirtualMachine {
    core: Arc<MachineCore>,
    transport: Box<dyn Transport>,
    stream: StreamSettings,
}

impl VirtualMachine {
    pub fn new(
        config: &EngineConfig,
        transport: Box<dyn Transport>,
    ) -> (Self, [TelemetryTap; TAP_COUNT]) {
        let (core, taps) = MachineCore::new(config);
        let vm = Self {
            core: Arc::new(core),
            transport,
            stream: StreamSettings::stereo(config.sample_rate),
        };
        (vm, taps)
    }

    /// Shared handle for other threads.
    pub fn core(&self) -> Arc<MachineCore> {
        Arc::clone(&self.core)
    }

    /// Open the transport and start running. On failure the machine stays
    /// stopped and remains usable.
    pub fn start(&mut self) -> Result<(), TransportError> {
        if self.transport.is_open() {
            self.core.set_run_state(RunState::Stopped);
            self.transport.close();
        }

        let core = Arc::clone(&self.core);
        let process: ProcessFn = Box::new(move |input: &[f32], output: &mut [f32]| {
            core.process_block(input, output)
        });

        match self.transport.open(&self.stream, process) {
            Ok(()) => {
                self.core.set_run_state(RunState::Running);
                info!(sample_rate = self.stream.sample_rate, "virtual machine running");
                Ok(())
            }
            Err(e) => {
                warn!("transport failed to start: {e}");
                Err(e)
            }
        }
    }

    /// Stop running and close the transport. Always safe to call.
    pub fn stop(&mut self) {
        self.core.set_run_state(RunState::Stopped);
        if self.transport.is_open() {
            self.transport.close();
            info!("virtual machine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.core.run_state() == RunState::Running
    }

    /// Callback buffers that found less captured input than they needed.
    pub fn input_underruns(&self) -> u64 {
        self.transport.input_underruns()
    }

    pub fn load(&self, patch: Patch) {
        info!(
            instructions = patch.program.len(),
            variables = patch.vars.len(),
            "loading patch"
        );
        self.core.load(patch);
    }

    pub fn set_control(&self, id: usize, value: f32) {
        self.core.set_control(id, value);
    }

    pub fn set_source(&self, kind: SourceKind) {
        info!(source = %kind, "switching input source");
        self.core.set_source(kind);
    }

    pub fn set_file_frames(&self, frames: Arc<[Frame]>) {
        self.core.set_file_frames(frames);
    }

    pub fn tick(&self, in_left: f32, in_right: f32) -> (f32, f32) {
        self.core.tick(in_left, in_right)
    }
}

impl Drop for VirtualMachine {
    fn drop(&mut self) {
        self.stop();
    }
}
