//! sonovm: a per-sample DSP patch language and the virtual machine that
//! runs it inside a duplex audio stream.

pub mod audio;
pub mod config;
pub mod dsl;
pub mod frame;
pub mod live;
pub mod osc;
pub mod render;
pub mod source;
pub mod telemetry;
pub mod vm;
pub mod wav;
