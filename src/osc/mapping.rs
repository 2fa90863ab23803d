//! OSC message mapping: converts OSC addresses and arguments to VM control events.

use rosc::{OscMessage, OscType};
use serde::{Deserialize, Serialize};

use crate::source::SourceKind;
use crate::vm::variables::CONTROL_COUNT;
use crate::vm::MachineCore;

/// What an OSC message maps to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OscTarget {
    /// Set control `slider{n+1}` (expects a numeric arg).
    Control(usize),
    /// Switch the input source (expects a source name or an index).
    Source,
}

/// A mapping from an OSC address pattern to a target action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OscMapping {
    pub address_pattern: String,
    pub target: OscTarget,
}

/// A control-side change requested over OSC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    SetControl { id: usize, value: f32 },
    SetSource(SourceKind),
}

impl ControlEvent {
    pub fn apply(&self, core: &MachineCore) {
        match *self {
            ControlEvent::SetControl { id, value } => core.set_control(id, value),
            ControlEvent::SetSource(kind) => core.set_source(kind),
        }
    }
}

/// Apply an OSC message against mappings to produce a [`ControlEvent`].
pub fn apply_osc_message(msg: &OscMessage, mappings: &[OscMapping]) -> Option<ControlEvent> {
    let mapping = mappings
        .iter()
        .find(|m| osc_address_matches(&msg.addr, &m.address_pattern))?;

    match mapping.target {
        OscTarget::Control(id) if id < CONTROL_COUNT => {
            let value = extract_float(&msg.args, 0)?;
            Some(ControlEvent::SetControl { id, value })
        }
        OscTarget::Control(_) => None,
        OscTarget::Source => extract_source(&msg.args, 0).map(ControlEvent::SetSource),
    }
}

/// Exact address match.
fn osc_address_matches(addr: &str, pattern: &str) -> bool {
    addr == pattern
}

/// Extract a float from OSC args at the given index.
fn extract_float(args: &[OscType], index: usize) -> Option<f32> {
    args.get(index).and_then(|arg| match arg {
        OscType::Float(f) => Some(*f),
        OscType::Double(d) => Some(*d as f32),
        OscType::Int(i) => Some(*i as f32),
        _ => None,
    })
}

/// A source is named (`"noise"`) or indexed into [`SourceKind::ALL`].
fn extract_source(args: &[OscType], index: usize) -> Option<SourceKind> {
    match args.get(index)? {
        OscType::String(name) => name.parse().ok(),
        OscType::Int(i) => usize::try_from(*i)
            .ok()
            .and_then(|i| SourceKind::ALL.get(i).copied()),
        _ => None,
    }
}
