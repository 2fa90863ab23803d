//! Variable table and port bindings.
//!
//! Slot indices are assigned at compile time in first-reference order and
//! are the only addressing scheme instructions use. Ports are plain slots
//! whose names are reserved; the VM resolves them to indices once per load.

use std::collections::HashMap;

pub const IN: &str = "in";
pub const IN_LEFT: &str = "inl";
pub const IN_RIGHT: &str = "inr";
pub const OUT: &str = "out";
pub const OUT_LEFT: &str = "outl";
pub const OUT_RIGHT: &str = "outr";
pub const CONTROLS: [&str; 4] = ["slider1", "slider2", "slider3", "slider4"];

/// Number of externally adjustable control slots.
pub const CONTROL_COUNT: usize = CONTROLS.len();

/// Ports the patch may read but never assign: they are overwritten from
/// outside the program.
pub fn is_read_only_port(name: &str) -> bool {
    matches!(name, IN | IN_LEFT | IN_RIGHT) || CONTROLS.contains(&name)
}

pub fn is_reserved(name: &str) -> bool {
    is_read_only_port(name) || matches!(name, OUT | OUT_LEFT | OUT_RIGHT)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub value: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableTable {
    slots: Vec<Variable>,
    index: HashMap<String, usize>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `name`, allocating a zero-initialised slot on first use.
    pub fn intern(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.slots.len();
        self.slots.push(Variable {
            name: name.to_string(),
            value: 0.0,
        });
        self.index.insert(name.to_string(), idx);
        idx
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.slots.iter()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<f32> {
        self.slots.get(idx).map(|v| v.value)
    }

    #[inline]
    pub fn set(&mut self, idx: usize, value: f32) {
        if let Some(slot) = self.slots.get_mut(idx) {
            slot.value = value;
        }
    }

    pub fn name_or_unknown(&self, idx: usize) -> &str {
        self.slots.get(idx).map_or("<unknown>", |v| v.name.as_str())
    }
}

/// Port slot indices resolved by name from one variable table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ports {
    pub input: Option<usize>,
    pub input_left: Option<usize>,
    pub input_right: Option<usize>,
    pub output: Option<usize>,
    pub output_left: Option<usize>,
    pub output_right: Option<usize>,
    pub controls: [Option<usize>; CONTROL_COUNT],
}

impl Ports {
    pub fn resolve(vars: &VariableTable) -> Self {
        Self {
            input: vars.find(IN),
            input_left: vars.find(IN_LEFT),
            input_right: vars.find(IN_RIGHT),
            output: vars.find(OUT),
            output_left: vars.find(OUT_LEFT),
            output_right: vars.find(OUT_RIGHT),
            controls: CONTROLS.map(|name| vars.find(name)),
        }
    }

    /// Write the input frame into whichever input ports the patch uses.
    #[inline]
    pub fn bind_inputs(&self, vars: &mut VariableTable, left: f32, right: f32) {
        if let Some(idx) = self.input {
            vars.set(idx, (left + right) / 2.0);
        }
        if let Some(idx) = self.input_left {
            vars.set(idx, left);
        }
        if let Some(idx) = self.input_right {
            vars.set(idx, right);
        }
    }

    /// `out` drives both channels when present; otherwise `outl`/`outr`,
    /// each silent when unbound.
    #[inline]
    pub fn read_outputs(&self, vars: &VariableTable) -> (f32, f32) {
        let read = |slot: Option<usize>| slot.and_then(|idx| vars.get(idx)).unwrap_or(0.0);
        match self.output {
            Some(idx) => {
                let v = vars.get(idx).unwrap_or(0.0);
                (v, v)
            }
            None => (read(self.output_left), read(self.output_right)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_stable() {
        let mut vars = VariableTable::new();
        assert_eq!(vars.intern("a"), 0);
        assert_eq!(vars.intern("b"), 1);
        assert_eq!(vars.intern("a"), 0);
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.get(1), Some(0.0));
    }

    #[test]
    fn set_out_of_range_is_ignored() {
        let mut vars = VariableTable::new();
        vars.set(3, 1.0);
        assert!(vars.is_empty());
        assert_eq!(vars.get(3), None);
    }

    #[test]
    fn reserved_names() {
        assert!(is_read_only_port("inl"));
        assert!(is_read_only_port("slider4"));
        assert!(!is_read_only_port("outl"));
        assert!(is_reserved("out"));
        assert!(!is_reserved("slider5"));
        assert!(!is_reserved("phase"));
    }

    #[test]
    fn ports_resolve_by_name() {
        let mut vars = VariableTable::new();
        vars.intern("phase");
        let outl = vars.intern("outl");
        let s2 = vars.intern("slider2");
        let ports = Ports::resolve(&vars);
        assert_eq!(ports.output_left, Some(outl));
        assert_eq!(ports.controls, [None, Some(s2), None, None]);
        assert_eq!(ports.input, None);
    }

    #[test]
    fn bind_inputs_mixes_mono() {
        let mut vars = VariableTable::new();
        let mono = vars.intern("in");
        let left = vars.intern("inl");
        let ports = Ports::resolve(&vars);
        ports.bind_inputs(&mut vars, 0.2, 0.6);
        assert!((vars.get(mono).unwrap() - 0.4).abs() < 1e-6);
        assert_eq!(vars.get(left), Some(0.2));
    }

    #[test]
    fn out_overrides_stereo_outputs() {
        let mut vars = VariableTable::new();
        let out = vars.intern("out");
        let outl = vars.intern("outl");
        vars.set(out, 0.3);
        vars.set(outl, 0.9);
        let ports = Ports::resolve(&vars);
        assert_eq!(ports.read_outputs(&vars), (0.3, 0.3));
    }

    #[test]
    fn unbound_outputs_are_silent() {
        let mut vars = VariableTable::new();
        let outr = vars.intern("outr");
        vars.set(outr, 0.7);
        let ports = Ports::resolve(&vars);
        assert_eq!(ports.read_outputs(&vars), (0.0, 0.7));
    }
}
