//! Built-in function table.
//!
//! Every callable name in the patch language is listed here together with
//! the number of arguments it accepts and the instruction it lowers to.

use crate::vm::filter::{FilterKind, MAX_FIR_TAPS};
use crate::vm::instruction::Opcode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Sin1,
    Cos1,
    Tan,
    Tanh,
    Sqrt,
    Abs,
    Pow,
    Round,
    Limit,
    Mod1,
    Fir,
    Biquad,
}

/// Accepted argument counts, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: usize,
}

impl Arity {
    const fn exact(n: usize) -> Self {
        Self { min: n, max: n }
    }

    pub fn accepts(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

/// What a call compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lowering {
    Simple(Opcode),
    Filter(FilterKind),
}

pub const ALL: [Function; 14] = [
    Function::Sin,
    Function::Cos,
    Function::Sin1,
    Function::Cos1,
    Function::Tan,
    Function::Tanh,
    Function::Sqrt,
    Function::Abs,
    Function::Pow,
    Function::Round,
    Function::Limit,
    Function::Mod1,
    Function::Fir,
    Function::Biquad,
];

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        ALL.iter().copied().find(|f| f.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Sin1 => "sin1",
            Function::Cos1 => "cos1",
            Function::Tan => "tan",
            Function::Tanh => "tanh",
            Function::Sqrt => "sqrt",
            Function::Abs => "abs",
            Function::Pow => "pow",
            Function::Round => "round",
            Function::Limit => "limit",
            Function::Mod1 => "mod1",
            Function::Fir => "fir",
            Function::Biquad => "biquad",
        }
    }

    /// Plain functions take exactly what their opcode consumes.
    pub fn arity(&self) -> Arity {
        match self.lowering() {
            Lowering::Simple(op) => Arity::exact(op.operands()),
            // input sample + b0 b1 b2 a1 a2
            Lowering::Filter(FilterKind::Biquad) => Arity::exact(6),
            // input sample + 1..=MAX_FIR_TAPS coefficients
            Lowering::Filter(FilterKind::Fir) => Arity {
                min: 2,
                max: MAX_FIR_TAPS + 1,
            },
        }
    }

    pub fn lowering(&self) -> Lowering {
        match self {
            Function::Sin => Lowering::Simple(Opcode::Sin),
            Function::Cos => Lowering::Simple(Opcode::Cos),
            Function::Sin1 => Lowering::Simple(Opcode::Sin1),
            Function::Cos1 => Lowering::Simple(Opcode::Cos1),
            Function::Tan => Lowering::Simple(Opcode::Tan),
            Function::Tanh => Lowering::Simple(Opcode::Tanh),
            Function::Sqrt => Lowering::Simple(Opcode::Sqrt),
            Function::Abs => Lowering::Simple(Opcode::Abs),
            Function::Pow => Lowering::Simple(Opcode::Pow),
            Function::Round => Lowering::Simple(Opcode::Round),
            Function::Limit => Lowering::Simple(Opcode::Limit),
            Function::Mod1 => Lowering::Simple(Opcode::Mod1),
            Function::Fir => Lowering::Filter(FilterKind::Fir),
            Function::Biquad => Lowering::Filter(FilterKind::Biquad),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for f in ALL {
            assert_eq!(Function::from_name(f.name()), Some(f));
        }
        assert_eq!(Function::from_name("foo"), None);
        assert_eq!(Function::from_name("SIN"), None);
    }

    #[test]
    fn arity_table() {
        assert!(Function::Sin.arity().accepts(1));
        assert!(!Function::Sin.arity().accepts(2));
        assert!(Function::Round.arity().accepts(2));
        assert!(Function::Pow.arity().accepts(2));
        assert!(!Function::Pow.arity().accepts(1));
        assert!(Function::Mod1.arity().accepts(1));
        assert!(Function::Biquad.arity().accepts(6));
        assert!(!Function::Biquad.arity().accepts(5));
        assert!(Function::Fir.arity().accepts(2));
        assert!(Function::Fir.arity().accepts(MAX_FIR_TAPS + 1));
        assert!(!Function::Fir.arity().accepts(1));
        assert!(!Function::Fir.arity().accepts(MAX_FIR_TAPS + 2));
    }

    #[test]
    fn stateful_functions_lower_to_filters() {
        assert_eq!(Function::Fir.lowering(), Lowering::Filter(FilterKind::Fir));
        assert_eq!(
            Function::Biquad.lowering(),
            Lowering::Filter(FilterKind::Biquad)
        );
        assert_eq!(Function::Tanh.lowering(), Lowering::Simple(Opcode::Tanh));
    }
}
