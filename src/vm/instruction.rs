//! Instruction set and compiled programs.

use std::fmt;
use std::fmt::Write;

use super::filter::FilterKind;
use super::variables::VariableTable;

/// Operand-free stack operations.
///
/// Binary ops pop two values and push one; unary ops rewrite the top of
/// the stack in place. `Pop` discards the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Round,
    Neg,
    Sin,
    Cos,
    Sin1,
    Cos1,
    Tan,
    Tanh,
    Sqrt,
    Abs,
    Limit,
    Mod1,
    Pop,
}

impl Opcode {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Rem => "REM",
            Opcode::Pow => "POW",
            Opcode::Round => "ROUND",
            Opcode::Neg => "NEG",
            Opcode::Sin => "SIN",
            Opcode::Cos => "COS",
            Opcode::Sin1 => "SIN1",
            Opcode::Cos1 => "COS1",
            Opcode::Tan => "TAN",
            Opcode::Tanh => "TANH",
            Opcode::Sqrt => "SQRT",
            Opcode::Abs => "ABS",
            Opcode::Limit => "LIMIT",
            Opcode::Mod1 => "MOD1",
            Opcode::Pop => "POP",
        }
    }

    /// Number of operands consumed from the stack.
    pub fn operands(&self) -> usize {
        match self {
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Rem
            | Opcode::Pow
            | Opcode::Round => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    Simple(Opcode),
    ReadVar(usize),
    WriteVar(usize),
    /// The literal's payload travels in the instruction itself.
    PushLiteral(f32),
    /// Stateful filter call. `site` indexes the per-call state slot.
    Filter {
        kind: FilterKind,
        args: usize,
        site: usize,
    },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Simple(op) => f.write_str(op.mnemonic()),
            Instruction::ReadVar(idx) => write!(f, "READ #{idx}"),
            Instruction::WriteVar(idx) => write!(f, "WRITE #{idx}"),
            Instruction::PushLiteral(v) => write!(f, "LOAD {v}"),
            Instruction::Filter { kind, args, site } => {
                write!(f, "{} {args} @{site}", kind.mnemonic())
            }
        }
    }
}

/// An immutable, linear instruction sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    instructions: Vec<Instruction>,
    filter_sites: usize,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        let filter_sites = instructions
            .iter()
            .filter_map(|i| match i {
                Instruction::Filter { site, .. } => Some(site + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        Self {
            instructions,
            filter_sites,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Number of distinct filter call sites.
    pub fn filter_sites(&self) -> usize {
        self.filter_sites
    }

    /// One mnemonic per line, variable names and literal values inlined.
    pub fn disassemble(&self, vars: &VariableTable) -> String {
        let mut out = String::new();
        for (pc, instruction) in self.instructions.iter().enumerate() {
            let _ = match instruction {
                Instruction::ReadVar(idx) => {
                    writeln!(out, "{pc:04} READ {}", vars.name_or_unknown(*idx))
                }
                Instruction::WriteVar(idx) => {
                    writeln!(out, "{pc:04} WRITE {}", vars.name_or_unknown(*idx))
                }
                other => writeln!(out, "{pc:04} {other}"),
            };
        }
        out
    }
}
