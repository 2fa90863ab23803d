//! Abstract Syntax Tree for the patch language.
//!
//! A patch is a flat list of [`Statement`]s, executed top to bottom on
//! every sample tick.

use std::fmt::Write;

/// Source position of a node, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinaryOp {
    pub fn symbol(&self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
            BinaryOp::Rem => '%',
            BinaryOp::Pow => '^',
        }
    }
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: f32,
        pos: Pos,
    },
    Variable {
        name: String,
        pos: Pos,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: Pos,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Pos,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        pos: Pos,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Literal { pos, .. }
            | Expr::Variable { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::Binary { pos, .. }
            | Expr::Call { pos, .. } => *pos,
        }
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        let pad = "  ".repeat(depth);
        match self {
            Expr::Literal { value, .. } => {
                let _ = writeln!(out, "{pad}Literal {value}");
            }
            Expr::Variable { name, .. } => {
                let _ = writeln!(out, "{pad}Variable {name}");
            }
            Expr::Unary { operand, .. } => {
                let _ = writeln!(out, "{pad}Negate");
                operand.dump_into(out, depth + 1);
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let _ = writeln!(out, "{pad}Binary '{}'", op.symbol());
                left.dump_into(out, depth + 1);
                right.dump_into(out, depth + 1);
            }
            Expr::Call { name, args, .. } => {
                let _ = writeln!(out, "{pad}Call {name}");
                for arg in args {
                    arg.dump_into(out, depth + 1);
                }
            }
        }
    }
}

/// One top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign {
        target: String,
        value: Expr,
        pos: Pos,
    },
    Expr(Expr),
}

/// Render the statement list as an indented tree, one node per line.
///
/// Diagnostic output only; nothing parses it back.
pub fn dump(statements: &[Statement]) -> String {
    let mut out = String::new();
    for statement in statements {
        match statement {
            Statement::Assign { target, value, .. } => {
                let _ = writeln!(out, "Assign {target}");
                value.dump_into(&mut out, 1);
            }
            Statement::Expr(expr) => {
                let _ = writeln!(out, "Expression");
                expr.dump_into(&mut out, 1);
            }
        }
    }
    out
}
