//! Code generation: lowers the statement list to a linear [`Program`].
//!
//! Expressions are emitted post-order so every operator finds its operands
//! on the stack. The variable table is built on the way: the first reference
//! to a name allocates the next slot.
//!
//! Discard policy: a bare expression statement is evaluated for its side
//! effects (filter state advances) and its result is dropped with `POP`, so
//! the stack is empty at the end of every statement.

use crate::vm::instruction::{Instruction, Opcode, Program};
use crate::vm::variables::{self, VariableTable};
use crate::vm::Patch;

use super::ast::*;
use super::error::CompileError;
use super::function::{Function, Lowering};

struct CodeGen {
    code: Vec<Instruction>,
    vars: VariableTable,
    filter_sites: usize,
}

/// Compile a parsed statement list into a program and its variable table.
pub fn compile_program(statements: &[Statement]) -> Result<Patch, CompileError> {
    let mut gen = CodeGen {
        code: Vec::new(),
        vars: VariableTable::new(),
        filter_sites: 0,
    };

    for statement in statements {
        gen.statement(statement)?;
    }

    Ok(Patch {
        program: Program::new(gen.code),
        vars: gen.vars,
    })
}

impl CodeGen {
    fn statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Assign { target, value, pos } => {
                if variables::is_read_only_port(target) {
                    return Err(CompileError::compile(
                        format!("'{target}' is driven from outside the patch and cannot be assigned"),
                        pos.line,
                        pos.col,
                    ));
                }
                let slot = self.vars.intern(target);
                self.expr(value)?;
                self.code.push(Instruction::WriteVar(slot));
            }
            Statement::Expr(expr) => {
                self.expr(expr)?;
                self.code.push(Instruction::Simple(Opcode::Pop));
            }
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Literal { value, .. } => {
                self.code.push(Instruction::PushLiteral(*value));
            }
            Expr::Variable { name, .. } => {
                let slot = self.vars.intern(name);
                self.code.push(Instruction::ReadVar(slot));
            }
            Expr::Unary { op, operand, .. } => {
                self.expr(operand)?;
                let opcode = match op {
                    UnaryOp::Neg => Opcode::Neg,
                };
                self.code.push(Instruction::Simple(opcode));
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                self.expr(left)?;
                self.expr(right)?;
                let opcode = match op {
                    BinaryOp::Add => Opcode::Add,
                    BinaryOp::Sub => Opcode::Sub,
                    BinaryOp::Mul => Opcode::Mul,
                    BinaryOp::Div => Opcode::Div,
                    BinaryOp::Rem => Opcode::Rem,
                    BinaryOp::Pow => Opcode::Pow,
                };
                self.code.push(Instruction::Simple(opcode));
            }
            Expr::Call { name, args, pos } => self.call(name, args, *pos)?,
        }
        Ok(())
    }

    fn call(&mut self, name: &str, args: &[Expr], pos: Pos) -> Result<(), CompileError> {
        let function = Function::from_name(name).ok_or_else(|| {
            CompileError::compile(format!("unknown function '{name}'"), pos.line, pos.col)
        })?;

        let arity = function.arity();
        if !arity.accepts(args.len()) {
            let expected = if arity.min == arity.max {
                format!("{}", arity.min)
            } else {
                format!("{} to {}", arity.min, arity.max)
            };
            // Point at the first surplus argument when there is one.
            let at = args.get(arity.max).map_or(pos, Expr::pos);
            return Err(CompileError::compile(
                format!(
                    "function '{name}' expects {expected} argument(s), got {}",
                    args.len()
                ),
                at.line,
                at.col,
            ));
        }

        for arg in args {
            self.expr(arg)?;
        }

        let instruction = match function.lowering() {
            Lowering::Simple(op) => Instruction::Simple(op),
            Lowering::Filter(kind) => {
                let site = self.filter_sites;
                self.filter_sites += 1;
                Instruction::Filter {
                    kind,
                    args: args.len(),
                    site,
                }
            }
        };
        self.code.push(instruction);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::error::ErrorKind;
    use crate::dsl::parse;
    use crate::vm::filter::FilterKind;

    fn compile(src: &str) -> Result<Patch, CompileError> {
        compile_program(&parse(src)?)
    }

    #[test]
    fn assignment_emits_post_order() {
        let patch = compile("outl = 0.5 + x").unwrap();
        let x = patch.vars.find("x").unwrap();
        let outl = patch.vars.find("outl").unwrap();
        assert_eq!(
            patch.program.instructions(),
            &[
                Instruction::PushLiteral(0.5),
                Instruction::ReadVar(x),
                Instruction::Simple(Opcode::Add),
                Instruction::WriteVar(outl),
            ]
        );
    }

    #[test]
    fn subtraction_keeps_textual_operand_order() {
        let patch = compile("d = a - b").unwrap();
        let a = patch.vars.find("a").unwrap();
        let b = patch.vars.find("b").unwrap();
        assert_eq!(
            &patch.program.instructions()[..3],
            &[
                Instruction::ReadVar(a),
                Instruction::ReadVar(b),
                Instruction::Simple(Opcode::Sub),
            ]
        );
    }

    #[test]
    fn variables_in_first_reference_order() {
        let patch = compile("b = a\nc = b + d").unwrap();
        let names: Vec<&str> = patch.vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c", "d"]);
        assert!(patch.vars.iter().all(|v| v.value == 0.0));
    }

    #[test]
    fn bare_expression_is_popped() {
        let patch = compile("sin(1)").unwrap();
        assert_eq!(
            patch.program.instructions(),
            &[
                Instruction::PushLiteral(1.0),
                Instruction::Simple(Opcode::Sin),
                Instruction::Simple(Opcode::Pop),
            ]
        );
    }

    #[test]
    fn functions_map_to_opcodes() {
        let patch = compile("y = round(limit(x), 0.1)").unwrap();
        let ops: Vec<Instruction> = patch.program.instructions().to_vec();
        assert!(ops.contains(&Instruction::Simple(Opcode::Limit)));
        assert!(ops.contains(&Instruction::Simple(Opcode::Round)));
    }

    #[test]
    fn filter_calls_get_distinct_sites() {
        let patch = compile("a = fir(in, 0.5, 0.5)\nb = biquad(in, 1, 0, 0, 0, 0)").unwrap();
        let filters: Vec<Instruction> = patch
            .program
            .instructions()
            .iter()
            .copied()
            .filter(|i| matches!(i, Instruction::Filter { .. }))
            .collect();
        assert_eq!(
            filters,
            vec![
                Instruction::Filter {
                    kind: FilterKind::Fir,
                    args: 3,
                    site: 0
                },
                Instruction::Filter {
                    kind: FilterKind::Biquad,
                    args: 6,
                    site: 1
                },
            ]
        );
        assert_eq!(patch.program.filter_sites(), 2);
    }

    #[test]
    fn unknown_function_is_an_error() {
        let err = compile("outl = foo(1)").unwrap_err();
        assert_eq!(err.kind, ErrorKind::CompileError);
        assert_eq!((err.line, err.col), (1, 8));
        assert!(err.message.contains("foo"));
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let err = compile("x = pow(2)").unwrap_err();
        assert_eq!(err.kind, ErrorKind::CompileError);
        assert!(err.message.contains("expects 2"));

        let err = compile("x = sin(1, 2)").unwrap_err();
        assert_eq!((err.line, err.col), (1, 12));
        let err = compile("x = pow(2)").unwrap_err();
        assert_eq!((err.line, err.col), (1, 5));
        assert!(compile("x = biquad(in, 1, 0)").is_err());
        assert!(compile("x = fir(in)").is_err());
    }

    #[test]
    fn assigning_input_ports_is_rejected() {
        for src in ["inl = 1", "in = 0", "slider3 = 0.5"] {
            let err = compile(src).unwrap_err();
            assert_eq!(err.kind, ErrorKind::CompileError, "{src}");
        }
        assert!(compile("out = 1").is_ok());
        assert!(compile("outr = 1").is_ok());
    }

    #[test]
    fn reading_ports_is_fine() {
        let patch = compile("out = in * slider1").unwrap();
        assert!(patch.vars.find("in").is_some());
        assert!(patch.vars.find("slider1").is_some());
    }
}
