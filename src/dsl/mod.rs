//! Patch compiler: source text → tokens → statements → program.

pub mod ast;
pub mod compile;
pub mod error;
pub mod function;
pub mod lexer;
pub mod parser;
pub mod reader;
pub mod token;

pub use ast::{dump, Expr, Statement};
pub use error::{CompileError, ErrorKind};
pub use parser::ParseFailure;

use std::{panic, thread};

use compile::compile_program;
use lexer::Lexer;
use parser::Parser;

use crate::vm::Patch;

/// Stack reserved for the compiler thread. Parsing, code generation and
/// dropping the syntax tree all recurse once per tree level.
pub const COMPILER_STACK_SIZE: usize = 64 * 1024 * 1024;

/// A compiled patch together with its printed syntax tree.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub tree: String,
    pub patch: Patch,
}

/// Parse patch source into its statement list on the caller's thread.
///
/// Trees may be up to [`parser::MAX_NESTING`] levels deep; callers on small
/// stacks should prefer [`compile`] or [`inspect`].
pub fn parse(source: &str) -> Result<Vec<Statement>, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    Ok(Parser::new(tokens).parse()?)
}

/// Parse and compile patch source into a loadable [`Patch`].
///
/// Nothing is handed to the VM on failure, so a bad edit never replaces a
/// running program. Safe to call from any thread regardless of its stack.
pub fn compile(source: &str) -> Result<Patch, CompileError> {
    on_compiler_stack(|| {
        let statements = parse(source)?;
        compile_program(&statements)
    })
}

/// Like [`compile`], also returning the indented syntax tree.
pub fn inspect(source: &str) -> Result<Inspection, CompileError> {
    on_compiler_stack(|| {
        let statements = parse(source)?;
        let patch = compile_program(&statements)?;
        Ok(Inspection {
            tree: dump(&statements),
            patch,
        })
    })
}

/// Run a front-end job on a thread with [`COMPILER_STACK_SIZE`] of stack.
pub(crate) fn on_compiler_stack<T, F>(job: F) -> Result<T, CompileError>
where
    T: Send,
    F: FnOnce() -> Result<T, CompileError> + Send,
{
    thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name("patch-compiler".into())
            .stack_size(COMPILER_STACK_SIZE)
            .spawn_scoped(scope, job)
            .map_err(|e| {
                CompileError::compile(format!("could not start compiler thread: {e}"), 0, 0)
            })?;
        match worker.join() {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    })
}
