//! Embedded expression language evaluated against a record [`Context`].
//!
//! ```text
//! "http://h/p?queue=" + input.queue
//! {data: input, source: env.HOSTNAME}
//! "Authorization: Bearer " + env.TOKEN
//! ```

pub mod display;
mod eval;
mod lexer;
mod parser;

use crate::domain::context::Context;
use serde_json::Value;
use thiserror::Error;

pub use display::to_display_string;

/// Compile or runtime failure of an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("syntax error at offset {pos}: {message}")]
    Syntax { pos: usize, message: String },

    #[error("unknown name {name} (offset {pos})")]
    UnknownName { name: String, pos: usize },

    #[error("cannot fetch {key} from {from}")]
    CannotFetch { key: String, from: &'static str },

    #[error("index out of range: {index} (length {len})")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("invalid operation: {lhs} {op} {rhs}")]
    InvalidOperation {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("{operation}: expected {expected}, got {found}")]
    TypeMismatch {
        operation: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{function}(): {message}")]
    InvalidArgument {
        function: &'static str,
        message: String,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFiniteNumber,
}

impl EvalError {
    /// True when the failure was detected before evaluation started.
    pub fn is_compile_error(&self) -> bool {
        matches!(self, EvalError::Syntax { .. } | EvalError::UnknownName { .. })
    }
}

/// "Compile text, run against bound variables" capability.
pub trait Evaluator: Send + Sync {
    type Program: Send + Sync;

    fn compile(&self, source: &str) -> Result<Self::Program, EvalError>;

    fn run(&self, program: &Self::Program, ctx: &Context) -> Result<Value, EvalError>;

    fn evaluate(&self, source: &str, ctx: &Context) -> Result<Value, EvalError> {
        let program = self.compile(source)?;
        self.run(&program, ctx)
    }
}

/// A parsed expression, ready to run against any number of contexts.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    root: parser::Expr,
}

/// The built-in expression language.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprEvaluator;

impl Evaluator for ExprEvaluator {
    type Program = Program;

    fn compile(&self, source: &str) -> Result<Program, EvalError> {
        let root = parser::parse(source)?;
        Ok(Program { root })
    }

    fn run(&self, program: &Program, ctx: &Context) -> Result<Value, EvalError> {
        eval::evaluate(&program.root, ctx)
    }
}
