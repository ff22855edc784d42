//! SQL expression compiler used for default values and CHECK constraints.

mod expr;
mod lexer;
mod parser;

pub use expr::{BinaryOp, Expr, ExprRef, UnaryOp};
pub use parser::{parse_expr, MAX_EXPR_DEPTH};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error("unexpected character '{0}' in expression")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("syntax error near {0}")]
    Syntax(String),
    #[error("empty expression")]
    Empty,
    #[error("expression nesting is too deep")]
    TooDeep,
    #[error("serialized expression is corrupted at byte {0}")]
    Corrupted(usize),
    #[error("expression needs {needed} bytes, slot has {available}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("failed to allocate {size} bytes in {op}")]
    OutOfMemory { size: usize, op: &'static str },
}
