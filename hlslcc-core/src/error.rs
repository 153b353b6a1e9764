use crate::source::SourceArea;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("lexical error: {0}")]
    Lexical(String, Option<SourceArea>),

    #[error("syntax error: {0}")]
    Syntax(String, Option<SourceArea>),

    #[error("context error: {0}")]
    Semantic(String, Option<SourceArea>),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("code generation error: {0}")]
    CodeGen(String, Option<SourceArea>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant violation inside the compiler itself. Tests match on this
    /// variant to distinguish unexpected failures from ordinary diagnostics.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CompilerError {
    /// Source area the error refers to, if it carries one.
    pub fn area(&self) -> Option<SourceArea> {
        match self {
            CompilerError::Lexical(_, area)
            | CompilerError::Syntax(_, area)
            | CompilerError::Semantic(_, area)
            | CompilerError::CodeGen(_, area) => *area,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompilerError>;
