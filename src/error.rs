//! Error types for the matrix script translator
//!
//! These are hard failures: a malformed source, an invalid declaration, or a
//! single statement that cannot be translated at all. Recoverable problems
//! found while inferring types are reported as [`crate::diagnostics`] instead.

use thiserror::Error;

use crate::diagnostics::DiagnosticKind;

/// Result type for translation operations
pub type CompileResult<T> = Result<T, CompileError>;

/// Translation errors
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Lexer error at position {position}: {message}")]
    LexerError { position: usize, message: String },

    #[error("Parser error: {message}")]
    ParseError { message: String },

    #[error("Variable name '{name}' is reserved, please rename the variable")]
    ReservedName { name: String },

    #[error("Unsupported construct: {message}")]
    Unsupported { message: String },

    #[error("Invalid declaration: {message}")]
    InvalidDeclaration { message: String },

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    pub fn parse_error(msg: impl Into<String>) -> Self {
        CompileError::ParseError { message: msg.into() }
    }

    pub fn reserved(name: impl Into<String>) -> Self {
        CompileError::ReservedName { name: name.into() }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        CompileError::Unsupported { message: msg.into() }
    }

    pub fn declaration(msg: impl Into<String>) -> Self {
        CompileError::InvalidDeclaration { message: msg.into() }
    }

    /// Diagnostic category used when this error is reported against a node
    pub fn diagnostic_kind(&self) -> DiagnosticKind {
        match self {
            CompileError::ReservedName { .. } => DiagnosticKind::ReservedNameConflict,
            _ => DiagnosticKind::UnsupportedConstruct,
        }
    }
}
