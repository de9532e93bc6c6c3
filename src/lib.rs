//! Matrix Script to Armadillo Translator
//!
//! This library translates scripts written in a dynamically typed matrix
//! language into statically typed C++ against the Armadillo linear-algebra
//! library. Every node of the parsed program gets a shape and a storage class,
//! and every statement is rendered as target text together with node-scoped
//! diagnostics.
//!
//! # Example
//!
//! ```rust
//! use matlab_to_armadillo::translate_with_declarations;
//!
//! let unit = translate_with_declarations("[r, c] = size(A)", &[("A", "mat")]).unwrap();
//! assert_eq!(unit.statements, vec!["r = A.n_rows ;", "c = A.n_cols ;"]);
//! ```

pub mod ast;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod lattice;
pub mod lexer;
pub mod operators;
pub mod parser;
pub mod reserved;
pub mod statements;
pub mod unit;

pub use ast::{Category, Node, NodeId, Tree};
pub use config::TranslatorConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use engine::Translator;
pub use error::{CompileError, CompileResult};
pub use lattice::{Datatype, Shape, StorageClass};
pub use parser::{parse, Parser};
pub use reserved::Reserved;
pub use unit::{Include, TranslationUnit};

/// Main translation function: parse a program and translate it with no
/// declared types
pub fn translate(source: &str) -> CompileResult<TranslationUnit> {
    translate_with_config(source, TranslatorConfig::new())
}

/// Translate with declared variable types, e.g. `("A", "mat")`
pub fn translate_with_declarations(
    source: &str,
    declarations: &[(&str, &str)],
) -> CompileResult<TranslationUnit> {
    let mut config = TranslatorConfig::new();
    for (name, type_name) in declarations {
        config.declare(name, type_name)?;
    }
    translate_with_config(source, config)
}

/// Translate under a full configuration
pub fn translate_with_config(
    source: &str,
    config: TranslatorConfig,
) -> CompileResult<TranslationUnit> {
    let mut tree = parse(source)?;
    let mut translator = Translator::with_config(config)?;
    Ok(translator.translate(&mut tree))
}
