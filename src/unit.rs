//! Translation output handed to the assembly stage

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::diagnostics::{Diagnostic, Severity};
use crate::lattice::Datatype;

/// Hand-written helper routine required by generated code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Include {
    Length,
    Span,
    Uspan,
    Hankel,
    Fft,
    Fftn,
    Ifft,
    Ifftn,
    Nextpow2,
    Math,
}

impl Include {
    /// Identifier of the helper or header the assembly stage must provide
    pub fn helper(self) -> &'static str {
        match self {
            Include::Length => "m2cpp::length",
            Include::Span => "m2cpp::span",
            Include::Uspan => "m2cpp::uspan",
            Include::Hankel => "m2cpp::hankel",
            Include::Fft => "m2cpp::fft",
            Include::Fftn => "m2cpp::fftn",
            Include::Ifft => "m2cpp::ifft",
            Include::Ifftn => "m2cpp::ifftn",
            Include::Nextpow2 => "m2cpp::nextpow2",
            Include::Math => "<cmath>",
        }
    }
}

impl fmt::Display for Include {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.helper())
    }
}

/// Everything produced by translating one program
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranslationUnit {
    /// Rendered statements in execution order, extracted temporaries first
    pub statements: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub includes: BTreeSet<Include>,
    /// Inferred declaration type per variable
    pub suggestions: BTreeMap<String, Datatype>,
    /// The program reads the process-wide wall clock
    pub uses_timer: bool,
}

impl TranslationUnit {
    /// Statements joined into program text
    pub fn code(&self) -> String {
        self.statements.join("\n")
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Export as JSON for downstream tooling
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
