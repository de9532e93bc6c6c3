//! Node-scoped diagnostics
//!
//! Rules never abort the traversal. Problems are recorded here against the
//! node that raised them and translation continues with a best-effort
//! template.

use std::fmt;

use serde::Serialize;

use crate::ast::{Category, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Conformability violated by a multiplicative operator
    ShapeMismatch,
    /// Arithmetic or comparison on text
    NonNumericOperand,
    /// Argument count or shape combination without a rule
    UnsupportedConstruct,
    /// Reserved built-in used as a variable
    ReservedNameConflict,
    /// Reduction over a matrix without a literal axis
    AmbiguousAxis,
    /// Legal but probably not what was meant
    LikelyMisuse,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::AmbiguousAxis | DiagnosticKind::LikelyMisuse => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DiagnosticKind::ShapeMismatch => "shape mismatch",
            DiagnosticKind::NonNumericOperand => "non-numeric operand",
            DiagnosticKind::UnsupportedConstruct => "unsupported construct",
            DiagnosticKind::ReservedNameConflict => "reserved name",
            DiagnosticKind::AmbiguousAxis => "ambiguous axis",
            DiagnosticKind::LikelyMisuse => "likely misuse",
        };
        f.write_str(text)
    }
}

/// One diagnostic attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub node: NodeId,
    pub category: Category,
    /// Name of the node, or its category when unnamed
    pub label: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] in {:?} '{}': {}",
            self.severity, self.kind, self.category, self.label, self.message
        )
    }
}

/// Sink collecting diagnostics for one translation unit
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic; an identical one for the same node is kept once
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if self.items.contains(&diagnostic) {
            return;
        }
        log::debug!("{}", diagnostic);
        self.items.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
