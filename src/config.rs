//! Translator configuration
//!
//! Holds the declared-type table consulted when a variable's type cannot be
//! inferred from the program itself.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};
use crate::lattice::Datatype;
use crate::reserved::Reserved;

/// Configuration for one translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Declared type per variable name, e.g. `"A": "mat"`
    pub declarations: BTreeMap<String, Datatype>,
    /// Prefix of temporaries introduced by auxiliary extraction
    pub temp_prefix: String,
    /// Treat warnings like errors when deciding whether translation failed
    pub warnings_as_errors: bool,
}

impl TranslatorConfig {
    pub fn new() -> Self {
        Self {
            declarations: BTreeMap::new(),
            temp_prefix: "_aux".to_string(),
            warnings_as_errors: false,
        }
    }

    /// Load from a JSON document
    pub fn from_json(json: &str) -> CompileResult<Self> {
        let config: TranslatorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> CompileResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Declare `name` with an Armadillo type name such as `mat` or `uword`
    pub fn declare(&mut self, name: &str, type_name: &str) -> CompileResult<()> {
        let datatype: Datatype = type_name.parse()?;
        self.declare_type(name, datatype)
    }

    pub fn declare_type(&mut self, name: &str, datatype: Datatype) -> CompileResult<()> {
        if Reserved::from_name(name).is_some() {
            return Err(CompileError::reserved(name));
        }
        self.declarations.insert(name.to_string(), datatype);
        Ok(())
    }

    /// Reject declarations of reserved names
    pub fn validate(&self) -> CompileResult<()> {
        match self
            .declarations
            .keys()
            .find(|name| Reserved::from_name(name).is_some())
        {
            Some(name) => Err(CompileError::reserved(name.clone())),
            None => Ok(()),
        }
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::{Shape, StorageClass};

    #[test]
    fn test_declare_parses_type_names() {
        let mut config = TranslatorConfig::new();
        config.declare("A", "mat").unwrap();
        config.declare("n", "uword").unwrap();
        assert_eq!(
            config.declarations["A"],
            Datatype::new(Shape::Matrix, StorageClass::Float)
        );
        assert_eq!(config.declarations["n"], Datatype::scalar(StorageClass::Uword));
    }

    #[test]
    fn test_reserved_declaration_is_rejected() {
        let mut config = TranslatorConfig::new();
        let err = config.declare("size", "int").unwrap_err();
        assert!(matches!(err, CompileError::ReservedName { ref name } if name == "size"));
    }

    #[test]
    fn test_from_json() {
        let config =
            TranslatorConfig::from_json(r#"{"declarations": {"x": "cx_vec"}, "warnings_as_errors": true}"#)
                .unwrap();
        assert_eq!(config.declarations["x"].type_name(), "cx_vec");
        assert!(config.warnings_as_errors);
        assert_eq!(config.temp_prefix, "_aux");

        assert!(TranslatorConfig::from_json(r#"{"declarations": {"pi": "double"}}"#).is_err());
        assert!(TranslatorConfig::from_json(r#"{"declarations": {"x": "tensor"}}"#).is_err());
    }

    #[test]
    fn test_from_missing_file() {
        let err = TranslatorConfig::from_file("no/such/declarations.json").unwrap_err();
        assert!(matches!(err, CompileError::Io(_)));
    }
}
