//! Catalog and loader error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building a catalog.
///
/// Every variant is a contract violation by the caller: the target type or
/// its constants do not have the shape a status error type must have. Soft
/// misses (unknown package, no service code, empty docs) never produce one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The target's underlying representation is not an integer kind.
    #[error("status error type underlying must be an int or uint, but got {type_name} ({underlying}) at line {line}")]
    NotAnInteger {
        type_name: String,
        underlying: String,
        line: usize,
    },

    /// A constant's resolved value is not an integer literal.
    #[error("status error constant {type_name}::{key} at line {line} has non-integer value `{value}`")]
    UnparseableConstant {
        type_name: String,
        key: String,
        value: String,
        line: usize,
    },

    /// Raw code plus service code does not fit in an i64.
    #[error("status error constant {type_name}::{key} at line {line}: code {raw} + service code {offset} overflows")]
    CodeOverflow {
        type_name: String,
        key: String,
        raw: i64,
        offset: i64,
        line: usize,
    },
}

impl CatalogError {
    /// Name of the target type the violation was found on.
    pub fn type_name(&self) -> &str {
        match self {
            CatalogError::NotAnInteger { type_name, .. }
            | CatalogError::UnparseableConstant { type_name, .. }
            | CatalogError::CodeOverflow { type_name, .. } => type_name,
        }
    }
}

/// Errors that can occur while loading Rust sources into a [`crate::Program`].
#[derive(Debug, Error)]
pub enum LoadError {
    /// Reading a source file or directory failed.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source text is not valid Rust.
    #[error("failed to parse module {module} at line {line}: {message}")]
    Parse {
        module: String,
        line: usize,
        message: String,
    },

    /// Two sources were registered for the same module path.
    #[error("module {0} was added more than once")]
    DuplicateModule(String),

    /// A module path does not start at `crate`.
    #[error("invalid module path `{0}`: must be `crate` or start with `crate::`")]
    InvalidModulePath(String),
}

impl LoadError {
    pub(crate) fn parse(module: &str, err: &syn::Error) -> Self {
        LoadError::Parse {
            module: module.to_string(),
            line: err.span().start().line,
            message: err.to_string(),
        }
    }
}
