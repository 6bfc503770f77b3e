//! Crate error taxonomy.
//!
//! Errors are localized to the smallest containing unit wherever possible:
//! only whole-file syntax errors are globally fatal, a spec block that fails
//! the comment grammar is skipped, and a throwing isolated re-execution is a
//! failed outcome for that one example.

use thiserror::Error;

/// The syntax tree could not be built even after normalization recovery.
///
/// Fatal for the whole file (status code 1), though callers still persist
/// whatever partial artifacts exist before propagating.
#[derive(Error, Debug)]
#[error("static analysis failure at line {line}: {message}")]
pub struct StaticAnalysisError {
    /// Zero-based source line of the failure.
    pub line: usize,
    pub message: String,
}

/// The traced program raised at runtime.
///
/// Captured as an exception marker on the enclosing return location; tracing
/// continues and the overall status code becomes 2.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct RuntimeFault {
    /// Python-style fault class name, e.g. `NameError`.
    pub kind: &'static str,
    pub message: String,
    /// Zero-based line the fault was raised on.
    pub line: usize,
}

impl RuntimeFault {
    pub fn new(kind: &'static str, message: impl Into<String>, line: usize) -> Self {
        RuntimeFault {
            kind,
            message: message.into(),
            line,
        }
    }
}

/// A comment block failed the example grammar. The block is skipped.
#[derive(Error, Debug)]
#[error("unparsable example comment at line {line}: {message}")]
pub struct SpecParseError {
    /// Zero-based line of the block-opening marker.
    pub line: usize,
    pub message: String,
}
