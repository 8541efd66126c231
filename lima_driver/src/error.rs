//! Error types for the Lima driver core
//!
//! This module defines the error types used throughout the driver,
//! from symbol management and linking up to job submission.

use std::fmt;
use crate::symbol::SymbolKind;

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Driver errors
#[derive(Debug, Clone)]
pub enum Error {
    /// A symbol with this name already exists in the table
    DuplicateSymbol(String),

    /// No symbol with this name exists in the table
    SymbolNotFound(String),

    /// The symbol exists but is not of the kind the operation needs
    KindMismatch {
        name: String,
        expected: SymbolKind,
        found: SymbolKind,
    },

    /// Entry count, component count or byte footprint disagree with the symbol
    ShapeMismatch(String),

    /// Program linking failed; the program stays unusable
    Link(String),

    /// Operation called in the wrong state of the frame state machine
    InvalidState(String),

    /// Draw issued without a linked program or position attribute
    UnboundProgram(String),

    /// Argument out of range (vertex range, viewport, unknown handle)
    InvalidArgument(String),

    /// The kernel could not provide GPU-visible memory
    Allocation(String),

    /// The kernel rejected the job descriptor
    Submission(String),

    /// The hardware reported a fault or timeout while running the job
    Execution(String),

    /// The external shader compiler failed
    Compile(String),

    /// Kernel transport failure (poisoned lock, memory access)
    Backend(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateSymbol(name) => write!(f, "Duplicate symbol: {}", name),
            Error::SymbolNotFound(name) => write!(f, "Symbol not found: {}", name),
            Error::KindMismatch { name, expected, found } => write!(
                f,
                "Kind mismatch for symbol '{}': expected {:?}, found {:?}",
                name, expected, found
            ),
            Error::ShapeMismatch(msg) => write!(f, "Shape mismatch: {}", msg),
            Error::Link(msg) => write!(f, "Link error: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::UnboundProgram(msg) => write!(f, "Unbound program: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::Allocation(msg) => write!(f, "Allocation failed: {}", msg),
            Error::Submission(msg) => write!(f, "Submission failed: {}", msg),
            Error::Execution(msg) => write!(f, "Execution failed: {}", msg),
            Error::Compile(msg) => write!(f, "Shader compilation failed: {}", msg),
            Error::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
