//! Error types for parsing, generating and evaluating formulas.
//!
//! Numeric degradation (division by zero, short history, empty rows) is not an
//! error: those paths produce zeros. Everything here is a hard failure for the
//! formula at hand.

use crate::node::Arity;
use thiserror::Error;

/// Result type for formula operations.
pub type Result<T> = std::result::Result<T, FormulaError>;

/// Errors raised while reading the textual form of a formula.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// An opening brace has no matching closing brace, or vice versa
    #[error("Unbalanced braces in `{0}`")]
    UnbalancedBraces(String),

    /// Operator name is not registered
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// Number of comma-separated arguments does not fit the operator's arity
    #[error("Operator `{operator}` ({arity}) takes {expected} arguments, got {found}")]
    MalformedArgumentCount {
        /// Operator name
        operator: String,
        /// Arity class resolved from the registry
        arity: Arity,
        /// Arguments required by the arity class
        expected: usize,
        /// Arguments found in the text
        found: usize,
    },

    /// Token is neither a number where one is required nor a valid field name
    #[error("Malformed literal: `{0}`")]
    MalformedLiteral(String),
}

/// Errors raised while evaluating a tree against a panel.
///
/// Trees coming out of the parser or the generator never hit the operator
/// checks, but hand-built trees can.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// Operator name is not registered
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// Field is not present in the panel
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Tree node arity disagrees with the registered operator
    #[error("Operator `{operator}` is {expected}, node is {found}")]
    ArityMismatch {
        /// Operator name
        operator: String,
        /// Registered arity class
        expected: Arity,
        /// Arity class of the tree node
        found: Arity,
    },

    /// Operator was applied to the wrong number of operands
    #[error("Operator `{operator}` takes {expected} operands, got {found}")]
    OperandCount {
        /// Operator name
        operator: String,
        /// Operands required
        expected: usize,
        /// Operands supplied
        found: usize,
    },

    /// Operator needs per-instrument classification data the panel lacks
    #[error("Operator `{0}` requires an industry classification")]
    MissingClassification(String),

    /// Two operands do not share a shape
    #[error("Shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch {
        /// Shape of the left operand
        left: (usize, usize),
        /// Shape of the right operand
        right: (usize, usize),
    },
}

/// Top-level error for the crate.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Formula text could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Formula tree could not be evaluated
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// Panel arrays are inconsistent
    #[error("Invalid panel: {0}")]
    Panel(String),

    /// Missing required column in input data
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Generator or mutator configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Polars DataFrame error
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Formula library I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
