//! Error types for graph construction and inference.
//!
//! All failures cross the core's boundary as data; nothing in this crate
//! panics on malformed models in non-test code.

use crate::attribute::AttrKind;
use crate::ir::DType;

/// Errors raised while establishing shape/dtype/value facts for a graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IrError {
    /// A required attribute was absent from both the declaration and the
    /// corresponding input position, and no default applied.
    #[error("missing required attribute '{name}'")]
    MissingRequiredAttribute { name: String },

    /// An attribute was redefined with a different kind than its first
    /// assignment. The kind of an attribute never changes.
    #[error("attribute '{name}' redefined as {new:?}, previously {old:?}")]
    AttributeKindMismatch {
        name: String,
        old: AttrKind,
        new: AttrKind,
    },

    /// Arity or shape constraints of the operator were violated.
    #[error("malformed operator: {0}")]
    MalformedOperator(String),

    /// The operator cannot accept the given input dtypes.
    #[error("unsupported dtype combination: {0}")]
    UnsupportedDtypeCombination(String),

    /// A zero point is outside the representable range of the quantized
    /// tensor's element type.
    #[error("zero point {zero_point} outside the range of {dtype}")]
    QuantizationRangeViolation { zero_point: i64, dtype: DType },

    /// The graph is not a DAG. Pass-fatal: cycles are never valid in this IR.
    #[error("graph contains a cycle")]
    GraphCycleDetected,

    /// A node was visited before its inputs were resolved. Pass-fatal: this
    /// indicates a precondition violation by the caller, not an operator
    /// issue.
    #[error("internal ordering violation: {0}")]
    InternalOrderingViolation(String),
}
