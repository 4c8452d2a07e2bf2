//! Operator processors, one module per operator family.
//!
//! Each submodule provides the inference contract for one operator kind (or
//! a family sharing semantics): arity bounds, shape and dtype propagation,
//! and best-effort constant folding. The registry in [`crate::processor`]
//! maps [`crate::ir::OpKind`] values onto these processors.

#[cfg(test)]
pub mod test_utils;

pub mod arithmetic;
pub mod cast;
pub mod concat;
pub mod constant;
pub mod elementwise;
pub mod matmul;
pub mod qlinear;
pub mod quantize_linear;
pub mod reshape;
pub mod split;
pub mod transpose;
