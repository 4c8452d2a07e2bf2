//! An intermediate representation for neural-network operator graphs, with
//! shape, dtype and constant-value inference.
//!
//! A front end builds a [`graph::Graph`] of [`ir::Node`]s connected by
//! [`ir::Tensor`]s, then hands it to [`infer::run`], which walks the graph
//! in dependency order and asks each operator's [`processor::NodeProcessor`]
//! to resolve its outputs. Inference is fail-soft: a broken node is reported
//! and its dependents skipped, while independent subgraphs keep resolving.
//!
//! Quantized operators carry per-tensor [`quant::QuantParams`] and fold
//! constants through an exact dequantize / compute / requantize pipeline
//! with round-half-to-even and saturating integer conversion.

pub mod attribute;
pub mod error;
pub mod graph;
pub mod infer;
pub mod ir;
pub mod node;
pub mod processor;
pub mod quant;
pub mod util;

pub use attribute::{AttrKind, AttrValue, AttributeStore, Fallback};
pub use error::IrError;
pub use graph::Graph;
pub use infer::{run, InferenceReport, NodeError};
pub use ir::{
    DType, Node, NodeId, OpKind, ResolutionState, Shape, Tensor, TensorData, TensorId, TensorValue,
};
pub use processor::{Arity, InferenceCtx, NodeProcessor, OpSpec, QuantizedEltwise, SingleOutput};
pub use quant::QuantParams;
