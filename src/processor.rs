//! The per-operator inference contract and the capability traits it is
//! assembled from.
//!
//! The driver only ever talks to [`NodeProcessor`]; concrete operators gain
//! that interface by composing orthogonal capabilities:
//!
//! - [`SingleOutput`] for the common one-output case,
//! - [`QuantizedEltwise`] for fused quantized element-wise operators, which
//!   supply only the float-domain compute step,
//! - multi-output operators implement [`NodeProcessor`] directly.

use crate::attribute::AttributeStore;
use crate::error::IrError;
use crate::ir::{DType, OpKind, Shape, Tensor, TensorData};

/// Declared bounds on the number of input or output edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range { min: usize, max: usize },
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, actual: usize) -> bool {
        match *self {
            Arity::Exact(n) => actual == n,
            Arity::Range { min, max } => actual >= min && actual <= max,
            Arity::AtLeast(min) => actual >= min,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::Range { min, max } => write!(f, "between {min} and {max}"),
            Arity::AtLeast(min) => write!(f, "at least {min}"),
        }
    }
}

/// Arity bounds of one operator kind.
#[derive(Debug, Clone, Copy)]
pub struct OpSpec {
    pub inputs: Arity,
    pub outputs: Arity,
}

/// Everything a processor sees while inferring one node: snapshots of the
/// already-resolved inputs, the node's output tensors, and its attribute
/// store. Node inference is a pure function of this context.
pub struct InferenceCtx<'a> {
    pub op: OpKind,
    pub node_name: &'a str,
    pub inputs: &'a [Tensor],
    pub outputs: &'a mut [Tensor],
    pub attrs: &'a mut AttributeStore,
}

impl InferenceCtx<'_> {
    /// Resolved dtype of input `index`.
    pub fn input_dtype(&self, index: usize) -> Result<DType, IrError> {
        self.input(index)?.dtype.ok_or_else(|| {
            IrError::MalformedOperator(format!(
                "{}: input {index} has no resolved dtype",
                self.node_name
            ))
        })
    }

    /// Resolved shape of input `index`.
    pub fn input_shape(&self, index: usize) -> Result<&[usize], IrError> {
        self.input(index)?.shape.as_deref().ok_or_else(|| {
            IrError::MalformedOperator(format!(
                "{}: input {index} has no resolved shape",
                self.node_name
            ))
        })
    }

    /// Constant value of input `index`, when statically known.
    pub fn input_data(&self, index: usize) -> Option<&TensorData> {
        self.inputs.get(index).and_then(|t| t.data.as_ref())
    }

    pub fn input(&self, index: usize) -> Result<&Tensor, IrError> {
        self.inputs.get(index).ok_or_else(|| {
            IrError::MalformedOperator(format!("{}: missing input {index}", self.node_name))
        })
    }

    /// Record dtype and shape for output `index`.
    pub fn set_output(&mut self, index: usize, dtype: DType, shape: Shape) {
        let out = &mut self.outputs[index];
        out.dtype = Some(dtype);
        out.shape = Some(shape);
    }

    /// Record a fully folded constant for output `index`.
    pub fn set_output_data(&mut self, index: usize, data: TensorData) {
        let out = &mut self.outputs[index];
        out.dtype = Some(data.dtype());
        out.shape = Some(data.shape().to_vec());
        out.data = Some(data);
    }
}

/// The inference contract dispatched per node. This is the only interface
/// the driver depends on; it never names a concrete operator type.
pub trait NodeProcessor {
    /// Declared input/output arity bounds, validated by the driver before
    /// `infer` runs.
    fn spec(&self) -> OpSpec;

    /// Resolve output shapes and dtypes, and fold constant values where
    /// statically determinable.
    fn infer(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError>;

    /// Stateful operators are never constant-folded even when every input
    /// is known.
    fn is_stateful(&self) -> bool {
        false
    }
}

/// Capability: the operator produces exactly one output tensor.
pub trait SingleOutput {
    fn input_arity(&self) -> Arity;

    fn infer_one(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError>;

    fn stateful(&self) -> bool {
        false
    }
}

impl<T: SingleOutput> NodeProcessor for T {
    fn spec(&self) -> OpSpec {
        OpSpec {
            inputs: self.input_arity(),
            outputs: Arity::Exact(1),
        }
    }

    fn infer(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
        self.infer_one(ctx)
    }

    fn is_stateful(&self) -> bool {
        self.stateful()
    }
}

/// Capability: a fused quantized element-wise operator.
///
/// Implementors supply only the float-domain compute; parameter derivation,
/// dequantization and requantization follow the shared skeleton in
/// [`crate::node::qlinear`].
pub trait QuantizedEltwise {
    /// The float-domain computation applied after dequantization.
    fn float_compute(&self, a: f64, b: f64) -> f64;
}

impl<T: QuantizedEltwise> SingleOutput for T {
    fn input_arity(&self) -> Arity {
        // A, B, plus two scale/zero-point pairs for the inputs and one pair
        // for the output; the trailing output zero point may be omitted.
        Arity::Range { min: 7, max: 8 }
    }

    fn infer_one(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
        crate::node::qlinear::infer_quantized_eltwise(self, ctx)
    }
}

/// Propagate input 0's dtype and shape unchanged to output 0.
pub fn same_as_input(ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
    let dtype = ctx.input_dtype(0)?;
    let shape = ctx.input_shape(0)?.to_vec();
    ctx.set_output(0, dtype, shape);
    Ok(())
}

/// Propagate the broadcast of inputs 0 and 1 with promoted dtype to output 0.
pub fn same_as_input_broadcast(ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
    let a_dtype = ctx.input_dtype(0)?;
    let b_dtype = ctx.input_dtype(1)?;
    let dtype = crate::util::promote(a_dtype, b_dtype).ok_or_else(|| {
        IrError::UnsupportedDtypeCombination(format!(
            "{}: {a_dtype} and {b_dtype} do not promote",
            ctx.node_name
        ))
    })?;

    let a_shape = ctx.input_shape(0)?;
    let b_shape = ctx.input_shape(1)?;
    let shape = crate::util::broadcast_shape(a_shape, b_shape).ok_or_else(|| {
        IrError::MalformedOperator(format!(
            "{}: shapes {a_shape:?} and {b_shape:?} do not broadcast",
            ctx.node_name
        ))
    })?;

    ctx.set_output(0, dtype, shape);
    Ok(())
}

/// Registry: map an operator kind to its inference processor.
pub fn processor_for(op: OpKind) -> &'static dyn NodeProcessor {
    use crate::node;
    match op {
        OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div => {
            &node::arithmetic::ArithmeticProcessor
        }
        OpKind::Relu | OpKind::Neg | OpKind::Abs | OpKind::Sqrt => {
            &node::elementwise::UnaryProcessor
        }
        OpKind::MatMul => &node::matmul::MatMulProcessor,
        OpKind::Reshape => &node::reshape::ReshapeProcessor,
        OpKind::Transpose => &node::transpose::TransposeProcessor,
        OpKind::Concat => &node::concat::ConcatProcessor,
        OpKind::Cast => &node::cast::CastProcessor,
        OpKind::Constant => &node::constant::ConstantProcessor,
        OpKind::Split => &node::split::SplitProcessor,
        OpKind::QLinearAdd => &node::qlinear::QLinearAddProcessor,
        OpKind::QLinearMul => &node::qlinear::QLinearMulProcessor,
        OpKind::QuantizeLinear => &node::quantize_linear::QuantizeLinearProcessor,
        OpKind::DequantizeLinear => &node::quantize_linear::DequantizeLinearProcessor,
    }
}
