//! Core IR types shared by every component: element types, tensor values,
//! graph tensors and operator nodes.

use std::fmt;

use half::f16;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::attribute::AttributeStore;
use crate::quant::QuantParams;

/// Unique identifier of a node inside its owning [`crate::graph::Graph`].
pub type NodeId = usize;

/// Unique identifier of a tensor inside its owning [`crate::graph::Graph`].
pub type TensorId = usize;

/// An ordered sequence of non-negative dimension sizes.
pub type Shape = Vec<usize>;

/// The element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum DType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F16,
    F32,
    F64,
    Bool,
}

impl DType {
    /// Whether this is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F16 | DType::F32 | DType::F64)
    }

    /// Whether this is an integer type (signed or unsigned).
    pub fn is_int(&self) -> bool {
        matches!(
            self,
            DType::I8
                | DType::I16
                | DType::I32
                | DType::I64
                | DType::U8
                | DType::U16
                | DType::U32
                | DType::U64
        )
    }

    /// Whether this is a signed numeric type.
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            DType::I8 | DType::I16 | DType::I32 | DType::I64 | DType::F16 | DType::F32 | DType::F64
        )
    }

    /// Bit width of one element.
    pub fn bit_width(&self) -> usize {
        match self {
            DType::I8 | DType::U8 | DType::Bool => 8,
            DType::I16 | DType::U16 | DType::F16 => 16,
            DType::I32 | DType::U32 | DType::F32 => 32,
            DType::I64 | DType::U64 | DType::F64 => 64,
        }
    }

    /// Representable range of an integer type as `(min, max)`.
    ///
    /// Returned in `i128` so that the full `u64` range fits. `None` for
    /// floating-point and bool types.
    pub fn int_range(&self) -> Option<(i128, i128)> {
        let range = match self {
            DType::I8 => (i8::MIN as i128, i8::MAX as i128),
            DType::I16 => (i16::MIN as i128, i16::MAX as i128),
            DType::I32 => (i32::MIN as i128, i32::MAX as i128),
            DType::I64 => (i64::MIN as i128, i64::MAX as i128),
            DType::U8 => (0, u8::MAX as i128),
            DType::U16 => (0, u16::MAX as i128),
            DType::U32 => (0, u32::MAX as i128),
            DType::U64 => (0, u64::MAX as i128),
            _ => return None,
        };
        Some(range)
    }
}

/// Typed element storage for a constant tensor value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TensorValue {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F16(Vec<f16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
}

/// An immutable n-dimensional constant value: a shape plus typed elements.
///
/// The element count always equals the product of the shape dimensions; an
/// empty shape denotes a scalar with exactly one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorData {
    shape: Shape,
    value: TensorValue,
}

impl TensorData {
    /// Create a tensor value.
    ///
    /// Panics when the element count does not match the shape; a tensor
    /// violating that invariant must never enter the graph, release builds
    /// included.
    pub fn new(shape: Shape, value: TensorValue) -> Self {
        let expected: usize = shape.iter().product();
        assert_eq!(expected, value_len(&value), "shape/element count mismatch");
        Self { shape, value }
    }

    /// Scalar constructor (empty shape).
    pub fn scalar(value: TensorValue) -> Self {
        Self::new(Shape::new(), value)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn value(&self) -> &TensorValue {
        &self.value
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        value_len(&self.value)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element type of the stored data.
    pub fn dtype(&self) -> DType {
        match &self.value {
            TensorValue::I8(_) => DType::I8,
            TensorValue::I16(_) => DType::I16,
            TensorValue::I32(_) => DType::I32,
            TensorValue::I64(_) => DType::I64,
            TensorValue::U8(_) => DType::U8,
            TensorValue::U16(_) => DType::U16,
            TensorValue::U32(_) => DType::U32,
            TensorValue::U64(_) => DType::U64,
            TensorValue::F16(_) => DType::F16,
            TensorValue::F32(_) => DType::F32,
            TensorValue::F64(_) => DType::F64,
            TensorValue::Bool(_) => DType::Bool,
        }
    }

    /// Reinterpret with a new shape of identical element count.
    pub fn with_shape(mut self, shape: Shape) -> Self {
        assert_eq!(
            shape.iter().product::<usize>(),
            self.len(),
            "shape/element count mismatch"
        );
        self.shape = shape;
        self
    }

    /// Convert all elements to `f64`, for any numeric dtype.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        let out = match &self.value {
            TensorValue::I8(v) => v.iter().map(|&x| x as f64).collect(),
            TensorValue::I16(v) => v.iter().map(|&x| x as f64).collect(),
            TensorValue::I32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorValue::I64(v) => v.iter().map(|&x| x as f64).collect(),
            TensorValue::U8(v) => v.iter().map(|&x| x as f64).collect(),
            TensorValue::U16(v) => v.iter().map(|&x| x as f64).collect(),
            TensorValue::U32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorValue::U64(v) => v.iter().map(|&x| x as f64).collect(),
            TensorValue::F16(v) => v.iter().map(|&x| f64::from(x)).collect(),
            TensorValue::F32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorValue::F64(v) => v.clone(),
            TensorValue::Bool(_) => return None,
        };
        Some(out)
    }

    /// Convert all elements to `i128`, for integer dtypes only.
    pub fn to_i128_vec(&self) -> Option<Vec<i128>> {
        let out = match &self.value {
            TensorValue::I8(v) => v.iter().map(|&x| x as i128).collect(),
            TensorValue::I16(v) => v.iter().map(|&x| x as i128).collect(),
            TensorValue::I32(v) => v.iter().map(|&x| x as i128).collect(),
            TensorValue::I64(v) => v.iter().map(|&x| x as i128).collect(),
            TensorValue::U8(v) => v.iter().map(|&x| x as i128).collect(),
            TensorValue::U16(v) => v.iter().map(|&x| x as i128).collect(),
            TensorValue::U32(v) => v.iter().map(|&x| x as i128).collect(),
            TensorValue::U64(v) => v.iter().map(|&x| x as i128).collect(),
            _ => return None,
        };
        Some(out)
    }

    /// Convert all elements to `usize`, for integer dtypes with non-negative
    /// elements. Useful for extracting shape or axis values.
    pub fn to_usize_vec(&self) -> Option<Vec<usize>> {
        self.to_i128_vec()?
            .into_iter()
            .map(|v| usize::try_from(v).ok())
            .collect()
    }

    /// Extract the first element as `f32`, converting from any numeric type.
    ///
    /// Useful for pulling scale parameters out of constant inputs.
    pub fn scalar_f32(&self) -> Option<f32> {
        self.to_f64_vec()?.first().map(|&v| v as f32)
    }

    /// Extract the first element as `i64`, converting from any integer type.
    pub fn scalar_i64(&self) -> Option<i64> {
        self.to_i128_vec()?.first().map(|&v| v as i64)
    }

    /// Build a tensor of the given float dtype from `f64` elements.
    ///
    /// Returns `None` when `dtype` is not a float type.
    pub fn from_f64(dtype: DType, values: Vec<f64>, shape: Shape) -> Option<Self> {
        let value = match dtype {
            DType::F16 => TensorValue::F16(values.into_iter().map(f16::from_f64).collect()),
            DType::F32 => TensorValue::F32(values.into_iter().map(|v| v as f32).collect()),
            DType::F64 => TensorValue::F64(values),
            _ => return None,
        };
        Some(Self::new(shape, value))
    }

    /// Build a tensor of the given integer dtype from `i128` elements.
    ///
    /// The caller guarantees every element is within the dtype's range;
    /// see [`crate::quant::requantize`] for the saturating path.
    pub fn from_i128(dtype: DType, values: Vec<i128>, shape: Shape) -> Option<Self> {
        let value = match dtype {
            DType::I8 => TensorValue::I8(values.into_iter().map(|v| v as i8).collect()),
            DType::I16 => TensorValue::I16(values.into_iter().map(|v| v as i16).collect()),
            DType::I32 => TensorValue::I32(values.into_iter().map(|v| v as i32).collect()),
            DType::I64 => TensorValue::I64(values.into_iter().map(|v| v as i64).collect()),
            DType::U8 => TensorValue::U8(values.into_iter().map(|v| v as u8).collect()),
            DType::U16 => TensorValue::U16(values.into_iter().map(|v| v as u16).collect()),
            DType::U32 => TensorValue::U32(values.into_iter().map(|v| v as u32).collect()),
            DType::U64 => TensorValue::U64(values.into_iter().map(|v| v as u64).collect()),
            _ => return None,
        };
        Some(Self::new(shape, value))
    }
}

fn value_len(value: &TensorValue) -> usize {
    match value {
        TensorValue::I8(v) => v.len(),
        TensorValue::I16(v) => v.len(),
        TensorValue::I32(v) => v.len(),
        TensorValue::I64(v) => v.len(),
        TensorValue::U8(v) => v.len(),
        TensorValue::U16(v) => v.len(),
        TensorValue::U32(v) => v.len(),
        TensorValue::U64(v) => v.len(),
        TensorValue::F16(v) => v.len(),
        TensorValue::F32(v) => v.len(),
        TensorValue::F64(v) => v.len(),
        TensorValue::Bool(v) => v.len(),
    }
}

/// One edge of the graph: a tensor flowing between nodes.
///
/// Front ends create tensors unresolved (dtype/shape/value absent or
/// partial); the inference driver fills them in exactly once per pass.
#[derive(Debug, Clone, Default)]
pub struct Tensor {
    /// Human-readable name from the source model, for diagnostics.
    pub name: String,

    /// Element type, once known.
    pub dtype: Option<DType>,

    /// Static shape, once known.
    pub shape: Option<Shape>,

    /// Constant value, when statically determinable.
    pub data: Option<TensorData>,

    /// Per-tensor quantization parameters; absent means plain float.
    pub quant: Option<QuantParams>,

    /// Producing node, or `None` for external graph inputs.
    pub(crate) producer: Option<NodeId>,

    /// Consuming nodes, in insertion order.
    pub(crate) consumers: Vec<NodeId>,
}

impl Tensor {
    /// A fresh unresolved tensor with only a name.
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A tensor whose dtype and shape are already known (e.g. a graph input).
    pub fn with_type(name: impl Into<String>, dtype: DType, shape: Shape) -> Self {
        Self {
            name: name.into(),
            dtype: Some(dtype),
            shape: Some(shape),
            ..Default::default()
        }
    }

    /// A fully constant tensor; dtype and shape come from the data.
    pub fn constant(name: impl Into<String>, data: TensorData) -> Self {
        Self {
            name: name.into(),
            dtype: Some(data.dtype()),
            shape: Some(data.shape().to_vec()),
            data: Some(data),
            ..Default::default()
        }
    }

    /// Both dtype and shape are known.
    pub fn is_resolved(&self) -> bool {
        self.dtype.is_some() && self.shape.is_some()
    }

    pub fn producer(&self) -> Option<NodeId> {
        self.producer
    }
}

/// Supported operator kinds (the node's type tag).
///
/// The kind selects which inference contract applies; the registry in
/// [`crate::processor`] maps each kind to its processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum OpKind {
    Abs,
    Add,
    Cast,
    Concat,
    Constant,
    DequantizeLinear,
    Div,
    MatMul,
    Mul,
    Neg,
    QLinearAdd,
    QLinearMul,
    QuantizeLinear,
    Relu,
    Reshape,
    Split,
    Sqrt,
    Sub,
    Transpose,
}

/// Resolution progress of a node's outputs.
///
/// A node may legitimately stop at `DtypeKnown` when its output value is not
/// statically determinable; stopping before `DtypeKnown` is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionState {
    #[default]
    Unresolved,
    ShapeKnown,
    DtypeKnown,
    ValueKnown,
}

/// One computation unit of the graph.
///
/// Nodes hold only ids into the owning graph, never owning pointers, so
/// reconvergent (diamond) paths carry no ownership cycles.
#[derive(Debug)]
pub struct Node {
    pub id: NodeId,
    pub op: OpKind,
    pub name: String,
    pub inputs: Vec<TensorId>,
    pub outputs: Vec<TensorId>,
    pub attrs: AttributeStore,
    pub(crate) state: ResolutionState,
}

impl Node {
    pub fn state(&self) -> ResolutionState {
        self.state
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.op, self.name)
    }
}
