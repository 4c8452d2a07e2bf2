//! Typed attribute storage attached to each node.
//!
//! An attribute may be declared up front by the front end or derived lazily
//! from the node's input tensors through an explicit fallback chain. Derived
//! values are cached in the store so repeated inference passes never
//! recompute them.

use std::collections::HashMap;

use crate::error::IrError;
use crate::ir::{Tensor, TensorData};

/// The kind tag of an attribute. Fixed at first assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Int,
    Float,
    IntList,
    FloatList,
    String,
    Tensor,
    Enum,
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f32),
    IntList(Vec<i64>),
    FloatList(Vec<f32>),
    String(String),
    Tensor(TensorData),
    /// A named member of an operator-specific enumeration (e.g. a dtype name
    /// or a rounding mode).
    Enum(String),
}

impl AttrValue {
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::Int(_) => AttrKind::Int,
            AttrValue::Float(_) => AttrKind::Float,
            AttrValue::IntList(_) => AttrKind::IntList,
            AttrValue::FloatList(_) => AttrKind::FloatList,
            AttrValue::String(_) => AttrKind::String,
            AttrValue::Tensor(_) => AttrKind::Tensor,
            AttrValue::Enum(_) => AttrKind::Enum,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            AttrValue::IntList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&TensorData> {
        match self {
            AttrValue::Tensor(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&str> {
        match self {
            AttrValue::Enum(v) => Some(v),
            _ => None,
        }
    }

    /// Interpret the value as a scalar `f32`, accepting either a declared
    /// float or a (scalar) tensor. This is the shape quantization scales
    /// arrive in from either source.
    pub fn to_scalar_f32(&self) -> Option<f32> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f32),
            AttrValue::Tensor(t) => t.scalar_f32(),
            _ => None,
        }
    }

    /// Interpret the value as a scalar `i64`, accepting either a declared
    /// int or a (scalar) integer tensor.
    pub fn to_scalar_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            AttrValue::Tensor(t) => t.scalar_i64(),
            _ => None,
        }
    }
}

/// One strategy in a derivation fallback chain, evaluated first-match.
#[derive(Debug, Clone)]
pub enum Fallback {
    /// Use the declared attribute value if one is present.
    Declared,
    /// Read the constant value of the input tensor at this position.
    InputTensor(usize),
    /// Fall back to a caller-computed default.
    Default(AttrValue),
}

/// Mapping from attribute name to typed value for one node.
#[derive(Debug, Default)]
pub struct AttributeStore {
    entries: HashMap<String, AttrValue>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a declared or previously derived value.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries.get(name)
    }

    /// Declare or overwrite a value. The kind of an attribute is fixed at
    /// first assignment; redefinition with a different kind is a defect.
    pub fn set(&mut self, name: impl Into<String>, value: AttrValue) -> Result<(), IrError> {
        let name = name.into();
        if let Some(existing) = self.entries.get(&name) {
            if existing.kind() != value.kind() {
                return Err(IrError::AttributeKindMismatch {
                    name,
                    old: existing.kind(),
                    new: value.kind(),
                });
            }
        }
        self.entries.insert(name, value);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Resolve an attribute through an ordered fallback chain and cache the
    /// result under `name`.
    ///
    /// The chain is evaluated first-match: a declared value wins over an
    /// input-tensor source, which wins over a computed default. An input
    /// position that is absent, or present but without a static value,
    /// yields nothing and the chain continues. An exhausted chain reports
    /// [`IrError::MissingRequiredAttribute`].
    ///
    /// Successful derivation stores the value, so later passes hit the
    /// `Declared` arm and never recompute.
    pub fn derive(
        &mut self,
        name: &str,
        chain: &[Fallback],
        inputs: &[Tensor],
    ) -> Result<AttrValue, IrError> {
        for source in chain {
            let found = match source {
                Fallback::Declared => self.entries.get(name).cloned(),
                Fallback::InputTensor(index) => inputs
                    .get(*index)
                    .and_then(|tensor| tensor.data.clone())
                    .map(AttrValue::Tensor),
                Fallback::Default(value) => Some(value.clone()),
            };
            if let Some(value) = found {
                log::debug!("derived attribute '{name}' from {source:?}");
                self.set(name, value.clone())?;
                return Ok(value);
            }
        }
        Err(IrError::MissingRequiredAttribute { name: name.into() })
    }

    /// Convenience: require a declared attribute, without derivation.
    pub fn require(&self, name: &str) -> Result<&AttrValue, IrError> {
        self.get(name)
            .ok_or_else(|| IrError::MissingRequiredAttribute { name: name.into() })
    }
}
