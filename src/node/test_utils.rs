//! Test helper for exercising a single processor without a full graph.

use crate::attribute::{AttrValue, AttributeStore};
use crate::error::IrError;
use crate::ir::{DType, OpKind, Shape, Tensor, TensorData};
use crate::processor::{processor_for, InferenceCtx};

/// Builds one node's inference context and runs its processor.
pub struct NodeBuilder {
    op: OpKind,
    name: String,
    inputs: Vec<Tensor>,
    outputs: Vec<Tensor>,
    attrs: AttributeStore,
}

impl NodeBuilder {
    pub fn new(op: OpKind, name: &str) -> Self {
        Self {
            op,
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attrs: AttributeStore::new(),
        }
    }

    /// A typed but non-constant input.
    pub fn input_tensor(mut self, name: &str, dtype: DType, shape: Shape) -> Self {
        self.inputs.push(Tensor::with_type(name, dtype, shape));
        self
    }

    /// A constant input carrying data.
    pub fn input_constant(mut self, name: &str, data: TensorData) -> Self {
        self.inputs.push(Tensor::constant(name, data));
        self
    }

    /// An input that exists but has neither type nor value.
    pub fn input_unresolved(mut self, name: &str) -> Self {
        self.inputs.push(Tensor::unresolved(name));
        self
    }

    pub fn output(mut self, name: &str) -> Self {
        self.outputs.push(Tensor::unresolved(name));
        self
    }

    pub fn attr(mut self, name: &str, value: AttrValue) -> Self {
        self.attrs.set(name, value).unwrap();
        self
    }

    /// Run the registered processor (arity checks included) and return the
    /// mutated outputs.
    pub fn infer(mut self) -> Result<Vec<Tensor>, IrError> {
        let processor = processor_for(self.op);
        let spec = processor.spec();
        if !spec.inputs.accepts(self.inputs.len()) {
            return Err(IrError::MalformedOperator(format!(
                "{}: expects {} inputs, got {}",
                self.name,
                spec.inputs,
                self.inputs.len()
            )));
        }
        let mut ctx = InferenceCtx {
            op: self.op,
            node_name: &self.name,
            inputs: &self.inputs,
            outputs: &mut self.outputs,
            attrs: &mut self.attrs,
        };
        processor.infer(&mut ctx)?;
        Ok(self.outputs)
    }
}
