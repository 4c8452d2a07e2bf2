//! Split: divide one tensor into equal parts along an axis.
//!
//! The only multi-output operator in the set, so it implements the node
//! contract directly instead of going through the single-output capability.
//! Each output receives the input dtype and the evenly divided shape; values
//! are never folded.

use crate::attribute::AttrValue;
use crate::error::IrError;
use crate::processor::{Arity, InferenceCtx, NodeProcessor, OpSpec};

pub struct SplitProcessor;

impl NodeProcessor for SplitProcessor {
    fn spec(&self) -> OpSpec {
        OpSpec {
            inputs: Arity::Exact(1),
            outputs: Arity::AtLeast(1),
        }
    }

    fn infer(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
        let dtype = ctx.input_dtype(0)?;
        let shape = ctx.input_shape(0)?.to_vec();

        let axis_raw = match ctx.attrs.get("axis") {
            Some(value) => value.as_int().ok_or_else(|| {
                IrError::MalformedOperator(format!(
                    "{}: axis attribute is not an int",
                    ctx.node_name
                ))
            })?,
            None => 0,
        };
        let axis = normalize_axis(ctx.node_name, axis_raw, shape.len())?;

        let parts = ctx.outputs.len();
        if shape[axis] % parts != 0 {
            return Err(IrError::MalformedOperator(format!(
                "{}: dimension {} of size {} does not divide into {parts} outputs",
                ctx.node_name, axis, shape[axis]
            )));
        }

        let mut out_shape = shape.clone();
        out_shape[axis] = shape[axis] / parts;
        for index in 0..parts {
            ctx.set_output(index, dtype, out_shape.clone());
        }
        Ok(())
    }
}

fn normalize_axis(node: &str, axis: i64, rank: usize) -> Result<usize, IrError> {
    let normalized = if axis < 0 { axis + rank as i64 } else { axis };
    if normalized < 0 || normalized as usize >= rank {
        return Err(IrError::MalformedOperator(format!(
            "{node}: axis {axis} out of range for rank {rank}"
        )));
    }
    Ok(normalized as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DType, OpKind};
    use crate::node::test_utils::NodeBuilder;

    #[test]
    fn even_split_along_default_axis() {
        let outputs = NodeBuilder::new(OpKind::Split, "split")
            .input_tensor("x", DType::F32, vec![6, 4])
            .output("a")
            .output("b")
            .output("c")
            .infer()
            .unwrap();
        assert_eq!(outputs.len(), 3);
        for out in &outputs {
            assert_eq!(out.dtype, Some(DType::F32));
            assert_eq!(out.shape.as_deref(), Some(&[2, 4][..]));
        }
    }

    #[test]
    fn explicit_axis() {
        let outputs = NodeBuilder::new(OpKind::Split, "split")
            .input_tensor("x", DType::I32, vec![2, 8])
            .attr("axis", AttrValue::Int(1))
            .output("a")
            .output("b")
            .infer()
            .unwrap();
        assert_eq!(outputs[0].shape.as_deref(), Some(&[2, 4][..]));
        assert_eq!(outputs[1].shape.as_deref(), Some(&[2, 4][..]));
    }

    #[test]
    fn indivisible_dimension_is_malformed() {
        let err = NodeBuilder::new(OpKind::Split, "split")
            .input_tensor("x", DType::F32, vec![5])
            .output("a")
            .output("b")
            .infer()
            .unwrap_err();
        assert!(matches!(err, IrError::MalformedOperator(_)));
    }
}
