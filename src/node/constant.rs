//! Constant: materialize a declared tensor value with no inputs.

use crate::error::IrError;
use crate::processor::{Arity, InferenceCtx, SingleOutput};

pub struct ConstantProcessor;

impl SingleOutput for ConstantProcessor {
    fn input_arity(&self) -> Arity {
        Arity::Exact(0)
    }

    fn infer_one(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
        let data = ctx
            .attrs
            .require("value")?
            .as_tensor()
            .ok_or_else(|| {
                IrError::MalformedOperator(format!(
                    "{}: 'value' attribute is not a tensor",
                    ctx.node_name
                ))
            })?
            .clone();
        ctx.set_output_data(0, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttrValue;
    use crate::ir::{DType, OpKind, TensorData, TensorValue};
    use crate::node::test_utils::NodeBuilder;

    #[test]
    fn value_attribute_becomes_the_output() {
        let outputs = NodeBuilder::new(OpKind::Constant, "c")
            .attr(
                "value",
                AttrValue::Tensor(TensorData::new(vec![2], TensorValue::I64(vec![3, 4]))),
            )
            .output("y")
            .infer()
            .unwrap();
        assert_eq!(outputs[0].dtype, Some(DType::I64));
        assert_eq!(outputs[0].shape.as_deref(), Some(&[2][..]));
        assert_eq!(
            outputs[0].data.as_ref().unwrap().value(),
            &TensorValue::I64(vec![3, 4])
        );
    }

    #[test]
    fn missing_value_is_reported() {
        let err = NodeBuilder::new(OpKind::Constant, "c")
            .output("y")
            .infer()
            .unwrap_err();
        assert_eq!(
            err,
            IrError::MissingRequiredAttribute {
                name: "value".into()
            }
        );
    }

    #[test]
    fn non_tensor_value_is_malformed() {
        let err = NodeBuilder::new(OpKind::Constant, "c")
            .attr("value", AttrValue::Int(3))
            .output("y")
            .infer()
            .unwrap_err();
        assert!(matches!(err, IrError::MalformedOperator(_)));
    }
}
