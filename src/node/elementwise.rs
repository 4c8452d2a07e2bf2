//! Element-wise unary operations (Relu, Neg, Abs, Sqrt).
//!
//! Output dtype and shape always match the input; values fold when the
//! input is statically known. Dtype constraints differ per operator: Sqrt
//! requires a float input, Neg a signed one.

use crate::error::IrError;
use crate::ir::OpKind;
use crate::processor::{same_as_input, Arity, InferenceCtx, SingleOutput};
use crate::util::fold_unary;

/// Processor shared by the unary element-wise operators.
pub struct UnaryProcessor;

impl SingleOutput for UnaryProcessor {
    fn input_arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn infer_one(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
        let dtype = ctx.input_dtype(0)?;
        if dtype == crate::ir::DType::Bool {
            return Err(IrError::UnsupportedDtypeCombination(format!(
                "{}: {} does not accept Bool",
                ctx.node_name, ctx.op
            )));
        }
        match ctx.op {
            OpKind::Sqrt if !dtype.is_float() => {
                return Err(IrError::UnsupportedDtypeCombination(format!(
                    "{}: Sqrt requires a float input, got {dtype}",
                    ctx.node_name
                )));
            }
            OpKind::Neg if !dtype.is_signed() => {
                return Err(IrError::UnsupportedDtypeCombination(format!(
                    "{}: Neg requires a signed input, got {dtype}",
                    ctx.node_name
                )));
            }
            _ => {}
        }

        same_as_input(ctx)?;

        let Some(data) = ctx.input_data(0) else {
            return Ok(());
        };

        let float_op: fn(f64) -> f64 = match ctx.op {
            OpKind::Relu => |x| x.max(0.0),
            OpKind::Neg => |x| -x,
            OpKind::Abs => f64::abs,
            OpKind::Sqrt => f64::sqrt,
            _ => unreachable!("non-unary op dispatched to UnaryProcessor"),
        };
        // Sqrt never reaches the integer path: the dtype check above
        // restricts it to float inputs.
        let int_op: fn(i128) -> i128 = match ctx.op {
            OpKind::Relu => |x| x.max(0),
            OpKind::Neg => |x| -x,
            OpKind::Abs => i128::abs,
            _ => |_| unreachable!("integer fold for a float-only operator"),
        };

        if let Some(folded) = fold_unary(data, dtype, float_op, int_op) {
            ctx.set_output_data(0, folded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DType, TensorData, TensorValue};
    use crate::node::test_utils::NodeBuilder;

    #[test]
    fn relu_folds_and_keeps_dtype() {
        let outputs = NodeBuilder::new(OpKind::Relu, "relu")
            .input_constant(
                "x",
                TensorData::new(vec![3], TensorValue::I32(vec![-5, 0, 7])),
            )
            .output("y")
            .infer()
            .unwrap();

        assert_eq!(outputs[0].dtype, Some(DType::I32));
        assert_eq!(
            outputs[0].data.as_ref().unwrap().value(),
            &TensorValue::I32(vec![0, 0, 7])
        );
    }

    #[test]
    fn neg_keeps_wide_integer_precision() {
        let big = (1_i64 << 60) + 1;
        let outputs = NodeBuilder::new(OpKind::Neg, "neg")
            .input_constant("x", TensorData::new(vec![1], TensorValue::I64(vec![big])))
            .output("y")
            .infer()
            .unwrap();
        assert_eq!(
            outputs[0].data.as_ref().unwrap().value(),
            &TensorValue::I64(vec![-big])
        );
    }

    #[test]
    fn shape_propagates_without_data() {
        let outputs = NodeBuilder::new(OpKind::Sqrt, "sqrt")
            .input_tensor("x", DType::F32, vec![4, 4])
            .output("y")
            .infer()
            .unwrap();
        assert_eq!(outputs[0].shape.as_deref(), Some(&[4, 4][..]));
        assert!(outputs[0].data.is_none());
    }

    #[test]
    fn sqrt_rejects_integer_input() {
        let err = NodeBuilder::new(OpKind::Sqrt, "sqrt")
            .input_tensor("x", DType::I32, vec![2])
            .output("y")
            .infer()
            .unwrap_err();
        assert!(matches!(err, IrError::UnsupportedDtypeCombination(_)));
    }

    #[test]
    fn neg_rejects_unsigned_input() {
        let err = NodeBuilder::new(OpKind::Neg, "neg")
            .input_tensor("x", DType::U8, vec![2])
            .output("y")
            .infer()
            .unwrap_err();
        assert!(matches!(err, IrError::UnsupportedDtypeCombination(_)));
    }
}
