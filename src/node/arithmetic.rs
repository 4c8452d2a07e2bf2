//! Element-wise binary arithmetic (Add, Sub, Mul, Div).
//!
//! All four share the same contract: two inputs, multidirectional
//! broadcasting, dtype promotion per the pinned table in [`crate::util`],
//! and constant folding when both operands are statically known.

use crate::error::IrError;
use crate::ir::OpKind;
use crate::processor::{same_as_input_broadcast, Arity, InferenceCtx, SingleOutput};
use crate::util::fold_binary;

/// Processor shared by Add, Sub, Mul and Div.
pub struct ArithmeticProcessor;

impl SingleOutput for ArithmeticProcessor {
    fn input_arity(&self) -> Arity {
        Arity::Exact(2)
    }

    fn infer_one(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
        same_as_input_broadcast(ctx)?;

        let (Some(a), Some(b)) = (ctx.input_data(0), ctx.input_data(1)) else {
            return Ok(());
        };

        let out_dtype = ctx.outputs[0].dtype.unwrap_or(a.dtype());
        let out_shape = ctx.outputs[0].shape.clone().unwrap_or_default();

        let float_op: fn(f64, f64) -> f64 = match ctx.op {
            OpKind::Add => |x, y| x + y,
            OpKind::Sub => |x, y| x - y,
            OpKind::Mul => |x, y| x * y,
            OpKind::Div => |x, y| x / y,
            _ => unreachable!("non-arithmetic op dispatched to ArithmeticProcessor"),
        };
        // Integer operands fold in i128; overflow or division by zero
        // leaves the output unfolded.
        let int_op: fn(i128, i128) -> Option<i128> = match ctx.op {
            OpKind::Add => i128::checked_add,
            OpKind::Sub => i128::checked_sub,
            OpKind::Mul => i128::checked_mul,
            OpKind::Div => i128::checked_div,
            _ => unreachable!("non-arithmetic op dispatched to ArithmeticProcessor"),
        };

        if let Some(folded) = fold_binary(a, b, out_dtype, &out_shape, float_op, int_op) {
            ctx.set_output_data(0, folded);
        }
        Ok(())
    }
}
