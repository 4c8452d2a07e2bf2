//! Matrix product shape and dtype inference.
//!
//! Follows the standard matmul shape contract: batch dimensions broadcast,
//! the two contraction dimensions must agree, and 1-D operands behave as a
//! row (lhs) or column (rhs) vector whose synthetic dimension is dropped
//! from the result. Values are never folded; the contraction is runtime
//! work, not static fact derivation.

use crate::error::IrError;
use crate::ir::Shape;
use crate::processor::{Arity, InferenceCtx, SingleOutput};
use crate::util::{broadcast_shape, promote};

pub struct MatMulProcessor;

impl SingleOutput for MatMulProcessor {
    fn input_arity(&self) -> Arity {
        Arity::Exact(2)
    }

    fn infer_one(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
        let a_dtype = ctx.input_dtype(0)?;
        let b_dtype = ctx.input_dtype(1)?;
        let dtype = promote(a_dtype, b_dtype).ok_or_else(|| {
            IrError::UnsupportedDtypeCombination(format!(
                "{}: {a_dtype} and {b_dtype} do not promote",
                ctx.node_name
            ))
        })?;

        let a = ctx.input_shape(0)?.to_vec();
        let b = ctx.input_shape(1)?.to_vec();
        if a.is_empty() || b.is_empty() {
            return Err(IrError::MalformedOperator(format!(
                "{}: MatMul operands must have rank >= 1",
                ctx.node_name
            )));
        }

        // Promote vectors to matrices, remembering which synthetic
        // dimensions to drop afterwards.
        let a_is_vec = a.len() == 1;
        let b_is_vec = b.len() == 1;
        let a2: Shape = if a_is_vec { vec![1, a[0]] } else { a };
        let b2: Shape = if b_is_vec { vec![b[0], 1] } else { b };

        let (m, k) = (a2[a2.len() - 2], a2[a2.len() - 1]);
        let (k2, n) = (b2[b2.len() - 2], b2[b2.len() - 1]);
        if k != k2 {
            return Err(IrError::MalformedOperator(format!(
                "{}: contraction dimensions disagree ({k} vs {k2})",
                ctx.node_name
            )));
        }

        let batch = broadcast_shape(&a2[..a2.len() - 2], &b2[..b2.len() - 2]).ok_or_else(|| {
            IrError::MalformedOperator(format!(
                "{}: batch dimensions do not broadcast",
                ctx.node_name
            ))
        })?;

        let mut shape = batch;
        if !a_is_vec {
            shape.push(m);
        }
        if !b_is_vec {
            shape.push(n);
        }

        ctx.set_output(0, dtype, shape);
        Ok(())
    }
}
