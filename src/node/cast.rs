//! Cast: convert elements to a declared target dtype.
//!
//! The target arrives as the required `to` attribute naming a [`DType`].
//! Numeric-to-numeric folding saturates integers to the target range;
//! casts involving Bool propagate type only.

use std::str::FromStr;

use crate::attribute::AttrValue;
use crate::error::IrError;
use crate::ir::{DType, TensorData};
use crate::processor::{Arity, InferenceCtx, SingleOutput};

pub struct CastProcessor;

impl SingleOutput for CastProcessor {
    fn input_arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn infer_one(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
        let target = match ctx.attrs.require("to")? {
            AttrValue::Enum(name) | AttrValue::String(name) => {
                DType::from_str(name).map_err(|_| {
                    IrError::MalformedOperator(format!(
                        "{}: unknown target dtype '{name}'",
                        ctx.node_name
                    ))
                })?
            }
            other => {
                return Err(IrError::MalformedOperator(format!(
                    "{}: 'to' attribute has kind {:?}",
                    ctx.node_name,
                    other.kind()
                )));
            }
        };

        let shape = ctx.input_shape(0)?.to_vec();
        ctx.set_output(0, target, shape);

        if let Some(data) = ctx.input_data(0) {
            if let Some(folded) = cast_data(data, target) {
                ctx.set_output_data(0, folded);
            }
        }
        Ok(())
    }
}

fn cast_data(data: &TensorData, target: DType) -> Option<TensorData> {
    let shape = data.shape().to_vec();
    if target.is_float() {
        TensorData::from_f64(target, data.to_f64_vec()?, shape)
    } else if target.is_int() {
        // Integer sources stay in the i128 domain so 64-bit values keep
        // every bit; float sources truncate toward zero. Both saturate.
        let ints = match data.to_i128_vec() {
            Some(ints) => ints,
            None => data.to_f64_vec()?.into_iter().map(|v| v as i128).collect(),
        };
        crate::util::narrow_ints(ints, target, &shape)
    } else {
        None
    }
}
