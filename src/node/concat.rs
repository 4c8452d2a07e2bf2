//! Concat: join tensors along one axis.
//!
//! `axis` is a required declared attribute; its absence is the canonical
//! missing-required-attribute failure. Inputs are variadic, must share a
//! dtype, and must agree on every dimension except the concat axis.
//! Folding is performed for axis 0, where the parts are contiguous.

use crate::error::IrError;
use crate::ir::{DType, TensorData, TensorValue};
use crate::processor::{Arity, InferenceCtx, SingleOutput};

pub struct ConcatProcessor;

impl SingleOutput for ConcatProcessor {
    fn input_arity(&self) -> Arity {
        Arity::AtLeast(1)
    }

    fn infer_one(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
        let axis_attr = ctx.attrs.require("axis")?;
        let axis_raw = axis_attr.as_int().ok_or_else(|| {
            IrError::MalformedOperator(format!("{}: axis attribute is not an int", ctx.node_name))
        })?;

        let dtype = ctx.input_dtype(0)?;
        let first_shape = ctx.input_shape(0)?.to_vec();
        let rank = first_shape.len();
        let axis = normalize_axis(ctx.node_name, axis_raw, rank)?;

        let mut shape = first_shape.clone();
        for index in 1..ctx.inputs.len() {
            let other_dtype = ctx.input_dtype(index)?;
            if other_dtype != dtype {
                return Err(IrError::UnsupportedDtypeCombination(format!(
                    "{}: inputs mix {dtype} and {other_dtype}",
                    ctx.node_name
                )));
            }
            let other = ctx.input_shape(index)?;
            if other.len() != rank
                || other
                    .iter()
                    .enumerate()
                    .any(|(dim, &size)| dim != axis && size != shape[dim])
            {
                return Err(IrError::MalformedOperator(format!(
                    "{}: input {index} shape {other:?} incompatible with {first_shape:?} on axis {axis}",
                    ctx.node_name
                )));
            }
            shape[axis] += other[axis];
        }

        ctx.set_output(0, dtype, shape.clone());

        if axis == 0 {
            let parts: Option<Vec<&TensorData>> =
                (0..ctx.inputs.len()).map(|i| ctx.input_data(i)).collect();
            if let Some(parts) = parts {
                if let Some(folded) = concat_contiguous(dtype, &parts, shape) {
                    ctx.set_output_data(0, folded);
                }
            }
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

/// Axis-0 concatenation: parts are contiguous runs of elements.
fn concat_contiguous(
    dtype: DType,
    parts: &[&TensorData],
    shape: Vec<usize>,
) -> Option<TensorData> {
    if dtype.is_int() {
        let mut elems = Vec::new();
        for part in parts {
            elems.extend(part.to_i128_vec()?);
        }
        TensorData::from_i128(dtype, elems, shape)
    } else if dtype.is_float() {
        let mut elems = Vec::new();
        for part in parts {
            elems.extend(part.to_f64_vec()?);
        }
        TensorData::from_f64(dtype, elems, shape)
    } else if dtype == DType::Bool {
        let mut elems = Vec::new();
        for part in parts {
            match part.value() {
                TensorValue::Bool(v) => elems.extend_from_slice(v),
                _ => return None,
            }
        }
        Some(TensorData::new(shape, TensorValue::Bool(elems)))
    } else {
        None
    }
}
