//! Transpose: permute tensor dimensions.
//!
//! The `perm` attribute defaults to reversing all axes. Constant inputs are
//! folded by remapping element indices; the element type is preserved
//! exactly by permuting in the integer or float wide domain.

use crate::attribute::AttrValue;
use crate::error::IrError;
use crate::ir::{Shape, TensorData};
use crate::processor::{Arity, InferenceCtx, SingleOutput};

pub struct TransposeProcessor;

impl SingleOutput for TransposeProcessor {
    fn input_arity(&self) -> Arity {
        Arity::Exact(1)
    }

    fn infer_one(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
        let dtype = ctx.input_dtype(0)?;
        let input_shape = ctx.input_shape(0)?.to_vec();
        let rank = input_shape.len();

        let perm: Vec<usize> = match ctx.attrs.get("perm") {
            Some(AttrValue::IntList(perm)) => perm
                .iter()
                .map(|&axis| normalize_axis(ctx.node_name, axis, rank))
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(IrError::MalformedOperator(format!(
                    "{}: perm attribute has kind {:?}",
                    ctx.node_name,
                    other.kind()
                )));
            }
            None => (0..rank).rev().collect(),
        };

        if !is_permutation(&perm, rank) {
            return Err(IrError::MalformedOperator(format!(
                "{}: perm {perm:?} is not a permutation of 0..{rank}",
                ctx.node_name
            )));
        }

        let shape: Shape = perm.iter().map(|&axis| input_shape[axis]).collect();
        ctx.set_output(0, dtype, shape.clone());

        if let Some(data) = ctx.input_data(0) {
            if let Some(folded) = permute_data(data, &perm, &input_shape, &shape) {
                ctx.set_output_data(0, folded);
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

fn is_permutation(perm: &[usize], rank: usize) -> bool {
    let mut seen = vec![false; rank];
    perm.len() == rank
        && perm.iter().all(|&axis| {
            axis < rank && !std::mem::replace(&mut seen[axis], true)
        })
}

/// Remap element indices through the permutation, preserving the dtype.
fn permute_data(
    data: &TensorData,
    perm: &[usize],
    in_shape: &[usize],
    out_shape: &[usize],
) -> Option<TensorData> {
    let in_strides = strides(in_shape);
    let dtype = data.dtype();

    let mapped: Vec<usize> = out_indices(out_shape)
        .map(|out_index| {
            out_index
                .iter()
                .enumerate()
                .map(|(dim, &coord)| coord * in_strides[perm[dim]])
                .sum()
        })
        .collect();

    if dtype.is_int() {
        let elems = data.to_i128_vec()?;
        TensorData::from_i128(dtype, mapped.iter().map(|&i| elems[i]).collect(), out_shape.to_vec())
    } else if dtype.is_float() {
        let elems = data.to_f64_vec()?;
        TensorData::from_f64(dtype, mapped.iter().map(|&i| elems[i]).collect(), out_shape.to_vec())
    } else {
        None
    }
}

fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Iterate all multi-indices of a shape in row-major order.
fn out_indices(shape: &[usize]) -> impl Iterator<Item = Vec<usize>> + '_ {
    let total: usize = shape.iter().product();
    let strides = strides(shape);
    (0..total).map(move |flat| {
        shape
            .iter()
            .zip(&strides)
            .map(|(&dim, &stride)| (flat / stride) % dim.max(1))
            .collect()
    })
}
