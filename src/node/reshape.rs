//! Reshape: reinterpret a tensor with a new shape of equal element count.
//!
//! The target shape is an ambiguous attribute: it may be declared on the
//! node or arrive as the second input tensor, resolved through the store's
//! fallback chain. A `0` entry copies the corresponding input dimension; a
//! single `-1` entry is inferred from the remaining element count.

use crate::attribute::{AttrValue, Fallback};
use crate::error::IrError;
use crate::ir::Shape;
use crate::processor::{Arity, InferenceCtx, SingleOutput};

pub struct ReshapeProcessor;

impl SingleOutput for ReshapeProcessor {
    fn input_arity(&self) -> Arity {
        Arity::Range { min: 1, max: 2 }
    }

    fn infer_one(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
        let dtype = ctx.input_dtype(0)?;
        let input_shape = ctx.input_shape(0)?.to_vec();

        let chain = [Fallback::Declared, Fallback::InputTensor(1)];
        let spec = ctx.attrs.derive("shape", &chain, ctx.inputs)?;
        let dims = shape_entries(ctx.node_name, &spec)?;

        let shape = resolve_shape(ctx.node_name, &dims, &input_shape)?;
        ctx.set_output(0, dtype, shape.clone());

        if let Some(data) = ctx.input_data(0) {
            ctx.set_output_data(0, data.clone().with_shape(shape));
        }
        Ok(())
    }
}

fn shape_entries(node: &str, value: &AttrValue) -> Result<Vec<i64>, IrError> {
    match value {
        AttrValue::IntList(dims) => Ok(dims.clone()),
        AttrValue::Tensor(data) => data
            .to_i128_vec()
            .map(|v| v.iter().map(|&x| x as i64).collect())
            .ok_or_else(|| {
                IrError::MalformedOperator(format!("{node}: shape input must be an integer tensor"))
            }),
        other => Err(IrError::MalformedOperator(format!(
            "{node}: shape attribute has kind {:?}",
            other.kind()
        ))),
    }
}

fn resolve_shape(node: &str, dims: &[i64], input_shape: &[usize]) -> Result<Shape, IrError> {
    let input_count: usize = input_shape.iter().product();

    let mut shape: Vec<usize> = Vec::with_capacity(dims.len());
    let mut wildcard: Option<usize> = None;
    for (i, &dim) in dims.iter().enumerate() {
        match dim {
            -1 => {
                if wildcard.is_some() {
                    return Err(IrError::MalformedOperator(format!(
                        "{node}: more than one -1 in target shape"
                    )));
                }
                wildcard = Some(i);
                shape.push(1);
            }
            0 => {
                let copied = input_shape.get(i).ok_or_else(|| {
                    IrError::MalformedOperator(format!(
                        "{node}: dimension {i} copies a nonexistent input dimension"
                    ))
                })?;
                shape.push(*copied);
            }
            d if d > 0 => shape.push(d as usize),
            d => {
                return Err(IrError::MalformedOperator(format!(
                    "{node}: negative dimension {d} in target shape"
                )));
            }
        }
    }

    if let Some(index) = wildcard {
        let known: usize = shape.iter().product();
        if known == 0 || input_count % known != 0 {
            return Err(IrError::MalformedOperator(format!(
                "{node}: cannot infer -1 dimension for {input_count} elements"
            )));
        }
        shape[index] = input_count / known;
    }

    let output_count: usize = shape.iter().product();
    if output_count != input_count {
        return Err(IrError::MalformedOperator(format!(
            "{node}: reshape changes element count ({input_count} -> {output_count})"
        )));
    }
    Ok(shape)
}
