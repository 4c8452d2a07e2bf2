//! Fused quantized element-wise operators.
//!
//! Positional input layout: data `A`, `A`'s scale and zero point, data `B`,
//! `B`'s scale and zero point, then the output scale and an optional output
//! zero point. Each parameter may equivalently be declared as a node
//! attribute; derivation prefers the declared form and caches whichever
//! source won.
//!
//! Concrete operators ([`QLinearAddProcessor`], [`QLinearMulProcessor`])
//! supply only the float-domain compute; everything else lives in the shared
//! [`infer_quantized_eltwise`] skeleton.

use crate::attribute::{AttrValue, Fallback};
use crate::error::IrError;
use crate::ir::DType;
use crate::processor::{InferenceCtx, QuantizedEltwise};
use crate::quant::{dequantize, requantize, QuantParams};
use crate::util::broadcast_shape;

pub struct QLinearAddProcessor;

impl QuantizedEltwise for QLinearAddProcessor {
    fn float_compute(&self, a: f64, b: f64) -> f64 {
        a + b
    }
}

pub struct QLinearMulProcessor;

impl QuantizedEltwise for QLinearMulProcessor {
    fn float_compute(&self, a: f64, b: f64) -> f64 {
        a * b
    }
}

// Positional inputs shared by every fused quantized element-wise operator.
const A: usize = 0;
const A_SCALE: usize = 1;
const A_ZERO_POINT: usize = 2;
const B: usize = 3;
const B_SCALE: usize = 4;
const B_ZERO_POINT: usize = 5;
const C_SCALE: usize = 6;
const C_ZERO_POINT: usize = 7;

/// Shared inference for quantized element-wise operators: derive the six
/// quantization parameters, validate them, propagate the broadcast shape,
/// and fold constants through dequantize / compute / requantize.
pub(crate) fn infer_quantized_eltwise<T: QuantizedEltwise + ?Sized>(
    op: &T,
    ctx: &mut InferenceCtx<'_>,
) -> Result<(), IrError> {
    let a_dtype = ctx.input_dtype(A)?;
    let b_dtype = ctx.input_dtype(B)?;
    if !a_dtype.is_int() || !b_dtype.is_int() {
        return Err(IrError::UnsupportedDtypeCombination(format!(
            "{}: quantized data inputs must be integer tensors, got {a_dtype} and {b_dtype}",
            ctx.node_name
        )));
    }

    let a_scale = derive_scale(ctx, "a_scale", A_SCALE)?;
    let (a_zp, _) = derive_zero_point(ctx, "a_zero_point", A_ZERO_POINT)?;
    let b_scale = derive_scale(ctx, "b_scale", B_SCALE)?;
    let (b_zp, _) = derive_zero_point(ctx, "b_zero_point", B_ZERO_POINT)?;
    let c_scale = derive_scale(ctx, "c_scale", C_SCALE)?;
    let (c_zp, c_zp_dtype) = derive_zero_point(ctx, "c_zero_point", C_ZERO_POINT)?;

    // The output element type follows the output zero point's tensor when
    // one is wired in; a defaulted or declared-scalar zero point leaves the
    // result in A's type.
    let out_dtype = c_zp_dtype.filter(DType::is_int).unwrap_or(a_dtype);

    QuantParams::new(a_scale, a_zp, a_dtype).validate()?;
    QuantParams::new(b_scale, b_zp, b_dtype).validate()?;
    let out_params = QuantParams::new(c_scale, c_zp, out_dtype);
    out_params.validate()?;

    let a_shape = ctx.input_shape(A)?;
    let b_shape = ctx.input_shape(B)?;
    let shape = broadcast_shape(a_shape, b_shape).ok_or_else(|| {
        IrError::MalformedOperator(format!(
            "{}: shapes {a_shape:?} and {b_shape:?} do not broadcast",
            ctx.node_name
        ))
    })?;

    ctx.set_output(0, out_dtype, shape.clone());

    if let (Some(a), Some(b)) = (ctx.input_data(A), ctx.input_data(B)) {
        let a_vals = dequantize(a, a_scale, a_zp)?;
        let b_vals = dequantize(b, b_scale, b_zp)?;
        if let Some(combined) = apply(op, &a_vals, &b_vals) {
            let folded = requantize(&combined, &shape, c_scale, c_zp, out_dtype)?;
            ctx.set_output_data(0, folded);
        }
    }
    ctx.outputs[0].quant = Some(out_params);
    Ok(())
}

fn derive_scale(ctx: &mut InferenceCtx<'_>, name: &str, index: usize) -> Result<f32, IrError> {
    let chain = [Fallback::Declared, Fallback::InputTensor(index)];
    let value = ctx.attrs.derive(name, &chain, ctx.inputs)?;
    value.to_scalar_f32().ok_or_else(|| {
        IrError::MalformedOperator(format!(
            "{}: '{name}' is not a scalar float",
            ctx.node_name
        ))
    })
}

/// Zero points default to zero only when their input position is absent
/// entirely; a wired input with no static value is an error, same as a
/// scale. The dtype of the source tensor (when one exists) is reported
/// alongside, since the output zero point determines the output element
/// type.
fn derive_zero_point(
    ctx: &mut InferenceCtx<'_>,
    name: &str,
    index: usize,
) -> Result<(i64, Option<DType>), IrError> {
    let chain = [
        Fallback::Declared,
        Fallback::InputTensor(index),
        Fallback::Default(AttrValue::Int(0)),
    ];
    let chain = if index < ctx.inputs.len() {
        &chain[..2]
    } else {
        &chain[..]
    };
    let value = ctx.attrs.derive(name, chain, ctx.inputs)?;
    let dtype = value.as_tensor().map(|t| t.dtype());
    let zp = value.to_scalar_i64().ok_or_else(|| {
        IrError::MalformedOperator(format!(
            "{}: '{name}' is not a scalar integer",
            ctx.node_name
        ))
    })?;
    Ok((zp, dtype))
}

/// Element-wise float compute over equal-length or scalar-broadcast operands.
/// General broadcasting is left unfolded.
fn apply<T: QuantizedEltwise + ?Sized>(op: &T, a: &[f64], b: &[f64]) -> Option<Vec<f64>> {
    if a.len() == b.len() {
        Some(a.iter().zip(b).map(|(&x, &y)| op.float_compute(x, y)).collect())
    } else if b.len() == 1 {
        Some(a.iter().map(|&x| op.float_compute(x, b[0])).collect())
    } else if a.len() == 1 {
        Some(b.iter().map(|&y| op.float_compute(a[0], y)).collect())
    } else {
        None
    }
}
