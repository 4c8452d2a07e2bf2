//! Explicit quantize / dequantize boundary operators.
//!
//! Both take `[x, scale, zero_point?]`; the scale and zero point may also be
//! declared as attributes. `QuantizeLinear` maps a float tensor into the
//! zero point's integer type; `DequantizeLinear` maps a quantized integer
//! tensor back to `F32`.

use crate::attribute::{AttrValue, Fallback};
use crate::error::IrError;
use crate::ir::{DType, TensorData};
use crate::processor::{Arity, InferenceCtx, SingleOutput};
use crate::quant::{dequantize, requantize, QuantParams};

const SCALE: usize = 1;
const ZERO_POINT: usize = 2;

pub struct QuantizeLinearProcessor;

impl SingleOutput for QuantizeLinearProcessor {
    fn input_arity(&self) -> Arity {
        Arity::Range { min: 2, max: 3 }
    }

    fn infer_one(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
        let x_dtype = ctx.input_dtype(0)?;
        if !x_dtype.is_float() {
            return Err(IrError::UnsupportedDtypeCombination(format!(
                "{}: quantize input must be a float tensor, got {x_dtype}",
                ctx.node_name
            )));
        }
        let shape = ctx.input_shape(0)?.to_vec();

        let scale = derive_scale(ctx)?;
        let (zero_point, zp_dtype) = derive_zero_point(ctx)?;
        // An absent zero-point tensor leaves the default target of U8.
        let target = zp_dtype.filter(DType::is_int).unwrap_or(DType::U8);
        let params = QuantParams::new(scale, zero_point, target);
        params.validate()?;

        ctx.set_output(0, target, shape.clone());
        if let Some(data) = ctx.input_data(0) {
            if let Some(values) = data.to_f64_vec() {
                let folded = requantize(&values, &shape, scale, zero_point, target)?;
                ctx.set_output_data(0, folded);
            }
        }
        ctx.outputs[0].quant = Some(params);
        Ok(())
    }
}

pub struct DequantizeLinearProcessor;

impl SingleOutput for DequantizeLinearProcessor {
    fn input_arity(&self) -> Arity {
        Arity::Range { min: 2, max: 3 }
    }

    fn infer_one(&self, ctx: &mut InferenceCtx<'_>) -> Result<(), IrError> {
        let x_dtype = ctx.input_dtype(0)?;
        if !x_dtype.is_int() {
            return Err(IrError::UnsupportedDtypeCombination(format!(
                "{}: dequantize input must be an integer tensor, got {x_dtype}",
                ctx.node_name
            )));
        }
        let shape = ctx.input_shape(0)?.to_vec();

        let scale = derive_scale(ctx)?;
        let (zero_point, _) = derive_zero_point(ctx)?;
        QuantParams::new(scale, zero_point, x_dtype).validate()?;

        ctx.set_output(0, DType::F32, shape.clone());
        if let Some(data) = ctx.input_data(0) {
            let values = dequantize(data, scale, zero_point)?;
            // from_f64 with an F32 target always succeeds.
            if let Some(folded) = TensorData::from_f64(DType::F32, values, shape) {
                ctx.set_output_data(0, folded);
            }
        }
        Ok(())
    }
}

fn derive_scale(ctx: &mut InferenceCtx<'_>) -> Result<f32, IrError> {
    let chain = [Fallback::Declared, Fallback::InputTensor(SCALE)];
    let value = ctx.attrs.derive("scale", &chain, ctx.inputs)?;
    value.to_scalar_f32().ok_or_else(|| {
        IrError::MalformedOperator(format!("{}: 'scale' is not a scalar float", ctx.node_name))
    })
}

/// Defaults to zero only when the zero-point input is absent entirely; a
/// wired input with no static value is an error.
fn derive_zero_point(ctx: &mut InferenceCtx<'_>) -> Result<(i64, Option<DType>), IrError> {
    let chain = [
        Fallback::Declared,
        Fallback::InputTensor(ZERO_POINT),
        Fallback::Default(AttrValue::Int(0)),
    ];
    let chain = if ZERO_POINT < ctx.inputs.len() {
        &chain[..2]
    } else {
        &chain[..]
    };
    let value = ctx.attrs.derive("zero_point", chain, ctx.inputs)?;
    let dtype = value.as_tensor().map(|t| t.dtype());
    let zp = value.to_scalar_i64().ok_or_else(|| {
        IrError::MalformedOperator(format!(
            "{}: 'zero_point' is not a scalar integer",
            ctx.node_name
        ))
    })?;
    Ok((zp, dtype))
}
