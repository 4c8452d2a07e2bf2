//! Shared quantized-arithmetic routines.
//!
//! Every quantized operator follows the same dequantize → float-compute →
//! requantize skeleton; this module centralizes the two conversions so each
//! operator only supplies the float-domain step.
//!
//! Numeric contract, matched bit-exactly against the reference quantized
//! runtime:
//! - `dequantize`: `(x - zero_point) * scale`, with the subtraction done in
//!   a signed 128-bit domain so a zero point larger than the raw value never
//!   underflows.
//! - `requantize`: `clip(round(x / scale) + zero_point, min(T), max(T))`
//!   where `round` is round-half-to-even (banker's rounding) and `clip`
//!   saturates to the target element type's representable range.

use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::error::IrError;
use crate::ir::{DType, Shape, TensorData};

/// Per-tensor quantization parameters mapping integers to a float range.
///
/// `dtype` is the element type of the quantized tensor the zero point
/// belongs to; the zero point must be representable in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, new)]
pub struct QuantParams {
    pub scale: f32,
    pub zero_point: i64,
    pub dtype: DType,
}

impl QuantParams {
    /// Check that the zero point lies within its dtype's range.
    pub fn validate(&self) -> Result<(), IrError> {
        let (min, max) = self.dtype.int_range().ok_or_else(|| {
            IrError::UnsupportedDtypeCombination(format!(
                "quantization parameters require an integer dtype, got {}",
                self.dtype
            ))
        })?;
        if (self.zero_point as i128) < min || (self.zero_point as i128) > max {
            return Err(IrError::QuantizationRangeViolation {
                zero_point: self.zero_point,
                dtype: self.dtype,
            });
        }
        Ok(())
    }
}

/// Convert a quantized integer tensor to float: `(x - zero_point) * scale`.
pub fn dequantize(data: &TensorData, scale: f32, zero_point: i64) -> Result<Vec<f64>, IrError> {
    let ints = data.to_i128_vec().ok_or_else(|| {
        IrError::UnsupportedDtypeCombination(format!(
            "dequantize expects an integer tensor, got {}",
            data.dtype()
        ))
    })?;
    Ok(ints
        .into_iter()
        .map(|x| (x - zero_point as i128) as f64 * scale as f64)
        .collect())
}

/// Convert float values back to a quantized integer tensor of `target`
/// dtype: `clip(round_half_even(x / scale) + zero_point, min, max)`.
///
/// The result is always within `[min(target), max(target)]`.
pub fn requantize(
    values: &[f64],
    shape: &[usize],
    scale: f32,
    zero_point: i64,
    target: DType,
) -> Result<TensorData, IrError> {
    let (min, max) = target.int_range().ok_or_else(|| {
        IrError::UnsupportedDtypeCombination(format!(
            "requantize target must be an integer dtype, got {target}"
        ))
    })?;
    QuantParams::new(scale, zero_point, target).validate()?;

    let quantized: Vec<i128> = values
        .iter()
        .map(|&v| {
            let rounded = (v / scale as f64).round_ties_even();
            // NaN clamps to the zero point rather than poisoning the cast.
            if rounded.is_nan() {
                return zero_point as i128;
            }
            let shifted = rounded as i128 + zero_point as i128;
            shifted.clamp(min, max)
        })
        .collect();

    TensorData::from_i128(target, quantized, Shape::from(shape)).ok_or_else(|| {
        IrError::UnsupportedDtypeCombination(format!(
            "requantize target must be an integer dtype, got {target}"
        ))
    })
}
