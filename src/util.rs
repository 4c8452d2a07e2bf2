//! Shared inference math: broadcasting, dtype promotion and constant-fold
//! helpers used across operator processors.

use crate::ir::{DType, Shape, TensorData};

/// Multidirectional (numpy-style) broadcast of two shapes.
///
/// Shapes are aligned at the trailing dimension; each pair of dimensions must
/// be equal or one of them 1. `None` when the shapes are incompatible.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Shape> {
    let rank = a.len().max(b.len());
    let mut out = vec![0; rank];
    for i in 0..rank {
        let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return None,
        };
    }
    Some(out)
}

/// Explicit promotion table for mixed-dtype arithmetic.
///
/// - equal dtypes promote to themselves;
/// - float beats int, wider float wins;
/// - among integers the wider type wins; equal width with mixed signedness
///   promotes to the next wider signed type (`U64`+signed has no safe home
///   and does not promote);
/// - `Bool` never promotes with numeric types.
pub fn promote(a: DType, b: DType) -> Option<DType> {
    use DType::*;
    if a == b {
        return Some(a);
    }
    if a == Bool || b == Bool {
        return None;
    }
    match (a.is_float(), b.is_float()) {
        (true, true) => Some(if a.bit_width() >= b.bit_width() { a } else { b }),
        (true, false) => Some(a),
        (false, true) => Some(b),
        (false, false) => {
            if a.is_signed() == b.is_signed() {
                Some(if a.bit_width() >= b.bit_width() { a } else { b })
            } else {
                // Mixed signedness: pick a signed type wide enough for both.
                let (signed, unsigned) = if a.is_signed() { (a, b) } else { (b, a) };
                if signed.bit_width() > unsigned.bit_width() {
                    Some(signed)
                } else {
                    match unsigned {
                        U8 => Some(I16),
                        U16 => Some(I32),
                        U32 => Some(I64),
                        _ => None,
                    }
                }
            }
        }
    }
}

/// Fold a binary element-wise operation over two constant tensors.
///
/// Folding is performed only when the shapes match exactly or one operand is
/// a single element (scalar broadcast); general broadcast folding is left to
/// the runtime. Integer results are computed in `i128` so 64-bit values keep
/// every bit; float results in `f64`. Both narrow to `out_dtype` with
/// saturation. An `int_op` yielding `None` (overflow, division by zero)
/// skips the fold.
pub fn fold_binary(
    a: &TensorData,
    b: &TensorData,
    out_dtype: DType,
    out_shape: &[usize],
    float_op: impl Fn(f64, f64) -> f64,
    int_op: impl Fn(i128, i128) -> Option<i128>,
) -> Option<TensorData> {
    if out_dtype.is_int() {
        let lhs = a.to_i128_vec()?;
        let rhs = b.to_i128_vec()?;
        let folded = zip_elementwise(&lhs, &rhs, |x, y| int_op(x, y))?;
        narrow_ints(folded, out_dtype, out_shape)
    } else {
        let lhs = a.to_f64_vec()?;
        let rhs = b.to_f64_vec()?;
        let folded = zip_elementwise(&lhs, &rhs, |x, y| Some(float_op(x, y)))?;
        TensorData::from_f64(out_dtype, folded, out_shape.to_vec())
    }
}

/// Fold a unary element-wise operation over a constant tensor, in the
/// integer or float domain depending on `out_dtype`.
pub fn fold_unary(
    input: &TensorData,
    out_dtype: DType,
    float_op: impl Fn(f64) -> f64,
    int_op: impl Fn(i128) -> i128,
) -> Option<TensorData> {
    if out_dtype.is_int() {
        let values = input.to_i128_vec()?.into_iter().map(int_op).collect();
        narrow_ints(values, out_dtype, input.shape())
    } else {
        let values = input.to_f64_vec()?.into_iter().map(float_op).collect();
        TensorData::from_f64(out_dtype, values, input.shape().to_vec())
    }
}

fn zip_elementwise<T: Copy>(
    lhs: &[T],
    rhs: &[T],
    f: impl Fn(T, T) -> Option<T>,
) -> Option<Vec<T>> {
    if lhs.len() == rhs.len() {
        lhs.iter().zip(rhs).map(|(&x, &y)| f(x, y)).collect()
    } else if lhs.len() == 1 {
        rhs.iter().map(|&y| f(lhs[0], y)).collect()
    } else if rhs.len() == 1 {
        lhs.iter().map(|&x| f(x, rhs[0])).collect()
    } else {
        None
    }
}

/// Saturate `i128` results to the dtype's representable range.
pub(crate) fn narrow_ints(values: Vec<i128>, dtype: DType, shape: &[usize]) -> Option<TensorData> {
    let (min, max) = dtype.int_range()?;
    let ints = values.into_iter().map(|v| v.clamp(min, max)).collect();
    TensorData::from_i128(dtype, ints, shape.to_vec())
}
