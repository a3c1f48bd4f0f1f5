//! Typed kernels behind the reference engine's elementwise, reduction and
//! contraction entry points. Floating point work runs in `f64` and integer
//! work in wrapping `i64` before being narrowed back to the result type.

use super::native_tensor::{NativeTensor, from_f64_array, from_i64_array};
use super::ops;
use crate::engine::{BinaryKind, CumulativeKind, EngineError, EngineResult, ScalarType, UnaryKind};
use ndarray::ArrayD;

fn unsupported(op: impl ToString, scalar_type: ScalarType) -> EngineError {
    EngineError::UnsupportedScalarType {
        op: op.to_string(),
        scalar_type,
    }
}

/// Integer inputs to floating point kernels produce `Float`.
fn float_result_type(scalar_type: ScalarType) -> ScalarType {
    if scalar_type.is_floating_point() {
        scalar_type
    } else {
        ScalarType::Float
    }
}

fn float_map(t: &NativeTensor, f: fn(f64) -> f64) -> NativeTensor {
    from_f64_array(t.to_f64_array().mapv(f), float_result_type(t.scalar_type()))
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

fn sign_f64(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        v
    }
}

pub(crate) fn unary(op: UnaryKind, t: &NativeTensor) -> EngineResult<NativeTensor> {
    use UnaryKind::*;
    let st = t.scalar_type();
    Ok(match op {
        Exp => float_map(t, f64::exp),
        Expm1 => float_map(t, f64::exp_m1),
        Log => float_map(t, f64::ln),
        Log1p => float_map(t, f64::ln_1p),
        Sigmoid => float_map(t, sigmoid),
        Sin => float_map(t, f64::sin),
        Cos => float_map(t, f64::cos),
        Tan => float_map(t, f64::tan),
        Sinh => float_map(t, f64::sinh),
        Cosh => float_map(t, f64::cosh),
        Tanh => float_map(t, f64::tanh),
        Asin => float_map(t, f64::asin),
        Acos => float_map(t, f64::acos),
        Atan => float_map(t, f64::atan),
        Asinh => float_map(t, f64::asinh),
        Acosh => float_map(t, f64::acosh),
        Atanh => float_map(t, f64::atanh),
        Sqrt => float_map(t, f64::sqrt),
        Rsqrt => float_map(t, |v| 1.0 / v.sqrt()),
        Cbrt => float_map(t, f64::cbrt),
        Erf => float_map(t, ops::erf),
        Erfc => float_map(t, |v| 1.0 - ops::erf(v)),
        Abs | Neg | Sign | Floor | Ceil | Round => {
            if st == ScalarType::Bool && op != Abs {
                return Err(unsupported(op, st));
            }
            if st.is_floating_point() {
                let f: fn(f64) -> f64 = match op {
                    Abs => f64::abs,
                    Neg => |v| -v,
                    Sign => sign_f64,
                    Floor => f64::floor,
                    Ceil => f64::ceil,
                    // half-to-even, like the native runtime
                    _ => f64::round_ties_even,
                };
                from_f64_array(t.to_f64_array().mapv(f), st)
            } else {
                let f: fn(i64) -> i64 = match op {
                    Abs => i64::wrapping_abs,
                    Neg => i64::wrapping_neg,
                    Sign => i64::signum,
                    _ => |v| v,
                };
                from_i64_array(t.to_i64_array().mapv(f), st)
            }
        }
        BitwiseNot => {
            if st.is_floating_point() {
                return Err(unsupported(op, st));
            }
            if st == ScalarType::Bool {
                t.to_i64_array().mapv(|v| v == 0).into()
            } else {
                from_i64_array(t.to_i64_array().mapv(|v| !v), st)
            }
        }
        LogicalNot => t.to_f64_array().mapv(|v| v == 0.0).into(),
        IsNan => t.to_f64_array().mapv(f64::is_nan).into(),
        IsInf => t.to_f64_array().mapv(f64::is_infinite).into(),
    })
}

fn float_zip(op: &str, a: &NativeTensor, b: &NativeTensor, out: ScalarType, f: impl Fn(f64, f64) -> f64) -> EngineResult<NativeTensor> {
    let (x, y) = (a.to_f64_array().into_shared(), b.to_f64_array().into_shared());
    Ok(from_f64_array(ops::zip_map(op, &x, &y, f)?, out))
}

fn int_zip(op: &str, a: &NativeTensor, b: &NativeTensor, out: ScalarType, f: impl Fn(i64, i64) -> i64) -> EngineResult<NativeTensor> {
    let (x, y) = (a.to_i64_array().into_shared(), b.to_i64_array().into_shared());
    Ok(from_i64_array(ops::zip_map(op, &x, &y, f)?, out))
}

fn predicate(
    op: &str,
    a: &NativeTensor,
    b: &NativeTensor,
    common: ScalarType,
    float: impl Fn(f64, f64) -> bool,
    int: impl Fn(i64, i64) -> bool,
) -> EngineResult<NativeTensor> {
    if common.is_floating_point() {
        let (x, y) = (a.to_f64_array().into_shared(), b.to_f64_array().into_shared());
        Ok(ops::zip_map(op, &x, &y, float)?.into())
    } else {
        let (x, y) = (a.to_i64_array().into_shared(), b.to_i64_array().into_shared());
        Ok(ops::zip_map(op, &x, &y, int)?.into())
    }
}

fn shift_left(x: i64, y: i64) -> i64 {
    if (0..64).contains(&y) { x.wrapping_shl(y as u32) } else { 0 }
}

fn shift_right(x: i64, y: i64) -> i64 {
    match y {
        0..=63 => x >> y,
        _ if x < 0 => -1,
        _ => 0,
    }
}

fn nan_aware(f: fn(f64, f64) -> f64) -> impl Fn(f64, f64) -> f64 {
    move |x, y| if x.is_nan() || y.is_nan() { f64::NAN } else { f(x, y) }
}

pub(crate) fn binary(op: BinaryKind, a: &NativeTensor, b: &NativeTensor) -> EngineResult<NativeTensor> {
    use BinaryKind::*;
    let (sa, sb) = (a.scalar_type(), b.scalar_type());
    let common = ScalarType::promote(sa, sb);
    let name = op.to_string();
    match op {
        BitwiseAnd | BitwiseOr | BitwiseXor | LeftShift | RightShift => {
            if let Some(st) = [sa, sb].into_iter().find(ScalarType::is_floating_point) {
                return Err(unsupported(op, st));
            }
            if op.is_bitwise() && sa.bits() < sb.bits() {
                return Err(EngineError::invalid(
                    &name,
                    format!("the first operand ({sa}) must be at least as wide as the second ({sb})"),
                ));
            }
            let f: fn(i64, i64) -> i64 = match op {
                BitwiseAnd => |x, y| x & y,
                BitwiseOr => |x, y| x | y,
                BitwiseXor => |x, y| x ^ y,
                LeftShift => shift_left,
                _ => shift_right,
            };
            int_zip(&name, a, b, common, f)
        }
        Add | Sub | Mul | Minimum | Maximum => {
            if common.is_floating_point() {
                let f: fn(f64, f64) -> f64 = match op {
                    Add => |x, y| x + y,
                    Sub => |x, y| x - y,
                    Mul => |x, y| x * y,
                    Minimum => f64::min,
                    _ => f64::max,
                };
                float_zip(&name, a, b, common, nan_aware(f))
            } else {
                let f: fn(i64, i64) -> i64 = match op {
                    Add => i64::wrapping_add,
                    Sub => i64::wrapping_sub,
                    Mul => i64::wrapping_mul,
                    Minimum => i64::min,
                    _ => i64::max,
                };
                int_zip(&name, a, b, common, f)
            }
        }
        Div => float_zip(&name, a, b, float_result_type(common), |x, y| x / y),
        Atan2 => float_zip(&name, a, b, float_result_type(common), f64::atan2),
        Pow => {
            if common.is_floating_point() {
                float_zip(&name, a, b, common, f64::powf)
            } else {
                if b.to_i64_array().iter().any(|e| *e < 0) {
                    return Err(EngineError::invalid(&name, "integers to negative integer powers are not allowed"));
                }
                int_zip(&name, a, b, common, |x, e| x.wrapping_pow(e.min(u32::MAX as i64) as u32))
            }
        }
        Fmod | TruncDiv => {
            if common.is_floating_point() {
                let f: fn(f64, f64) -> f64 = if op == Fmod { |x, y| x % y } else { |x, y| (x / y).trunc() };
                float_zip(&name, a, b, common, f)
            } else {
                if b.to_i64_array().iter().any(|e| *e == 0) {
                    return Err(EngineError::invalid(&name, "integer division by zero"));
                }
                let f: fn(i64, i64) -> i64 = if op == Fmod { i64::wrapping_rem } else { i64::wrapping_div };
                int_zip(&name, a, b, common, f)
            }
        }
        Eq => predicate(&name, a, b, common, |x, y| x == y, |x, y| x == y),
        Ne => predicate(&name, a, b, common, |x, y| x != y, |x, y| x != y),
        Gt => predicate(&name, a, b, common, |x, y| x > y, |x, y| x > y),
        Lt => predicate(&name, a, b, common, |x, y| x < y, |x, y| x < y),
        Ge => predicate(&name, a, b, common, |x, y| x >= y, |x, y| x >= y),
        Le => predicate(&name, a, b, common, |x, y| x <= y, |x, y| x <= y),
        LogicalAnd => predicate(&name, a, b, ScalarType::Double, |x, y| x != 0.0 && y != 0.0, |_, _| false),
        LogicalOr => predicate(&name, a, b, ScalarType::Double, |x, y| x != 0.0 || y != 0.0, |_, _| false),
        LogicalXor => predicate(&name, a, b, ScalarType::Double, |x, y| (x != 0.0) != (y != 0.0), |_, _| false),
    }
}

pub(crate) fn where_self(condition: &NativeTensor, a: &NativeTensor, b: &NativeTensor) -> EngineResult<NativeTensor> {
    let common = ScalarType::promote(a.scalar_type(), b.scalar_type());
    let c = condition.to_f64_array().mapv(|v| v != 0.0).into_shared();
    if common.is_floating_point() {
        let (x, y) = (a.to_f64_array().into_shared(), b.to_f64_array().into_shared());
        let out = ops::zip_map3("where", &c, &x, &y, |c, x, y| if c { x } else { y })?;
        Ok(from_f64_array(out, common))
    } else {
        let (x, y) = (a.to_i64_array().into_shared(), b.to_i64_array().into_shared());
        let out = ops::zip_map3("where", &c, &x, &y, |c, x, y| if c { x } else { y })?;
        Ok(from_i64_array(out, common))
    }
}

pub(crate) fn clamp(t: &NativeTensor, min: &NativeTensor, max: &NativeTensor) -> EngineResult<NativeTensor> {
    let common = ScalarType::promote(ScalarType::promote(t.scalar_type(), min.scalar_type()), max.scalar_type());
    if common.is_floating_point() {
        let (v, lo, hi) = (t.to_f64_array().into_shared(), min.to_f64_array().into_shared(), max.to_f64_array().into_shared());
        let out = ops::zip_map3("clamp", &v, &lo, &hi, |v, lo, hi| if v.is_nan() { v } else { v.max(lo).min(hi) })?;
        Ok(from_f64_array(out, common))
    } else {
        let (v, lo, hi) = (t.to_i64_array().into_shared(), min.to_i64_array().into_shared(), max.to_i64_array().into_shared());
        let out = ops::zip_map3("clamp", &v, &lo, &hi, |v, lo, hi| v.max(lo).min(hi))?;
        Ok(from_i64_array(out, common))
    }
}

fn check_reducible(op: &str, t: &NativeTensor, dims: &[usize]) -> EngineResult<()> {
    let shape = t.shape();
    let empty = if dims.is_empty() { t.is_empty() } else { dims.iter().any(|d| shape[*d] == 0) };
    if empty {
        return Err(EngineError::invalid(op, "cannot reduce over a zero-sized dimension"));
    }
    Ok(())
}

/// Integer sums and products accumulate in `Long`.
pub(crate) fn sum(t: &NativeTensor, dims: &[usize], keepdim: bool) -> NativeTensor {
    let st = t.scalar_type();
    if st.is_floating_point() {
        from_f64_array(ops::reduce_dims(t.to_f64_array(), dims, keepdim, 0.0, |x, y| x + y), st)
    } else {
        ops::reduce_dims(t.to_i64_array(), dims, keepdim, 0, i64::wrapping_add).into()
    }
}

pub(crate) fn prod(t: &NativeTensor, dims: &[usize], keepdim: bool) -> NativeTensor {
    let st = t.scalar_type();
    if st.is_floating_point() {
        from_f64_array(ops::reduce_dims(t.to_f64_array(), dims, keepdim, 1.0, |x, y| x * y), st)
    } else {
        ops::reduce_dims(t.to_i64_array(), dims, keepdim, 1, i64::wrapping_mul).into()
    }
}

pub(crate) fn extremum(t: &NativeTensor, dims: &[usize], keepdim: bool, max: bool) -> EngineResult<NativeTensor> {
    let op = if max { "amax" } else { "amin" };
    check_reducible(op, t, dims)?;
    let st = t.scalar_type();
    Ok(if st.is_floating_point() {
        let init = if max { f64::NEG_INFINITY } else { f64::INFINITY };
        let f: fn(f64, f64) -> f64 = if max { f64::max } else { f64::min };
        from_f64_array(ops::reduce_dims(t.to_f64_array(), dims, keepdim, init, nan_aware(f)), st)
    } else {
        let init = if max { i64::MIN } else { i64::MAX };
        let f: fn(i64, i64) -> i64 = if max { i64::max } else { i64::min };
        from_i64_array(ops::reduce_dims(t.to_i64_array(), dims, keepdim, init, f), st)
    })
}

pub(crate) fn all(t: &NativeTensor, dims: &[usize], keepdim: bool) -> NativeTensor {
    let truthy = t.to_f64_array().mapv(|v| v != 0.0);
    ops::reduce_dims(truthy, dims, keepdim, true, |x, y| x && y).into()
}

pub(crate) fn any(t: &NativeTensor, dims: &[usize], keepdim: bool) -> NativeTensor {
    let truthy = t.to_f64_array().mapv(|v| v != 0.0);
    ops::reduce_dims(truthy, dims, keepdim, false, |x, y| x || y).into()
}

pub(crate) fn cumulative(op: CumulativeKind, t: &NativeTensor, dim: usize) -> NativeTensor {
    let st = t.scalar_type();
    let widen = matches!(op, CumulativeKind::Cumsum | CumulativeKind::Cumprod);
    if st.is_floating_point() {
        let f: fn(f64, f64) -> f64 = match op {
            CumulativeKind::Cumsum => |x, y| x + y,
            CumulativeKind::Cumprod => |x, y| x * y,
            CumulativeKind::Cummax => f64::max,
            CumulativeKind::Cummin => f64::min,
        };
        from_f64_array(ops::accumulate(t.to_f64_array(), dim, nan_aware(f)), st)
    } else {
        let f: fn(i64, i64) -> i64 = match op {
            CumulativeKind::Cumsum => i64::wrapping_add,
            CumulativeKind::Cumprod => i64::wrapping_mul,
            CumulativeKind::Cummax => i64::max,
            CumulativeKind::Cummin => i64::min,
        };
        let out = if widen { ScalarType::Long } else { st };
        from_i64_array(ops::accumulate(t.to_i64_array(), dim, f), out)
    }
}

pub(crate) fn tensordot(a: &NativeTensor, b: &NativeTensor, dims_a: &[usize], dims_b: &[usize]) -> EngineResult<NativeTensor> {
    let common = ScalarType::promote(a.scalar_type(), b.scalar_type());
    if common.is_floating_point() {
        let out = ops::tensordot(&a.to_f64_array(), &b.to_f64_array(), dims_a, dims_b)?;
        Ok(from_f64_array(out, common))
    } else {
        let out = ops::tensordot(&a.to_i64_array(), &b.to_i64_array(), dims_a, dims_b)?;
        Ok(from_i64_array(out, common))
    }
}

pub(crate) fn matmul(a: &NativeTensor, b: &NativeTensor) -> EngineResult<NativeTensor> {
    let common = ScalarType::promote(a.scalar_type(), b.scalar_type());
    if common.is_floating_point() {
        let out = ops::batched_matmul(&a.to_f64_array(), &b.to_f64_array())?;
        Ok(from_f64_array(out, common))
    } else {
        let out = ops::batched_matmul(&a.to_i64_array(), &b.to_i64_array())?;
        Ok(from_i64_array(out, common))
    }
}

macro_rules! cat_variant {
    ($xs:expr, $dim:expr, $variant:ident) => {{
        let arrays = $xs
            .iter()
            .map(|t| match t {
                NativeTensor::$variant(x) => Ok(x.clone()),
                other => Err(EngineError::invalid("cat", format!("unexpected {} operand", other.scalar_type()))),
            })
            .collect::<EngineResult<Vec<_>>>()?;
        NativeTensor::from(ops::cat(&arrays, $dim)?)
    }};
}

/// Concatenates along `dim` after promoting every operand to a common type.
pub(crate) fn cat(xs: &[NativeTensor], dim: usize) -> EngineResult<NativeTensor> {
    let Some(first) = xs.first() else {
        return Err(EngineError::invalid("cat", "expected a non-empty list of tensors"));
    };
    let common = xs.iter().skip(1).fold(first.scalar_type(), |acc, t| ScalarType::promote(acc, t.scalar_type()));
    let xs: Vec<NativeTensor> = xs.iter().map(|t| t.cast(common)).collect();
    Ok(match common {
        ScalarType::Byte => cat_variant!(xs, dim, Byte),
        ScalarType::Char => cat_variant!(xs, dim, Char),
        ScalarType::Short => cat_variant!(xs, dim, Short),
        ScalarType::Int => cat_variant!(xs, dim, Int),
        ScalarType::Long => cat_variant!(xs, dim, Long),
        ScalarType::Half => cat_variant!(xs, dim, Half),
        ScalarType::BFloat16 => cat_variant!(xs, dim, BFloat16),
        ScalarType::Float => cat_variant!(xs, dim, Float),
        ScalarType::Double => cat_variant!(xs, dim, Double),
        ScalarType::Bool => cat_variant!(xs, dim, Bool),
    })
}
