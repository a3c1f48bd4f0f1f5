//! Text rendering of tensor contents.

use crate::dtype::DType;
use half::{bf16, f16};

fn format_floats<T: bytemuck::Pod>(bytes: &[u8], to_f64: impl Fn(T) -> f64) -> Vec<String> {
    bytemuck::pod_collect_to_vec::<u8, T>(bytes)
        .into_iter()
        .map(|v| format!("{:?}", to_f64(v)))
        .collect()
}

fn format_ints<T: bytemuck::Pod + ToString>(bytes: &[u8]) -> Vec<String> {
    bytemuck::pod_collect_to_vec::<u8, T>(bytes)
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Formats every element in `bytes` as `dtype`.
pub(crate) fn format_elements(dtype: DType, bytes: &[u8]) -> Vec<String> {
    match dtype {
        DType::F64 => format_floats::<f64>(bytes, |v| v),
        DType::F32 => format_floats::<f32>(bytes, |v| v as f64),
        DType::BF16 => format_floats::<bf16>(bytes, bf16::to_f64),
        DType::F16 => format_floats::<f16>(bytes, f16::to_f64),
        DType::U64 => format_ints::<u64>(bytes),
        DType::I64 => format_ints::<i64>(bytes),
        DType::U32 => format_ints::<u32>(bytes),
        DType::I32 => format_ints::<i32>(bytes),
        DType::U16 => format_ints::<u16>(bytes),
        DType::I16 => format_ints::<i16>(bytes),
        DType::U8 => format_ints::<u8>(bytes),
        DType::I8 => format_ints::<i8>(bytes),
    }
}

fn newline(out: &mut String, depth: usize) {
    out.push('\n');
    out.push_str(&"  ".repeat(depth));
}

/// Returns false once `values` ran out and the rest was elided.
fn nest(shape: &[u64], values: &[String], pos: &mut usize, depth: usize, out: &mut String) -> bool {
    let Some((n, rest)) = shape.split_first() else {
        return match values.get(*pos) {
            Some(v) => {
                out.push_str(v);
                *pos += 1;
                true
            }
            None => {
                out.push_str("...");
                false
            }
        };
    };
    out.push('[');
    let mut complete = true;
    for i in 0..*n {
        if i > 0 {
            out.push(',');
            if rest.is_empty() {
                out.push(' ');
            }
        }
        if !rest.is_empty() {
            newline(out, depth + 1);
        }
        if *pos >= values.len() {
            out.push_str("...");
            complete = false;
            break;
        }
        if !nest(rest, values, pos, depth + 1, out) {
            complete = false;
            break;
        }
    }
    if !rest.is_empty() && *n > 0 {
        newline(out, depth);
    }
    out.push(']');
    complete
}

/// Renders `spec`-shaped values as `dtype[d0][d1]` followed by nested brackets.
/// `values` may hold fewer elements than the shape; the rest is shown as `...`.
pub(crate) fn render(dtype: DType, shape: &[u64], values: &[String]) -> String {
    let mut out = dtype.to_string();
    for d in shape {
        out.push_str(&format!("[{d}]"));
    }
    out.push('\n');
    let mut pos = 0;
    nest(shape, values, &mut pos, 0, &mut out);
    out
}

pub(crate) fn device_advisory(device: impl std::fmt::Display) -> String {
    format!(
        "Tensors on the {device} device cannot be inspected. Explicitly transfer the tensor by calling backend_transfer first."
    )
}
