use crate::bridge_tests::{Harness, assert_close_f32, spec};
use tensor_bridge::engine::ndarray_engine::EngineCall;
use tensor_bridge::{DType, LogicalTensor, ScalarType};

fn call<'a>(trace: &'a [EngineCall], op: &str) -> &'a EngineCall {
    trace.iter().find(|c| c.op == op).unwrap()
}

pub fn test_add_fp32(h: &Harness) {
    let a = h.tensor(vec![0.15163845f32, 0.31361532, 5.393808], &[3]);
    let b = h.tensor(vec![1.3424649f32, 0.004955234, 6.920299], &[3]);
    let result = h.bridge.add(&spec(&[3], DType::F32), &a, &b).unwrap();
    assert_close_f32(h, &result, &[1.4941034, 0.31857055, 12.314107]);
}

pub fn test_add_byte_to_short_does_not_wrap(h: &Harness) {
    let a = h.tensor(vec![200u8, 255, 7], &[3]);
    let b = h.tensor(vec![100i16, 1000, -8], &[3]);
    h.engine.enable_trace();
    let result = h.bridge.add(&spec(&[3], DType::I16), &a, &b).unwrap();
    let trace = h.engine.take_trace();
    assert_eq!(call(&trace, "add").inputs, vec![ScalarType::Short, ScalarType::Short]);
    assert_eq!(h.read::<i16>(&result), vec![300, 1255, -1]);
}

pub fn test_byte_meets_float(h: &Harness) {
    let a = h.tensor(vec![250u8, 3], &[2]);
    let b = h.tensor(vec![0.5f32, 0.25], &[2]);
    let result = h.bridge.multiply(&spec(&[2], DType::F32), &a, &b).unwrap();
    assert_close_f32(h, &result, &[125.0, 0.75]);
}

pub fn test_bitwise_and_puts_wider_operand_first(h: &Harness) {
    let a = h.tensor(vec![0b0110i8, -1], &[2]);
    let b = h.tensor(vec![0b0011i32, 0x1234], &[2]);
    h.engine.enable_trace();
    let result = h.bridge.bitwise_and(&spec(&[2], DType::I32), &a, &b).unwrap();
    let trace = h.engine.take_trace();
    assert_eq!(call(&trace, "bitwise_and").inputs, vec![ScalarType::Int, ScalarType::Char]);
    assert_eq!(h.read::<i32>(&result), vec![0b0010, 0x1234]);
}

pub fn test_round_half_to_even(h: &Harness) {
    let t = h.tensor(vec![0.5f32, 1.5, 2.5, -0.5, -2.5, 2.6], &[6]);
    let result = h.bridge.round(&spec(&[6], DType::F32), &t).unwrap();
    assert_close_f32(h, &result, &[0.0, 2.0, 2.0, 0.0, -2.0, 3.0]);
}

pub fn test_divide_integers(h: &Harness) {
    let a = h.tensor(vec![1i32, 3, -7], &[3]);
    let b = h.tensor(vec![2i32, 2, 2], &[3]);
    let result = h.bridge.divide(&spec(&[3], DType::F32), &a, &b).unwrap();
    assert_close_f32(h, &result, &[0.5, 1.5, -3.5]);
    let quotient = h.bridge.quotient(&spec(&[3], DType::I32), &a, &b).unwrap();
    assert_eq!(h.read::<i32>(&quotient), vec![0, 1, -3]);
    let remainder = h.bridge.remainder(&spec(&[3], DType::I32), &a, &b).unwrap();
    assert_eq!(h.read::<i32>(&remainder), vec![1, 1, -1]);
}

pub fn test_unary_on_integers_yields_float(h: &Harness) {
    let t = h.tensor(vec![0i32, 1, 4], &[3]);
    let result = h.bridge.sqrt(&spec(&[3], DType::F32), &t).unwrap();
    assert_close_f32(h, &result, &[0.0, 1.0, 2.0]);
    let negated = h.bridge.negate(&spec(&[3], DType::I32), &t).unwrap();
    assert_eq!(h.read::<i32>(&negated), vec![0, -1, -4]);
}

pub fn test_comparisons_produce_bytes(h: &Harness) {
    let a = h.tensor(vec![1.0f32, 2.0, f32::NAN], &[3]);
    let b = h.tensor(vec![2.0f32, 1.0, 0.0], &[3]);
    let greater = h.bridge.greater(&spec(&[3], DType::U8), &a, &b).unwrap();
    assert_eq!(h.read::<u8>(&greater), vec![0, 1, 0]);
    let nan = h.bridge.is_nan(&spec(&[3], DType::U8), &a).unwrap();
    assert_eq!(h.read::<u8>(&nan), vec![0, 0, 1]);
    let both = h.bridge.logical_and(&spec(&[3], DType::U8), &greater, &nan).unwrap();
    assert_eq!(h.read::<u8>(&both), vec![0, 0, 0]);
}

pub fn test_select_and_clip(h: &Harness) {
    let pred = h.tensor(vec![1u8, 0, 1], &[3]);
    let on_true = h.tensor(vec![1i32, 2, 3], &[3]);
    let on_false = h.tensor(vec![10i32, 20, 30], &[3]);
    let picked = h.bridge.select(&spec(&[3], DType::I32), &pred, &on_true, &on_false).unwrap();
    assert_eq!(h.read::<i32>(&picked), vec![1, 20, 3]);

    let t = h.tensor(vec![-1.0f32, 0.5, 3.0], &[3]);
    let lo = h.tensor(vec![0.0f32], &[]);
    let hi = h.tensor(vec![1.0f32], &[]);
    let clipped = h.bridge.clip(&spec(&[3], DType::F32), &t, &lo, &hi).unwrap();
    assert_close_f32(h, &clipped, &[0.0, 0.5, 1.0]);
}

pub fn test_host_operands_leave_nothing_behind(h: &Harness) {
    let a = LogicalTensor::from_vec(vec![1.0f32, 2.0], vec![2]).unwrap();
    let b = LogicalTensor::from_vec(vec![3u8, 4], vec![2]).unwrap();
    let before = h.engine.live_tensors();
    let result = h.bridge.subtract(&spec(&[2], DType::F32), &a, &b).unwrap();
    assert_eq!(h.engine.live_tensors(), before + 1);
    assert_close_f32(h, &result, &[-2.0, -2.0]);
    h.release(&[&result]);
    assert_eq!(h.engine.live_tensors(), before);
}

pub fn test_failed_op_leaves_nothing_behind(h: &Harness) {
    let a = LogicalTensor::from_vec(vec![1.5f32, 2.0], vec![2]).unwrap();
    let b = LogicalTensor::from_vec(vec![1i32, 2], vec![2]).unwrap();
    let before = h.engine.live_tensors();
    assert!(h.bridge.bitwise_or(&spec(&[2], DType::I32), &a, &b).is_err());
    assert_eq!(h.engine.live_tensors(), before);
}
