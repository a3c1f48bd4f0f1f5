use crate::bridge_tests::{Harness, spec};
use tensor_bridge::DType;
use tensor_bridge::bridge::Leftover;

fn strided_reference(values: &[i64], start: usize, length: usize, stride: usize) -> Vec<i64> {
    values[start..start + length].iter().step_by(stride).copied().collect()
}

pub fn test_slice_with_stride(h: &Harness) {
    let values: Vec<i64> = (0..10).collect();
    let t = h.tensor(values.clone(), &[10]);
    let result = h.bridge.slice(&spec(&[2], DType::I64), &t, &[2], &[4], &[2]).unwrap();
    assert_eq!(h.read::<i64>(&result), vec![2, 4]);
    assert_eq!(h.read::<i64>(&result), strided_reference(&values, 2, 4, 2));
}

pub fn test_slice_matrix(h: &Harness) {
    let t = h.tensor((0..16).collect::<Vec<i32>>(), &[4, 4]);
    let result = h
        .bridge
        .slice(&spec(&[2, 2], DType::I32), &t, &[1, 0], &[2, 4], &[1, 2])
        .unwrap();
    assert_eq!(h.read::<i32>(&result), vec![4, 6, 8, 10]);
    let strided_rows = h
        .bridge
        .slice(&spec(&[2, 2], DType::I32), &t, &[0, 1], &[3, 2], &[2, 1])
        .unwrap();
    assert_eq!(h.read::<i32>(&strided_rows), vec![1, 2, 9, 10]);
}

pub fn test_slice_clamps_start(h: &Harness) {
    let t = h.tensor((0..10).collect::<Vec<i64>>(), &[10]);
    let result = h.bridge.slice(&spec(&[4], DType::I64), &t, &[8], &[4], &[1]).unwrap();
    assert_eq!(h.read::<i64>(&result), vec![6, 7, 8, 9]);
}

pub fn test_put_slice(h: &Harness) {
    let t = h.tensor(vec![0.0f64; 9], &[3, 3]);
    let patch = h.tensor(vec![1i32, 2, 3, 4], &[2, 2]);
    let result = h.bridge.put_slice(&spec(&[3, 3], DType::F64), &t, &[1, 1], &patch).unwrap();
    assert_eq!(h.read::<f64>(&result), vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 0.0, 3.0, 4.0]);
    let clamped = h.bridge.put_slice(&spec(&[3, 3], DType::F64), &t, &[2, 5], &patch).unwrap();
    assert_eq!(h.read::<f64>(&clamped), h.read::<f64>(&result));
    assert_eq!(h.read::<f64>(&t), vec![0.0; 9]);
}

pub fn test_batches_repeat_leftover(h: &Harness) {
    let t = h.tensor((0..10).collect::<Vec<i64>>(), &[10]);
    let before = h.engine.live_tensors();
    let batches = h.bridge.to_batched(&spec(&[4], DType::I64), &t, Leftover::Repeat).unwrap();
    assert_eq!(h.engine.live_tensors(), before + 3);
    let values: Vec<Vec<i64>> = batches.iter().map(|b| h.read(b)).collect();
    assert_eq!(values, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9, 0, 1]]);
}

pub fn test_batches_discard_leftover(h: &Harness) {
    let t = h.tensor((0..10).collect::<Vec<i64>>(), &[10]);
    let before = h.engine.live_tensors();
    let batches = h.bridge.to_batched(&spec(&[4], DType::I64), &t, Leftover::default()).unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(h.engine.live_tensors(), before + 2);
    assert_eq!(h.read::<i64>(&batches[1]), vec![4, 5, 6, 7]);
}

pub fn test_batches_wrap_more_than_once(h: &Harness) {
    let t = h.tensor(vec![0u8, 1, 2, 3, 4, 5], &[3, 2]);
    let batches = h.bridge.to_batched(&spec(&[8, 2], DType::U8), &t, Leftover::Repeat).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(
        h.read::<u8>(&batches[0]),
        vec![0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5, 0, 1, 2, 3]
    );
}
