use crate::bridge_tests::{Harness, assert_close_f32, spec};
use tensor_bridge::DType;

/// Reads `rows` of a row-major `[n, width]` matrix, materialising every element.
fn reference_rows(values: &[i32], width: usize, rows: &[usize]) -> Vec<i32> {
    rows.iter()
        .flat_map(|r| (0..width).map(move |c| values[r * width + c]))
        .collect()
}

pub fn test_gather_rows(h: &Harness) {
    let values = vec![1i32, 2, 3, 4, 5, 6];
    let t = h.tensor(values.clone(), &[3, 2]);
    let indices = h.tensor(vec![2i64, 0], &[2, 1]);
    let result = h.bridge.gather(&spec(&[2, 2], DType::I32), &t, &indices).unwrap();
    assert_eq!(h.read::<i32>(&result), vec![5, 6, 1, 2]);
    assert_eq!(h.read::<i32>(&result), reference_rows(&values, 2, &[2, 0]));
}

pub fn test_gather_full_coordinates(h: &Harness) {
    let t = h.tensor(vec![1i32, 2, 3, 4, 5, 6], &[3, 2]);
    let indices = h.tensor(vec![0i32, 1, 2, 0, 1, 1], &[3, 2]);
    let result = h.bridge.gather(&spec(&[3], DType::I32), &t, &indices).unwrap();
    assert_eq!(h.read::<i32>(&result), vec![2, 5, 4]);
}

pub fn test_take_rows(h: &Harness) {
    let values = vec![1i32, 2, 3, 4, 5, 6];
    let t = h.tensor(values.clone(), &[3, 2]);
    let indices = h.tensor(vec![2i64, 0, 2], &[3]);
    let result = h.bridge.take(&spec(&[3, 2], DType::I32), &t, &indices, 0).unwrap();
    assert_eq!(h.read::<i32>(&result), reference_rows(&values, 2, &[2, 0, 2]));
}

pub fn test_take_columns(h: &Harness) {
    let t = h.tensor(vec![1i32, 2, 3, 4, 5, 6], &[3, 2]);
    let indices = h.tensor(vec![1u8, 1, 0], &[3]);
    let result = h.bridge.take(&spec(&[3, 3], DType::I32), &t, &indices, 1).unwrap();
    assert_eq!(h.read::<i32>(&result), vec![2, 2, 1, 4, 4, 3, 6, 6, 5]);
}

pub fn test_take_with_matrix_indices(h: &Harness) {
    let t = h.tensor(vec![10.0f32, 20.0, 30.0], &[3]);
    let indices = h.tensor(vec![0i64, 2, 1, 1], &[2, 2]);
    let result = h.bridge.take(&spec(&[2, 2], DType::F32), &t, &indices, 0).unwrap();
    assert_close_f32(h, &result, &[10.0, 30.0, 20.0, 20.0]);
}

pub fn test_take_along_axis(h: &Harness) {
    let t = h.tensor(vec![10i32, 30, 20, 60, 40, 50], &[2, 3]);
    let indices = h.tensor(vec![0i64, 2, 1, 1, 2, 0], &[2, 3]);
    let result = h.bridge.take_along_axis(&spec(&[2, 3], DType::I32), &t, &indices, 1).unwrap();
    assert_eq!(h.read::<i32>(&result), vec![10, 20, 30, 40, 50, 60]);
}

pub fn test_indexed_add_accumulates(h: &Harness) {
    let t = h.tensor(vec![0.0f32; 4], &[2, 2]);
    let indices = h.tensor(vec![0i64, 0, 1, 1, 0, 0], &[3, 2]);
    let updates = h.tensor(vec![1.0f32, 2.0, 3.0], &[3]);
    let result = h.bridge.indexed_add(&spec(&[2, 2], DType::F32), &t, &indices, &updates).unwrap();
    assert_close_f32(h, &result, &[4.0, 0.0, 0.0, 2.0]);
}

pub fn test_indexed_put_overwrites(h: &Harness) {
    let t = h.tensor(vec![1i32, 1, 1, 1], &[2, 2]);
    let indices = h.tensor(vec![0i64, 1, 1, 0], &[2, 2]);
    let updates = h.tensor(vec![7i32, 8], &[2]);
    let result = h.bridge.indexed_put(&spec(&[2, 2], DType::I32), &t, &indices, &updates).unwrap();
    assert_eq!(h.read::<i32>(&result), vec![1, 7, 8, 1]);
    assert_eq!(h.read::<i32>(&t), vec![1, 1, 1, 1]);
}

pub fn test_indexed_put_needs_full_coordinates(h: &Harness) {
    let t = h.tensor(vec![1i32, 1, 1, 1], &[2, 2]);
    let indices = h.tensor(vec![0i64, 1], &[2, 1]);
    let updates = h.tensor(vec![7i32, 8], &[2]);
    assert!(h.bridge.indexed_put(&spec(&[2, 2], DType::I32), &t, &indices, &updates).is_err());
}
