use crate::bridge_tests::{Harness, assert_close_f32, spec};
use tensor_bridge::{BridgeError, DType, OpName, Scalar};

pub fn test_reshape_fp32(h: &Harness) {
    let t = h.tensor(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
    let result = h.bridge.reshape(&spec(&[3, 2], DType::F32), &t).unwrap();
    assert_eq!(result.shape(), &[3, 2]);
    assert_close_f32(h, &result, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    assert!(h.bridge.reshape(&spec(&[4], DType::F32), &t).is_err());
}

pub fn test_transpose_reshape_fp32(h: &Harness) {
    let t = h.tensor(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
    let transposed = h.bridge.transpose(&spec(&[3, 2], DType::F32), &t, &[1, 0]).unwrap();
    assert_close_f32(h, &transposed, &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    let flat = h.bridge.reshape(&spec(&[6], DType::F32), &transposed).unwrap();
    assert_close_f32(h, &flat, &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
}

pub fn test_broadcast_places_axes(h: &Harness) {
    let row = h.tensor(vec![1i32, 2, 3], &[3]);
    let rows = h.bridge.broadcast(&spec(&[2, 3], DType::I32), &row, &[1]).unwrap();
    assert_eq!(h.read::<i32>(&rows), vec![1, 2, 3, 1, 2, 3]);
    let columns = h.bridge.broadcast(&spec(&[3, 2], DType::I32), &row, &[0]).unwrap();
    assert_eq!(h.read::<i32>(&columns), vec![1, 1, 2, 2, 3, 3]);

    let m = h.tensor(vec![1i32, 2, 3, 4, 5, 6], &[2, 3]);
    let swapped = h.bridge.broadcast(&spec(&[3, 2], DType::I32), &m, &[1, 0]).unwrap();
    assert_eq!(h.read::<i32>(&swapped), vec![1, 4, 2, 5, 3, 6]);
}

pub fn test_squeeze_and_reverse(h: &Harness) {
    let t = h.tensor(vec![1i64, 2, 3], &[1, 3, 1]);
    let squeezed = h.bridge.squeeze(&spec(&[3], DType::I64), &t, &[0, 2]).unwrap();
    assert_eq!(squeezed.shape(), &[3]);
    assert!(h.bridge.squeeze(&spec(&[1, 1], DType::I64), &t, &[1]).is_err());
    let reversed = h.bridge.reverse(&spec(&[3], DType::I64), &squeezed, &[0]).unwrap();
    assert_eq!(h.read::<i64>(&reversed), vec![3, 2, 1]);
}

pub fn test_concatenate_promotes_to_template(h: &Harness) {
    let a = h.tensor(vec![1u8, 2], &[2]);
    let b = h.tensor(vec![-3i8], &[1]);
    let result = h.bridge.concatenate(&spec(&[3], DType::I16), &[a, b], 0).unwrap();
    assert_eq!(result.dtype(), DType::I16);
    assert_eq!(h.read::<i16>(&result), vec![1, 2, -3]);
}

pub fn test_stack_adds_axis(h: &Harness) {
    let a = h.tensor(vec![1i32, 2], &[2]);
    let b = h.tensor(vec![3i32, 4], &[2]);
    let rows = h.bridge.stack(&spec(&[2, 2], DType::I32), &[a.clone(), b.clone()], 0).unwrap();
    assert_eq!(h.read::<i32>(&rows), vec![1, 2, 3, 4]);
    let columns = h.bridge.stack(&spec(&[2, 2], DType::I32), &[a, b], 1).unwrap();
    assert_eq!(h.read::<i32>(&columns), vec![1, 3, 2, 4]);
}

pub fn test_pad_edges(h: &Harness) {
    let t = h.tensor(vec![1i32, 2, 3, 4], &[2, 2]);
    let padded = h
        .bridge
        .pad(&spec(&[3, 3], DType::I32), &t, 9, &[(1, 0, 0), (0, 1, 0)])
        .unwrap();
    assert_eq!(h.read::<i32>(&padded), vec![9, 9, 9, 1, 2, 9, 3, 4, 9]);
    let cropped = h
        .bridge
        .pad(&spec(&[2, 1], DType::I32), &t, Scalar::Int(0), &[(0, 0, 0), (-1, 0, 0)])
        .unwrap();
    assert_eq!(h.read::<i32>(&cropped), vec![2, 4]);
}

pub fn test_pad_rejects_interior(h: &Harness) {
    let t = h.tensor(vec![1i32, 2], &[2]);
    let err = h.bridge.pad(&spec(&[3], DType::I32), &t, 0, &[(0, 0, 1)]).unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedOption { op: OpName::Pad, .. }));
}

pub fn test_as_type_truncates(h: &Harness) {
    let t = h.tensor(vec![1.7f32, -1.7, 255.0], &[3]);
    let ints = h.bridge.as_type(&spec(&[3], DType::I32), &t).unwrap();
    assert_eq!(h.read::<i32>(&ints), vec![1, -1, 255]);
    let same = h.bridge.as_type(&spec(&[3], DType::F32), &t).unwrap();
    assert_ne!(same.device_handle(), t.device_handle());
    h.release(&[&same]);
    assert_close_f32(h, &t, &[1.7, -1.7, 255.0]);
}
