use crate::bridge_tests::{Harness, assert_close_f32, spec};
use tensor_bridge::bridge::{ArgReduceOptions, CumulativeOptions, ReduceOptions, SortDirection, SortOptions, TieBreak};
use tensor_bridge::{BridgeError, DType, LogicalTensor, OpName};

pub fn test_sum_widens_integers(h: &Harness) {
    let t = h.tensor(vec![100i8, 100, 100], &[3]);
    let total = h.bridge.sum(&spec(&[], DType::I64), &t, &ReduceOptions::all()).unwrap();
    assert_eq!(h.read::<i64>(&total), vec![300]);
}

pub fn test_sum_over_axis_fp32(h: &Harness) {
    let t = h.tensor(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
    let columns = h.bridge.sum(&spec(&[3], DType::F32), &t, &ReduceOptions::axes([0])).unwrap();
    assert_close_f32(h, &columns, &[5.0, 7.0, 9.0]);
    let kept = h
        .bridge
        .sum(&spec(&[1, 1], DType::F32), &t, &ReduceOptions::all().keep_axes(true))
        .unwrap();
    assert_eq!(kept.shape(), &[1, 1]);
    assert_close_f32(h, &kept, &[21.0]);
}

pub fn test_sum_rejects_wide_unsigned_with_hint(h: &Harness) {
    let t = LogicalTensor::from_vec(vec![1u32, 2], vec![2]).unwrap();
    match h.bridge.sum(&spec(&[], DType::U32), &t, &ReduceOptions::all()).unwrap_err() {
        BridgeError::UnsupportedType(err) => {
            assert_eq!(err.bits, 32);
            assert!(err.hint.is_some());
        }
        other => panic!("unexpected error {other}"),
    }
}

pub fn test_product_over_several_axes(h: &Harness) {
    let t = h.tensor(vec![1i64, 2, 3, 4, 5, 6], &[1, 2, 3]);
    let all = h.bridge.product(&spec(&[], DType::I64), &t, &ReduceOptions::axes([0, 1, 2])).unwrap();
    assert_eq!(h.read::<i64>(&all), vec![720]);
    let inner = h.bridge.product(&spec(&[1], DType::I64), &t, &ReduceOptions::axes([2, 1])).unwrap();
    assert_eq!(h.read::<i64>(&inner), vec![720]);
    let kept = h
        .bridge
        .product(&spec(&[1, 2, 1], DType::I64), &t, &ReduceOptions::axes([0, 2]).keep_axes(true))
        .unwrap();
    assert_eq!(h.read::<i64>(&kept), vec![6, 120]);
}

pub fn test_all_and_any(h: &Harness) {
    let t = h.tensor(vec![1u8, 0, 1, 1], &[2, 2]);
    let all_rows = h.bridge.all(&spec(&[2], DType::U8), &t, &ReduceOptions::axes([1])).unwrap();
    assert_eq!(h.read::<u8>(&all_rows), vec![0, 1]);
    let any = h.bridge.any(&spec(&[], DType::U8), &t, &ReduceOptions::axes([0, 1])).unwrap();
    assert_eq!(h.read::<u8>(&any), vec![1]);
    let all = h.bridge.all(&spec(&[1, 1], DType::U8), &t, &ReduceOptions::all().keep_axes(true)).unwrap();
    assert_eq!(h.read::<u8>(&all), vec![0]);
}

pub fn test_reduce_max_and_min(h: &Harness) {
    let t = h.tensor(vec![3i32, -1, 7, 2], &[2, 2]);
    let max = h.bridge.reduce_max(&spec(&[2], DType::I32), &t, &ReduceOptions::axes([1])).unwrap();
    assert_eq!(h.read::<i32>(&max), vec![3, 7]);
    let min = h.bridge.reduce_min(&spec(&[], DType::I32), &t, &ReduceOptions::all()).unwrap();
    assert_eq!(h.read::<i32>(&min), vec![-1]);
}

pub fn test_argmax_first_index_wins(h: &Harness) {
    let t = h.tensor(vec![1.0f32, 3.0, 3.0, 0.0, 5.0, 5.0], &[2, 3]);
    let flat = h.bridge.argmax(&spec(&[], DType::I64), &t, &ArgReduceOptions::default()).unwrap();
    assert_eq!(h.read::<i64>(&flat), vec![4]);
    let options = ArgReduceOptions {
        axis: Some(1),
        keep_axis: true,
        ..Default::default()
    };
    let rows = h.bridge.argmax(&spec(&[2, 1], DType::I32), &t, &options).unwrap();
    assert_eq!(h.read::<i32>(&rows), vec![1, 1]);
    let lowest = h.bridge.argmin(&spec(&[], DType::I64), &t, &ArgReduceOptions::default()).unwrap();
    assert_eq!(h.read::<i64>(&lowest), vec![3]);
}

pub fn test_argmax_rejects_high_tie_break(h: &Harness) {
    let t = h.tensor(vec![1.0f32, 1.0], &[2]);
    let options = ArgReduceOptions {
        tie_break: TieBreak::High,
        ..Default::default()
    };
    let err = h.bridge.argmax(&spec(&[], DType::I64), &t, &options).unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedOption { op: OpName::Argmax, .. }));
}

pub fn test_cumulative_ops(h: &Harness) {
    let t = h.tensor(vec![1i32, 2, 3], &[3]);
    let forward = CumulativeOptions { axis: 0, reverse: false };
    let reverse = CumulativeOptions { axis: 0, reverse: true };
    let sums = h.bridge.cumulative_sum(&spec(&[3], DType::I32), &t, &forward).unwrap();
    assert_eq!(h.read::<i32>(&sums), vec![1, 3, 6]);
    let reversed = h.bridge.cumulative_sum(&spec(&[3], DType::I32), &t, &reverse).unwrap();
    assert_eq!(h.read::<i32>(&reversed), vec![6, 5, 3]);
    let products = h.bridge.cumulative_product(&spec(&[3], DType::I64), &t, &reverse).unwrap();
    assert_eq!(h.read::<i64>(&products), vec![6, 6, 3]);

    let m = h.tensor(vec![2.0f32, 1.0, 3.0, 0.5], &[2, 2]);
    let across = CumulativeOptions { axis: 1, reverse: false };
    let max = h.bridge.cumulative_max(&spec(&[2, 2], DType::F32), &m, &across).unwrap();
    assert_close_f32(h, &max, &[2.0, 2.0, 3.0, 3.0]);
    let min = h.bridge.cumulative_min(&spec(&[2, 2], DType::F32), &m, &across).unwrap();
    assert_close_f32(h, &min, &[2.0, 1.0, 3.0, 0.5]);
}

pub fn test_sort_and_argsort(h: &Harness) {
    let t = h.tensor(vec![3i32, 1, 2, 1], &[4]);
    let descending = SortOptions {
        axis: 0,
        direction: SortDirection::Descending,
    };
    let sorted = h.bridge.sort(&spec(&[4], DType::I32), &t, &descending).unwrap();
    assert_eq!(h.read::<i32>(&sorted), vec![3, 2, 1, 1]);
    let order = h.bridge.argsort(&spec(&[4], DType::I64), &t, &SortOptions::default()).unwrap();
    assert_eq!(h.read::<i64>(&order), vec![1, 3, 2, 0]);
}
