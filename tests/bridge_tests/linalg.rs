use crate::bridge_tests::{Harness, assert_close, assert_close_f32, assert_close_f64, spec};
use tensor_bridge::bridge::{QrMode, Transform, TriangularSolveOptions};
use tensor_bridge::{BridgeError, DType, LogicalTensor, OpName};

fn matmul(h: &Harness, a: &LogicalTensor, b: &LogicalTensor) -> LogicalTensor {
    let out = spec(&[a.shape()[0], b.shape()[1]], DType::F64);
    h.bridge.dot(&out, a, &[1], &[], b, &[0], &[]).unwrap()
}

pub fn test_dot_2_3_fp32(h: &Harness) {
    let a = h.tensor(vec![1.0f32, -2.5, 3.0, 4.0, 0.5, -1.0], &[2, 3]);
    let b = h.tensor(vec![1.0f32, 2.0, 0.25, -0.75, 3.5, 0.0], &[3, 2]);
    let result = h.bridge.dot(&spec(&[2, 2], DType::F32), &a, &[1], &[], &b, &[0], &[]).unwrap();
    assert_close_f32(h, &result, &[10.875, 3.875, 0.625, 7.625]);
}

pub fn test_dot_vector_inner_product(h: &Harness) {
    let a = h.tensor(vec![1i32, 2, 3], &[3]);
    let b = h.tensor(vec![4i32, 5, 6], &[3]);
    let result = h.bridge.dot(&spec(&[], DType::I64), &a, &[0], &[], &b, &[0], &[]).unwrap();
    assert_eq!(h.read::<i64>(&result), vec![32]);
}

pub fn test_dot_batched(h: &Harness) {
    let a = h.tensor(vec![1.0f64, 2.0, 3.0, 4.0, 1.0, 0.0, 0.0, 1.0], &[2, 2, 2]);
    let b = h.tensor(vec![1.0f64, 1.0, 0.0, 1.0, 5.0, 6.0, 7.0, 8.0], &[2, 2, 2]);
    let result = h.bridge.dot(&spec(&[2, 2, 2], DType::F64), &a, &[2], &[0], &b, &[1], &[0]).unwrap();
    assert_close_f64(h, &result, &[1.0, 3.0, 3.0, 7.0, 5.0, 6.0, 7.0, 8.0]);

    let transposed = h.bridge.dot(&spec(&[2, 2, 2], DType::F64), &a, &[1], &[0], &b, &[1], &[0]).unwrap();
    assert_close_f64(h, &transposed, &[1.0, 4.0, 2.0, 6.0, 5.0, 6.0, 7.0, 8.0]);
}

pub fn test_triangular_solve_vector(h: &Harness) {
    let a = h.tensor(vec![2.0f64, 0.0, 1.0, 1.0], &[2, 2]);
    let b = h.tensor(vec![2.0f64, 3.0], &[2]);
    let x = h
        .bridge
        .triangular_solve(&spec(&[2], DType::F64), &a, &b, &TriangularSolveOptions::default())
        .unwrap();
    assert_close_f64(h, &x, &[1.0, 2.0]);
}

pub fn test_triangular_solve_upper_transposed(h: &Harness) {
    let a = h.tensor(vec![2.0f64, 1.0, 0.0, 1.0], &[2, 2]);
    let b = h.tensor(vec![2.0f64, 4.0, 3.0, 5.0], &[2, 2]);
    let options = TriangularSolveOptions {
        lower: false,
        transform_a: Transform::Transpose,
        ..Default::default()
    };
    let x = h.bridge.triangular_solve(&spec(&[2, 2], DType::F64), &a, &b, &options).unwrap();
    assert_close_f64(h, &x, &[1.0, 2.0, 2.0, 3.0]);
}

pub fn test_triangular_solve_singular(h: &Harness) {
    let b = h.tensor(vec![1.0f64, 1.0], &[2]);
    for values in [vec![0.0f64; 4], vec![1.0, 2.0, 2.0, 4.0]] {
        let a = h.tensor(values, &[2, 2]);
        h.engine.enable_trace();
        let before = h.engine.live_tensors();
        let err = h
            .bridge
            .triangular_solve(&spec(&[2], DType::F64), &a, &b, &TriangularSolveOptions::default())
            .unwrap_err();
        assert!(matches!(err, BridgeError::SingularMatrix { op: OpName::TriangularSolve }));
        assert!(h.engine.take_trace().iter().all(|c| c.op != "triangular_solve"));
        assert_eq!(h.engine.live_tensors(), before);
    }
}

pub fn test_triangular_solve_right_side_unsupported(h: &Harness) {
    let a = h.tensor(vec![1.0f64, 0.0, 0.0, 1.0], &[2, 2]);
    let options = TriangularSolveOptions {
        left_side: false,
        ..Default::default()
    };
    let err = h.bridge.triangular_solve(&spec(&[2, 2], DType::F64), &a, &a, &options).unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedOption { .. }));
}

pub fn test_solve_and_determinant(h: &Harness) {
    let a = h.tensor(vec![3.0f32, 1.0, 1.0, 2.0], &[2, 2]);
    let b = h.tensor(vec![9.0f32, 8.0], &[2]);
    let x = h.bridge.solve(&spec(&[2], DType::F32), &a, &b).unwrap();
    assert_close_f32(h, &x, &[2.0, 3.0]);
    let det = h.bridge.determinant(&spec(&[], DType::F32), &a).unwrap();
    assert_close_f32(h, &det, &[5.0]);

    let singular = h.tensor(vec![1.0f32, 2.0, 2.0, 4.0], &[2, 2]);
    let err = h.bridge.solve(&spec(&[2], DType::F32), &singular, &b).unwrap_err();
    assert!(matches!(err, BridgeError::SingularMatrix { op: OpName::Solve }));
}

pub fn test_cholesky(h: &Harness) {
    let a = h.tensor(vec![4.0f64, 2.0, 2.0, 3.0], &[2, 2]);
    let l = h.bridge.cholesky(&spec(&[2, 2], DType::F64), &a).unwrap();
    assert_close_f64(h, &l, &[2.0, 0.0, 1.0, 2.0f64.sqrt()]);
}

pub fn test_qr_reconstructs(h: &Harness) {
    let values = vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
    let a = h.tensor(values.clone(), &[3, 2]);
    let (q, r) = h
        .bridge
        .qr(&spec(&[3, 2], DType::F64), &spec(&[2, 2], DType::F64), &a, QrMode::Reduced)
        .unwrap();
    let product = matmul(h, &q, &r);
    assert_close_f64(h, &product, &values);
    let (q, _) = h
        .bridge
        .qr(&spec(&[3, 3], DType::F64), &spec(&[3, 2], DType::F64), &a, QrMode::Complete)
        .unwrap();
    assert_eq!(q.shape(), &[3, 3]);
}

pub fn test_lu_reconstructs(h: &Harness) {
    let values = vec![0.0f64, 2.0, 1.0, 1.0, 1.0, 0.0, 3.0, 0.0, 1.0];
    let a = h.tensor(values.clone(), &[3, 3]);
    let m = spec(&[3, 3], DType::F64);
    let (p, l, u) = h.bridge.lu(&m, &m, &m, &a).unwrap();
    let lu = matmul(h, &l, &u);
    let plu = matmul(h, &p, &lu);
    assert_close(&h.read_f64(&plu), &values, 1e-9, 1e-9);
}

pub fn test_lu_permutation_as_integers(h: &Harness) {
    let a = h.tensor(vec![0.0f64, 2.0, 1.0, 1.0, 1.0, 0.0, 3.0, 0.0, 1.0], &[3, 3]);
    let m = spec(&[3, 3], DType::F64);
    let (p, _l, _u) = h.bridge.lu(&spec(&[3, 3], DType::I32), &m, &m, &a).unwrap();
    assert_eq!(p.dtype(), DType::I32);
    let p = h.read::<i32>(&p);
    assert!(p.iter().all(|v| *v == 0 || *v == 1));
    for row in p.chunks(3) {
        assert_eq!(row.iter().sum::<i32>(), 1);
    }
    for col in 0..3 {
        assert_eq!((0..3).map(|row| p[row * 3 + col]).sum::<i32>(), 1);
    }
    assert_ne!(p, vec![1, 0, 0, 0, 1, 0, 0, 0, 1]);
}
