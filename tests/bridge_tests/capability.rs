use crate::bridge_tests::{Harness, spec};
use std::str::FromStr;
use tensor_bridge::{BridgeError, Capability, DType, OpName};

pub fn test_structurally_unsupported_ops(h: &Harness) {
    let t = h.tensor(vec![1i32, 2], &[2]);
    let out = spec(&[2], DType::I32);
    let calls = [
        (OpName::Bitcast, h.bridge.bitcast(&out, &[&t])),
        (OpName::PopulationCount, h.bridge.population_count(&out, &[&t])),
        (OpName::CountLeadingZeros, h.bridge.count_leading_zeros(&out, &[&t])),
        (OpName::Map, h.bridge.map(&out, &[&t])),
        (OpName::Reduce, h.bridge.reduce(&out, &[&t])),
        (OpName::WindowReduce, h.bridge.window_reduce(&out, &[&t])),
    ];
    for (op, result) in calls {
        match result {
            Err(BridgeError::OperationNotSupported(refused)) => assert_eq!(refused, op),
            other => panic!("{op}: unexpected {other:?}"),
        }
    }
}

pub fn test_not_yet_supported_ops(h: &Harness) {
    let t = h.tensor(vec![1.0f32, 2.0], &[2]);
    let out = spec(&[2], DType::F32);
    let err = h.bridge.fft(&out, &[&t]).unwrap_err();
    assert!(matches!(err, BridgeError::OperationNotYetSupported(OpName::Fft)));
    assert!(err.to_string().contains("fft"));
    for op in [OpName::Svd, OpName::TopK, OpName::WindowScatterMin, OpName::ErfInv] {
        assert!(matches!(h.bridge.gate(op), Err(BridgeError::OperationNotYetSupported(refused)) if refused == op));
    }
}

pub fn test_registry_lookup(h: &Harness) {
    assert_eq!(OpName::from_str("indexed_add").unwrap().capability(), Capability::Implemented);
    assert_eq!(OpName::from_str("eigh").unwrap().capability(), Capability::NotYetSupported);
    for op in OpName::implemented() {
        h.bridge.gate(op).unwrap();
    }
}
