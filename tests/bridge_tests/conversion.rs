use crate::bridge_tests::{Harness, assert_close_f32, spec};
use std::io::Write;
use tensor_bridge::bridge::{InspectOptions, Target};
use tensor_bridge::{
    Bridge, BridgeConfig, BridgeError, DType, Deallocation, DeviceKind, DeviceSelector, LogicalTensor, NDArrayEngine,
    TensorData,
};

pub fn test_to_binary_with_limit(h: &Harness) {
    let t = h.tensor(vec![1i32, 2, 3, 4], &[4]);
    let all = h.bridge.to_binary(&t, None).unwrap();
    assert_eq!(all, bytemuck::cast_slice::<i32, u8>(&[1, 2, 3, 4]));
    let head = h.bridge.to_binary(&t, Some(2)).unwrap();
    assert_eq!(head, bytemuck::cast_slice::<i32, u8>(&[1, 2]));

    let host = LogicalTensor::from_vec(vec![5i16, 6, 7], vec![3]).unwrap();
    assert_eq!(h.bridge.to_binary(&host, Some(1)).unwrap(), bytemuck::cast_slice::<i16, u8>(&[5]));
}

pub fn test_to_binary_unbounded_limit(h: &Harness) {
    let host = LogicalTensor::from_vec(vec![1i32, 2, 3], vec![3]).unwrap();
    let bytes = h.bridge.to_binary(&host, Some(usize::MAX)).unwrap();
    assert_eq!(bytes, bytemuck::cast_slice::<i32, u8>(&[1, 2, 3]));

    let t = h.tensor(vec![1.5f64, -2.5], &[2]);
    let bytes = h.bridge.to_binary(&t, Some(usize::MAX)).unwrap();
    assert_eq!(bytes, bytemuck::cast_slice::<f64, u8>(&[1.5, -2.5]));
}

pub fn test_deallocate_is_idempotent(h: &Harness) {
    let t = h.tensor(vec![1.0f32, 2.0], &[2]);
    let before = h.engine.live_tensors();
    assert_eq!(h.bridge.backend_deallocate(&t).unwrap(), Deallocation::Released);
    assert_eq!(h.engine.live_tensors(), before - 1);
    assert_eq!(h.bridge.backend_deallocate(&t).unwrap(), Deallocation::AlreadyReleased);

    let host = LogicalTensor::from_vec(vec![1u8], vec![1]).unwrap();
    assert_eq!(h.bridge.backend_deallocate(&host).unwrap(), Deallocation::AlreadyReleased);
}

pub fn test_transfer_to_accelerator(_h: &Harness) {
    let h = Harness::with_engine(
        NDArrayEngine::with_seed(7).with_virtual_device(DeviceKind::Cuda),
        BridgeConfig::default(),
    );
    let t = h.tensor(vec![1.5f32, -2.0, 3.25], &[3]);
    let before = h.engine.live_tensors();
    let moved = h.bridge.backend_transfer(t, Target::Device(DeviceSelector::cuda(0))).unwrap();
    assert_eq!(h.engine.live_tensors(), before);
    assert_eq!(moved.device_handle().unwrap().device, DeviceSelector::cuda(0));

    let text = h.bridge.inspect(&moved, &InspectOptions::default()).unwrap();
    assert!(text.starts_with("ndarray(cuda:0)\nf32[3]\n"));
    assert!(text.contains("backend_transfer"));

    let back = h.bridge.backend_copy(&moved, Target::Host).unwrap();
    assert!(matches!(back.data(), TensorData::Host(_)));
    assert_eq!(back.to_vec::<f32>().unwrap(), vec![1.5, -2.0, 3.25]);
    assert_eq!(h.engine.live_tensors(), before);
}

pub fn test_unknown_device_is_reported(h: &Harness) {
    let t = h.tensor(vec![1i32], &[1]);
    let err = h.bridge.backend_copy(&t, Target::Device(DeviceSelector::cuda(0))).unwrap_err();
    assert!(matches!(err, BridgeError::Engine(_)));
}

pub fn test_inspect_renders_contents(h: &Harness) {
    let t = h.tensor(vec![1i32, 2, 3, 4], &[2, 2]);
    let text = h.bridge.inspect(&t, &InspectOptions::default()).unwrap();
    assert_eq!(text, "ndarray(cpu)\ns32[2][2]\n[\n  [1, 2],\n  [3, 4]\n]");

    let host = LogicalTensor::from_vec(vec![1u8, 2, 3, 4, 5], vec![5]).unwrap();
    let text = h.bridge.inspect(&host, &InspectOptions { limit: Some(3) }).unwrap();
    assert_eq!(text, "host\nu8[5]\n[1, 2, 3, ...]");

    let config = BridgeConfig {
        add_backend_on_inspect: false,
        ..Default::default()
    };
    let plain = Harness::new(config);
    let t = plain.tensor(vec![0.5f32], &[]);
    assert_eq!(plain.bridge.inspect(&t, &InspectOptions::default()).unwrap(), "f32\n0.5");
}

pub fn test_checked_mismatch_is_internal(_h: &Harness) {
    let config = BridgeConfig {
        check_shape_and_type: true,
        ..Default::default()
    };
    let h = Harness::new(config);
    let t = h.tensor(vec![1i32, 2], &[2]);
    let handle = t.device_handle().unwrap();
    let err = h.bridge.to_logical(handle, &spec(&[2], DType::F32)).unwrap_err();
    assert!(err.is_internal());
    let err = h.bridge.to_logical(handle, &spec(&[1, 2], DType::I32)).unwrap_err();
    assert!(err.is_internal());
    h.bridge.to_logical(handle, &spec(&[2], DType::I32)).unwrap();
}

pub fn test_config_from_file(_h: &Harness) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"check_shape_and_type": true, "inspect_limit": 2, "random_seed": 3}}"#).unwrap();
    let config = BridgeConfig::from_file(file.path()).unwrap();
    assert!(config.check_shape_and_type);
    assert_eq!(config.random_seed, Some(3));

    let bridge = Bridge::with_ndarray_engine(config);
    let t = LogicalTensor::from_vec(vec![9i64, 8, 7], vec![3]).unwrap();
    let text = bridge.inspect(&t, &InspectOptions::default()).unwrap();
    assert_eq!(text, "host\ns64[3]\n[9, 8, ...]");

    let missing = BridgeConfig::from_file(file.path().with_extension("missing"));
    assert!(missing.is_err());
}

pub fn test_seeded_random_is_deterministic(h: &Harness) {
    let draw = |seed| {
        let h = Harness::with_engine(NDArrayEngine::with_seed(seed), BridgeConfig::default());
        let t = h.bridge.random_normal(&spec(&[4], DType::F32), 0.0, 1.0, DeviceSelector::CPU).unwrap();
        h.read::<f32>(&t)
    };
    assert_eq!(draw(11), draw(11));
    assert_ne!(draw(11), draw(12));

    let ints = h
        .bridge
        .random_uniform(&spec(&[64], DType::I32), 2, 5, h.bridge.default_device())
        .unwrap();
    assert_eq!(ints.dtype(), DType::I32);
    assert!(h.read::<i32>(&ints).iter().all(|v| (2..5).contains(v)));
}

pub fn test_creation_ops(h: &Harness) {
    let device = h.bridge.default_device();
    let filled = h.bridge.constant(&spec(&[2, 2], DType::F32), 2.5, device).unwrap();
    assert_close_f32(h, &filled, &[2.5; 4]);

    let eye = h.bridge.eye(&spec(&[2, 2, 3], DType::I32), device).unwrap();
    assert_eq!(h.read::<i32>(&eye), vec![1, 0, 0, 0, 1, 0, 1, 0, 0, 0, 1, 0]);
    assert!(h.bridge.eye(&spec(&[3], DType::I32), device).is_err());

    let rows = h.bridge.iota(&spec(&[2, 3], DType::I64), Some(0), device).unwrap();
    assert_eq!(h.read::<i64>(&rows), vec![0, 0, 0, 1, 1, 1]);
    let flat = h.bridge.iota(&spec(&[2, 3], DType::I8), None, device).unwrap();
    assert_eq!(h.read::<i8>(&flat), vec![0, 1, 2, 3, 4, 5]);
}

pub fn test_from_binary(h: &Harness) {
    let device = h.bridge.default_device();
    let bytes = bytemuck::cast_slice::<i16, u8>(&[3, -4]).to_vec();
    let t = h.bridge.from_binary(&spec(&[2], DType::I16), &bytes, device).unwrap();
    assert_eq!(h.read::<i16>(&t), vec![3, -4]);
    let err = h.bridge.from_binary(&spec(&[3], DType::I16), &bytes, device).unwrap_err();
    assert!(matches!(err, BridgeError::InvalidArgument { .. }));
}
