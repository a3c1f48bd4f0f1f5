use std::sync::Arc;
use tensor_bridge::dtype::DTypeOfPrimitive;
use tensor_bridge::{Bridge, BridgeConfig, DType, LogicalTensor, NDArrayEngine, TensorSpec};

pub mod batching;
pub mod capability;
pub mod conversion;
pub mod elementwise;
pub mod indexing;
pub mod linalg;
pub mod reductions;
pub mod shape;

/// A bridge plus direct access to the engine behind it.
pub struct Harness {
    pub bridge: Bridge,
    pub engine: Arc<NDArrayEngine>,
}

impl Harness {
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_engine(NDArrayEngine::with_seed(7), config)
    }

    pub fn with_engine(engine: NDArrayEngine, config: BridgeConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let engine = Arc::new(engine);
        let bridge = Bridge::new(engine.clone(), config);
        Self { bridge, engine }
    }

    /// A device-resident tensor holding `data`.
    pub fn tensor<T: DTypeOfPrimitive>(&self, data: Vec<T>, shape: &[u64]) -> LogicalTensor {
        let host = LogicalTensor::from_vec(data, shape.to_vec()).unwrap();
        let handle = self.bridge.from_logical(&host).unwrap();
        self.bridge.to_logical(handle, host.spec()).unwrap()
    }

    pub fn read<T: DTypeOfPrimitive>(&self, t: &LogicalTensor) -> Vec<T> {
        self.bridge.to_vec(t).unwrap()
    }

    pub fn read_f64(&self, t: &LogicalTensor) -> Vec<f64> {
        let as_f64 = self.bridge.as_type(&t.spec().with_dtype(DType::F64), t).unwrap();
        let values = self.read(&as_f64);
        self.bridge.backend_deallocate(&as_f64).unwrap();
        values
    }

    pub fn release(&self, tensors: &[&LogicalTensor]) {
        for t in tensors {
            self.bridge.backend_deallocate(t).unwrap();
        }
    }
}

pub fn spec(shape: &[u64], dtype: DType) -> TensorSpec {
    TensorSpec::new(shape.to_vec(), dtype)
}

pub fn assert_close(value: &[f64], correct: &[f64], atol: f64, rtol: f64) {
    assert_eq!(value.len(), correct.len(), "{value:?} != {correct:?}");
    for (a, b) in value.iter().zip(correct) {
        let err = (a - b).abs();
        let limit = atol + rtol * a.abs().max(b.abs());
        assert!(err < limit, "{a} != {b}: {err} < {limit}");
    }
}

pub fn assert_close_f32(harness: &Harness, t: &LogicalTensor, correct: &[f64]) {
    assert_eq!(t.dtype(), DType::F32);
    assert_close(&harness.read_f64(t), correct, 1e-5, 1.3e-6);
}

pub fn assert_close_f64(harness: &Harness, t: &LogicalTensor, correct: &[f64]) {
    assert_eq!(t.dtype(), DType::F64);
    assert_close(&harness.read_f64(t), correct, 1e-9, 1e-9);
}
