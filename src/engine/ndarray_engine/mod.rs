//! Reference CPU engine built on `ndarray`.
//!
//! It reproduces the external runtime's type system and behavioural quirks:
//! no unsigned types wider than 8 bits, width-dominance in bitwise kernels,
//! single-dim `prod`/`all`/`any`, first-index arg reductions, half-to-even
//! rounding and aborting solvers on singular input.

mod kernels;
mod linalg;
mod native_tensor;
mod ops;

use crate::device::{DeviceKind, DeviceSelector};
use crate::engine::{
    BinaryKind, CumulativeKind, EngineError, EngineResult, NativeRef, ScalarType, TensorEngine, UnaryKind,
};
use crate::tensor::Scalar;
use native_tensor::{Element, NativeTensor, from_f64_array, from_i64_array, with_native, with_native_pair};
use ndarray::{Array2, ArrayD, IxDyn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, Uniform};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One recorded engine invocation: the operation and its input scalar types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineCall {
    pub op: String,
    pub inputs: Vec<ScalarType>,
}

struct Entry {
    device: DeviceSelector,
    tensor: NativeTensor,
}

pub struct NDArrayEngine {
    tensors: Mutex<HashMap<u64, Entry>>,
    next_id: AtomicU64,
    rng: Mutex<StdRng>,
    devices: Vec<DeviceKind>,
    trace: Mutex<Option<Vec<EngineCall>>>,
}

fn scalar_as<T: Element>(value: Scalar) -> T {
    match value {
        Scalar::Int(v) => T::from_i64(v),
        Scalar::Float(v) => T::from_f64(v),
    }
}

fn require_float(op: &str, scalar_type: ScalarType) -> EngineResult<()> {
    if scalar_type.is_floating_point() {
        Ok(())
    } else {
        Err(EngineError::UnsupportedScalarType {
            op: op.to_string(),
            scalar_type,
        })
    }
}

fn linalg_error(op: &str) -> impl Fn(String) -> EngineError + '_ {
    move |detail| EngineError::Linalg {
        op: op.to_string(),
        detail,
    }
}

fn native_abort(op: &str) -> impl Fn(String) -> EngineError + '_ {
    move |detail| EngineError::NativeAbort {
        op: op.to_string(),
        detail,
    }
}

impl Default for NDArrayEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NDArrayEngine {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            tensors: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            rng: Mutex::new(rng),
            devices: vec![DeviceKind::Cpu],
            trace: Mutex::new(None),
        }
    }

    /// Registers an additional device kind. Tensors placed on it live in host
    /// memory but are reported as resident on that device.
    pub fn with_virtual_device(mut self, kind: DeviceKind) -> Self {
        if !self.devices.contains(&kind) {
            self.devices.push(kind);
        }
        self
    }

    /// Starts recording every engine call.
    pub fn enable_trace(&self) {
        *self.trace_log() = Some(Vec::new());
    }

    /// Returns the calls recorded since the last take.
    pub fn take_trace(&self) -> Vec<EngineCall> {
        self.trace_log().as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Number of references currently held in the allocator table.
    pub fn live_tensors(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<u64, Entry>> {
        self.tensors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn trace_log(&self) -> MutexGuard<'_, Option<Vec<EngineCall>>> {
        self.trace.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: &str, inputs: Vec<ScalarType>) {
        log::trace!("{} engine: {op} {inputs:?}", self.name());
        if let Some(calls) = self.trace_log().as_mut() {
            calls.push(EngineCall {
                op: op.to_string(),
                inputs,
            });
        }
    }

    fn check_device(&self, device: DeviceSelector) -> EngineResult<()> {
        if self.devices.contains(&device.kind) {
            Ok(())
        } else {
            Err(EngineError::DeviceUnavailable(device))
        }
    }

    fn store(&self, device: DeviceSelector, tensor: NativeTensor) -> NativeRef {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.table().insert(id, Entry { device, tensor });
        NativeRef(id)
    }

    fn load_slice(&self, op: &str, inputs: &[NativeRef]) -> EngineResult<(DeviceSelector, Vec<NativeTensor>)> {
        let table = self.table();
        let mut device: Option<DeviceSelector> = None;
        let mut tensors = Vec::with_capacity(inputs.len());
        for r in inputs {
            let entry = table.get(&r.0).ok_or(EngineError::UnknownRef(*r))?;
            match device {
                Some(d) if d != entry.device => return Err(EngineError::DeviceMismatch(d, entry.device)),
                _ => device = Some(entry.device),
            }
            tensors.push(entry.tensor.clone());
        }
        drop(table);
        self.record(op, tensors.iter().map(NativeTensor::scalar_type).collect());
        Ok((device.unwrap_or_default(), tensors))
    }

    fn load<const N: usize>(&self, op: &str, inputs: [NativeRef; N]) -> EngineResult<(DeviceSelector, [NativeTensor; N])> {
        let (device, tensors) = self.load_slice(op, &inputs)?;
        let tensors = <[NativeTensor; N]>::try_from(tensors).map_err(|_| EngineError::invalid(op, "input count mismatch"))?;
        Ok((device, tensors))
    }

    fn run<const N: usize>(
        &self,
        op: &str,
        inputs: [NativeRef; N],
        f: impl FnOnce([NativeTensor; N]) -> EngineResult<NativeTensor>,
    ) -> EngineResult<NativeRef> {
        let (device, tensors) = self.load(op, inputs)?;
        let out = f(tensors)?;
        Ok(self.store(device, out))
    }

    fn run_multi<const N: usize>(
        &self,
        op: &str,
        inputs: [NativeRef; N],
        f: impl FnOnce([NativeTensor; N]) -> EngineResult<Vec<NativeTensor>>,
    ) -> EngineResult<Vec<NativeRef>> {
        let (device, tensors) = self.load(op, inputs)?;
        let outs = f(tensors)?;
        Ok(outs.into_iter().map(|t| self.store(device, t)).collect())
    }

    fn create(&self, op: &str, device: DeviceSelector, f: impl FnOnce() -> EngineResult<NativeTensor>) -> EngineResult<NativeRef> {
        self.check_device(device)?;
        self.record(op, vec![]);
        let tensor = f()?;
        Ok(self.store(device, tensor))
    }

    fn random(
        &self,
        op: &str,
        shape: &[i64],
        scalar_type: ScalarType,
        device: DeviceSelector,
        dist: impl Distribution<f64>,
    ) -> EngineResult<NativeRef> {
        require_float(op, scalar_type)?;
        let shape = ops::to_usize_shape(op, shape)?;
        self.create(op, device, || {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let values = ArrayD::from_shape_simple_fn(IxDyn(&shape), || dist.sample(&mut *rng));
            Ok(from_f64_array(values, scalar_type))
        })
    }

    fn reduce_multi(
        &self,
        op: &str,
        t: NativeRef,
        dims: &[i64],
        keepdim: bool,
        f: impl FnOnce(&NativeTensor, &[usize], bool) -> EngineResult<NativeTensor>,
    ) -> EngineResult<NativeRef> {
        self.run(op, [t], |[x]| {
            let dims = ops::normalize_dims(op, dims, x.rank())?;
            f(&x, &dims, keepdim)
        })
    }

    fn reduce_single(
        &self,
        op: &str,
        t: NativeRef,
        dim: Option<i64>,
        keepdim: bool,
        f: impl FnOnce(&NativeTensor, &[usize], bool) -> NativeTensor,
    ) -> EngineResult<NativeRef> {
        self.run(op, [t], |[x]| match dim {
            Some(d) => {
                let d = ops::normalize_dim(op, d, x.rank())?;
                Ok(f(&x, &[d], keepdim))
            }
            None => Ok(f(&x, &[], false)),
        })
    }

    fn arg_reduce(&self, op: &str, t: NativeRef, dim: Option<i64>, keepdim: bool, max: bool) -> EngineResult<NativeRef> {
        self.run(op, [t], |[x]| {
            let dim = dim.map(|d| ops::normalize_dim(op, d, x.rank())).transpose()?;
            let indices = if max {
                with_native!(&x, a => ops::arg_reduce(a, dim, keepdim, ops::argmax_better)?)
            } else {
                with_native!(&x, a => ops::arg_reduce(a, dim, keepdim, ops::argmin_better)?)
            };
            Ok(indices.into())
        })
    }

    fn sorted(&self, op: &str, t: NativeRef, dim: i64, descending: bool, indices: bool) -> EngineResult<NativeRef> {
        self.run(op, [t], |[x]| {
            let d = ops::normalize_dim(op, dim, x.rank())?;
            Ok(with_native!(&x, a => {
                let (values, order) = ops::sort_lanes(a, d, descending)?;
                if indices { NativeTensor::from(order) } else { NativeTensor::from(values) }
            }))
        })
    }
}

impl TensorEngine for NDArrayEngine {
    fn name(&self) -> &'static str {
        "ndarray"
    }

    fn from_blob(&self, blob: &[u8], shape: &[i64], scalar_type: ScalarType, device: DeviceSelector) -> EngineResult<NativeRef> {
        let shape = ops::to_usize_shape("from_blob", shape)?;
        self.create("from_blob", device, || NativeTensor::from_blob(blob, &shape, scalar_type))
    }

    fn full(&self, shape: &[i64], value: Scalar, scalar_type: ScalarType, device: DeviceSelector) -> EngineResult<NativeRef> {
        let shape = ops::to_usize_shape("full", shape)?;
        self.create("full", device, || {
            Ok(match value {
                Scalar::Int(v) => from_i64_array(ArrayD::from_elem(IxDyn(&shape), v), scalar_type),
                Scalar::Float(v) => from_f64_array(ArrayD::from_elem(IxDyn(&shape), v), scalar_type),
            })
        })
    }

    fn arange(&self, start: i64, end: i64, step: i64, scalar_type: ScalarType, device: DeviceSelector) -> EngineResult<NativeRef> {
        if step == 0 {
            return Err(EngineError::invalid("arange", "step must be non-zero"));
        }
        self.create("arange", device, || {
            let count = if (step > 0 && end > start) || (step < 0 && end < start) {
                ((end - start).abs() + step.abs() - 1) / step.abs()
            } else {
                0
            };
            let values: Vec<i64> = (0..count).map(|i| start + i * step).collect();
            Ok(from_i64_array(ArrayD::from_shape_vec(IxDyn(&[values.len()]), values)?, scalar_type))
        })
    }

    fn eye(&self, n: i64, m: i64, scalar_type: ScalarType, device: DeviceSelector) -> EngineResult<NativeRef> {
        let shape = ops::to_usize_shape("eye", &[n, m])?;
        self.create("eye", device, || {
            let values = Array2::from_shape_fn((shape[0], shape[1]), |(i, j)| if i == j { 1.0 } else { 0.0 });
            Ok(from_f64_array(values.into_dyn(), scalar_type))
        })
    }

    fn rand_uniform(&self, low: f64, high: f64, shape: &[i64], scalar_type: ScalarType, device: DeviceSelector) -> EngineResult<NativeRef> {
        if !(low < high) || !low.is_finite() || !high.is_finite() {
            return Err(EngineError::invalid(
                "rand_uniform",
                format!("expected finite bounds with low < high, got [{low}, {high})"),
            ));
        }
        self.random("rand_uniform", shape, scalar_type, device, Uniform::new(low, high))
    }

    fn rand_normal(&self, mean: f64, std: f64, shape: &[i64], scalar_type: ScalarType, device: DeviceSelector) -> EngineResult<NativeRef> {
        let dist = Normal::new(mean, std).map_err(|e| EngineError::invalid("rand_normal", e.to_string()))?;
        self.random("rand_normal", shape, scalar_type, device, dist)
    }

    fn shape(&self, t: NativeRef) -> EngineResult<Vec<i64>> {
        let table = self.table();
        let entry = table.get(&t.0).ok_or(EngineError::UnknownRef(t))?;
        Ok(entry.tensor.shape().iter().map(|d| *d as i64).collect())
    }

    fn scalar_type(&self, t: NativeRef) -> EngineResult<ScalarType> {
        let table = self.table();
        let entry = table.get(&t.0).ok_or(EngineError::UnknownRef(t))?;
        Ok(entry.tensor.scalar_type())
    }

    fn device(&self, t: NativeRef) -> EngineResult<DeviceSelector> {
        let table = self.table();
        let entry = table.get(&t.0).ok_or(EngineError::UnknownRef(t))?;
        Ok(entry.device)
    }

    fn to_blob(&self, t: NativeRef, limit: Option<usize>) -> EngineResult<Vec<u8>> {
        let (_, [x]) = self.load("to_blob", [t])?;
        Ok(x.to_blob(limit))
    }

    fn to_device(&self, t: NativeRef, device: DeviceSelector) -> EngineResult<NativeRef> {
        self.check_device(device)?;
        let (_, [x]) = self.load("to_device", [t])?;
        Ok(self.store(device, x))
    }

    fn delete(&self, t: NativeRef) -> EngineResult<bool> {
        self.record("delete", vec![]);
        Ok(self.table().remove(&t.0).is_some())
    }

    fn reshape(&self, t: NativeRef, shape: &[i64]) -> EngineResult<NativeRef> {
        let shape = ops::to_usize_shape("reshape", shape)?;
        self.run("reshape", [t], |[x]| Ok(with_native!(&x, a => NativeTensor::from(ops::reshape(a, &shape)?))))
    }

    fn broadcast_to(&self, t: NativeRef, shape: &[i64]) -> EngineResult<NativeRef> {
        let shape = ops::to_usize_shape("broadcast_to", shape)?;
        self.run("broadcast_to", [t], |[x]| {
            Ok(with_native!(&x, a => NativeTensor::from(ops::broadcast_to(a, &shape)?)))
        })
    }

    fn permute(&self, t: NativeRef, dims: &[i64]) -> EngineResult<NativeRef> {
        self.run("permute", [t], |[x]| {
            let dims = ops::normalize_dims("permute", dims, x.rank())?;
            Ok(with_native!(&x, a => NativeTensor::from(ops::permute(a, &dims)?)))
        })
    }

    fn squeeze(&self, t: NativeRef, dims: &[i64]) -> EngineResult<NativeRef> {
        self.run("squeeze", [t], |[x]| {
            let shape = x.shape();
            let dims = if dims.is_empty() {
                (0..shape.len()).filter(|d| shape[*d] == 1).collect()
            } else {
                ops::normalize_dims("squeeze", dims, x.rank())?
            };
            if let Some(d) = dims.iter().find(|d| shape[**d] != 1) {
                return Err(EngineError::invalid("squeeze", format!("dim {d} has size {}, expected 1", shape[*d])));
            }
            let squeezed: Vec<usize> = shape
                .iter()
                .enumerate()
                .filter(|(i, _)| !dims.contains(i))
                .map(|(_, n)| *n)
                .collect();
            Ok(with_native!(&x, a => NativeTensor::from(ops::reshape(a, &squeezed)?)))
        })
    }

    fn narrow(&self, t: NativeRef, dim: i64, start: i64, length: i64) -> EngineResult<NativeRef> {
        self.run("narrow", [t], |[x]| {
            let d = ops::normalize_dim("narrow", dim, x.rank())?;
            Ok(with_native!(&x, a => NativeTensor::from(ops::narrow(a, d, start, length)?)))
        })
    }

    fn as_strided(&self, t: NativeRef, size: &[i64], strides: &[i64], offset: i64) -> EngineResult<NativeRef> {
        let size = ops::to_usize_shape("as_strided", size)?;
        self.run("as_strided", [t], |[x]| {
            Ok(with_native!(&x, a => NativeTensor::from(ops::as_strided(a, &size, strides, offset)?)))
        })
    }

    fn cat(&self, tensors: &[NativeRef], dim: i64) -> EngineResult<NativeRef> {
        let (device, xs) = self.load_slice("cat", tensors)?;
        let rank = xs.first().map_or(0, NativeTensor::rank);
        let d = ops::normalize_dim("cat", dim, rank)?;
        let out = kernels::cat(&xs, d)?;
        Ok(self.store(device, out))
    }

    fn split(&self, t: NativeRef, split_size: i64, dim: i64) -> EngineResult<Vec<NativeRef>> {
        if split_size <= 0 {
            return Err(EngineError::invalid("split", format!("split size must be positive, got {split_size}")));
        }
        self.run_multi("split", [t], |[x]| {
            let d = ops::normalize_dim("split", dim, x.rank())?;
            let n = x.shape()[d] as i64;
            let mut chunks = Vec::new();
            let mut start = 0;
            while start < n {
                let length = split_size.min(n - start);
                chunks.push(with_native!(&x, a => NativeTensor::from(ops::narrow(a, d, start, length)?)));
                start += split_size;
            }
            if chunks.is_empty() {
                chunks.push(x);
            }
            Ok(chunks)
        })
    }

    fn flip(&self, t: NativeRef, dims: &[i64]) -> EngineResult<NativeRef> {
        self.run("flip", [t], |[x]| {
            let dims = ops::normalize_dims("flip", dims, x.rank())?;
            Ok(with_native!(&x, a => NativeTensor::from(ops::flip(a, &dims))))
        })
    }

    fn constant_pad(&self, t: NativeRef, pads: &[(i64, i64)], value: Scalar) -> EngineResult<NativeRef> {
        self.run("constant_pad", [t], |[x]| {
            Ok(with_native!(&x, a => NativeTensor::from(ops::constant_pad(a, pads, scalar_as(value))?)))
        })
    }

    fn to_type(&self, t: NativeRef, scalar_type: ScalarType) -> EngineResult<NativeRef> {
        self.run("to_type", [t], |[x]| Ok(x.cast(scalar_type)))
    }

    fn unary(&self, op: UnaryKind, t: NativeRef) -> EngineResult<NativeRef> {
        self.run(&op.to_string(), [t], |[x]| kernels::unary(op, &x))
    }

    fn binary(&self, op: BinaryKind, a: NativeRef, b: NativeRef) -> EngineResult<NativeRef> {
        self.run(&op.to_string(), [a, b], |[x, y]| kernels::binary(op, &x, &y))
    }

    fn where_self(&self, condition: NativeRef, a: NativeRef, b: NativeRef) -> EngineResult<NativeRef> {
        self.run("where", [condition, a, b], |[c, x, y]| kernels::where_self(&c, &x, &y))
    }

    fn clamp(&self, t: NativeRef, min: NativeRef, max: NativeRef) -> EngineResult<NativeRef> {
        self.run("clamp", [t, min, max], |[x, lo, hi]| kernels::clamp(&x, &lo, &hi))
    }

    fn sum(&self, t: NativeRef, dims: &[i64], keepdim: bool) -> EngineResult<NativeRef> {
        self.reduce_multi("sum", t, dims, keepdim, |x, dims, keepdim| Ok(kernels::sum(x, dims, keepdim)))
    }

    fn amax(&self, t: NativeRef, dims: &[i64], keepdim: bool) -> EngineResult<NativeRef> {
        self.reduce_multi("amax", t, dims, keepdim, |x, dims, keepdim| kernels::extremum(x, dims, keepdim, true))
    }

    fn amin(&self, t: NativeRef, dims: &[i64], keepdim: bool) -> EngineResult<NativeRef> {
        self.reduce_multi("amin", t, dims, keepdim, |x, dims, keepdim| kernels::extremum(x, dims, keepdim, false))
    }

    fn prod(&self, t: NativeRef, dim: Option<i64>, keepdim: bool) -> EngineResult<NativeRef> {
        self.reduce_single("prod", t, dim, keepdim, kernels::prod)
    }

    fn all(&self, t: NativeRef, dim: Option<i64>, keepdim: bool) -> EngineResult<NativeRef> {
        self.reduce_single("all", t, dim, keepdim, kernels::all)
    }

    fn any(&self, t: NativeRef, dim: Option<i64>, keepdim: bool) -> EngineResult<NativeRef> {
        self.reduce_single("any", t, dim, keepdim, kernels::any)
    }

    fn argmax(&self, t: NativeRef, dim: Option<i64>, keepdim: bool) -> EngineResult<NativeRef> {
        self.arg_reduce("argmax", t, dim, keepdim, true)
    }

    fn argmin(&self, t: NativeRef, dim: Option<i64>, keepdim: bool) -> EngineResult<NativeRef> {
        self.arg_reduce("argmin", t, dim, keepdim, false)
    }

    fn cumulative(&self, op: CumulativeKind, t: NativeRef, dim: i64) -> EngineResult<NativeRef> {
        let name = op.to_string();
        self.run(&name, [t], |[x]| {
            let d = ops::normalize_dim(&name, dim, x.rank())?;
            Ok(kernels::cumulative(op, &x, d))
        })
    }

    fn sort(&self, t: NativeRef, dim: i64, descending: bool) -> EngineResult<NativeRef> {
        self.sorted("sort", t, dim, descending, false)
    }

    fn argsort(&self, t: NativeRef, dim: i64, descending: bool) -> EngineResult<NativeRef> {
        self.sorted("argsort", t, dim, descending, true)
    }

    fn gather(&self, t: NativeRef, dim: i64, index: NativeRef) -> EngineResult<NativeRef> {
        self.run("gather", [t, index], |[x, index]| {
            if !index.scalar_type().is_integral() {
                return Err(EngineError::invalid("gather", format!("index must be integral, got {}", index.scalar_type())));
            }
            let d = ops::normalize_dim("gather", dim, x.rank())?;
            let index = index.to_i64_array();
            Ok(with_native!(&x, a => NativeTensor::from(ops::gather(a, d, &index)?)))
        })
    }

    fn scatter(&self, t: NativeRef, dim: i64, index: NativeRef, src: NativeRef, accumulate: bool) -> EngineResult<NativeRef> {
        self.run("scatter", [t, index, src], |[x, index, src]| {
            if !index.scalar_type().is_integral() {
                return Err(EngineError::invalid("scatter", format!("index must be integral, got {}", index.scalar_type())));
            }
            let d = ops::normalize_dim("scatter", dim, x.rank())?;
            let index = index.to_i64_array();
            let src = src.cast(x.scalar_type());
            with_native_pair!(&x, &src, a, s => NativeTensor::from(ops::scatter(a, d, &index, s, accumulate)?))
        })
    }

    fn tensordot(&self, a: NativeRef, b: NativeRef, dims_a: &[i64], dims_b: &[i64]) -> EngineResult<NativeRef> {
        self.run("tensordot", [a, b], |[x, y]| {
            let dims_a = ops::normalize_dims("tensordot", dims_a, x.rank())?;
            let dims_b = ops::normalize_dims("tensordot", dims_b, y.rank())?;
            kernels::tensordot(&x, &y, &dims_a, &dims_b)
        })
    }

    fn matmul(&self, a: NativeRef, b: NativeRef) -> EngineResult<NativeRef> {
        self.run("matmul", [a, b], |[x, y]| kernels::matmul(&x, &y))
    }

    fn cholesky(&self, t: NativeRef, upper: bool) -> EngineResult<NativeRef> {
        self.run("cholesky", [t], |[x]| {
            let st = x.scalar_type();
            require_float("cholesky", st)?;
            let [l] = linalg::map_matrices("cholesky", &x.to_f64_array(), |m| {
                Ok([linalg::cholesky(m, upper).map_err(linalg_error("cholesky"))?])
            })?;
            Ok(from_f64_array(l, st))
        })
    }

    fn qr(&self, t: NativeRef, reduced: bool) -> EngineResult<(NativeRef, NativeRef)> {
        let outs = self.run_multi("qr", [t], |[x]| {
            let st = x.scalar_type();
            require_float("qr", st)?;
            let [q, r] = linalg::map_matrices("qr", &x.to_f64_array(), |m| {
                let (q, r) = linalg::qr(m, reduced);
                Ok([q, r])
            })?;
            Ok(vec![from_f64_array(q, st), from_f64_array(r, st)])
        })?;
        match outs.as_slice() {
            [q, r] => Ok((*q, *r)),
            _ => Err(EngineError::invalid("qr", "unexpected output count")),
        }
    }

    fn lu(&self, t: NativeRef) -> EngineResult<(NativeRef, NativeRef, NativeRef)> {
        let outs = self.run_multi("lu", [t], |[x]| {
            let st = x.scalar_type();
            require_float("lu", st)?;
            let [p, l, u] = linalg::map_matrices("lu", &x.to_f64_array(), |m| {
                let (p, l, u) = linalg::lu(m).map_err(linalg_error("lu"))?;
                Ok([p, l, u])
            })?;
            Ok(vec![from_f64_array(p, st), from_f64_array(l, st), from_f64_array(u, st)])
        })?;
        match outs.as_slice() {
            [p, l, u] => Ok((*p, *l, *u)),
            _ => Err(EngineError::invalid("lu", "unexpected output count")),
        }
    }

    fn triangular_solve(&self, a: NativeRef, b: NativeRef, transpose: bool, upper: bool) -> EngineResult<NativeRef> {
        self.run("triangular_solve", [a, b], |[x, y]| {
            let st = ScalarType::promote(x.scalar_type(), y.scalar_type());
            require_float("triangular_solve", st)?;
            let out = linalg::map_matrix_pairs("triangular_solve", &x.to_f64_array(), &y.to_f64_array(), |m, rhs| {
                linalg::triangular_solve(m, rhs, transpose, upper).map_err(native_abort("triangular_solve"))
            })?;
            Ok(from_f64_array(out, st))
        })
    }

    fn determinant(&self, t: NativeRef) -> EngineResult<NativeRef> {
        self.run("determinant", [t], |[x]| {
            let st = x.scalar_type();
            require_float("determinant", st)?;
            let [det] = linalg::map_matrices("determinant", &x.to_f64_array(), |m| {
                let det = linalg::determinant(m).map_err(linalg_error("determinant"))?;
                Ok([Array2::from_elem((1, 1), det)])
            })?;
            let batch_shape = &det.shape()[..det.ndim() - 2];
            let det = det.to_shape(batch_shape.to_vec())?.into_owned();
            Ok(from_f64_array(det, st))
        })
    }

    fn solve(&self, a: NativeRef, b: NativeRef) -> EngineResult<NativeRef> {
        self.run("solve", [a, b], |[x, y]| {
            let st = ScalarType::promote(x.scalar_type(), y.scalar_type());
            require_float("solve", st)?;
            let out = linalg::map_matrix_pairs("solve", &x.to_f64_array(), &y.to_f64_array(), |m, rhs| {
                linalg::solve(m, rhs).map_err(native_abort("solve"))
            })?;
            Ok(from_f64_array(out, st))
        })
    }
}
