use crate::device::DeviceSelector;
use crate::dtype::{DType, DTypeOfPrimitive};
use crate::engine::NativeRef;
use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A scalar argument, kept in the widest representation of its kind.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    pub fn as_f64(&self) -> f64 {
        match self {
            Scalar::Int(v) => *v as f64,
            Scalar::Float(v) => *v,
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(value as i64)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<f32> for Scalar {
    fn from(value: f32) -> Self {
        Scalar::Float(value as f64)
    }
}

/// Shape and dtype of a tensor, used as the output template of every operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorSpec {
    pub shape: Vec<u64>,
    pub dtype: DType,
}

impl TensorSpec {
    pub fn new(shape: impl Into<Vec<u64>>, dtype: DType) -> Self {
        Self {
            shape: shape.into(),
            dtype,
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    pub fn num_bytes(&self) -> usize {
        self.num_elements() as usize * self.dtype.size()
    }

    pub fn with_dtype(&self, dtype: DType) -> Self {
        Self::new(self.shape.clone(), dtype)
    }

    pub fn with_shape(&self, shape: impl Into<Vec<u64>>) -> Self {
        Self::new(shape, self.dtype)
    }

    pub(crate) fn shape_i64(&self) -> Vec<i64> {
        self.shape.iter().map(|d| *d as i64).collect()
    }
}

impl std::fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dtype)?;
        for d in &self.shape {
            write!(f, "[{d}]")?;
        }
        Ok(())
    }
}

/// Engine-owned storage, tagged with the device it lives on.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct DeviceHandle {
    pub device: DeviceSelector,
    pub native: NativeRef,
}

/// Outcome of releasing a device handle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Deallocation {
    Released,
    AlreadyReleased,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TensorData {
    /// Little-endian, row-major bytes held by the host.
    Host(Arc<[u8]>),
    Device(DeviceHandle),
}

/// The host library's device-agnostic tensor: a spec plus a data reference.
#[derive(Clone, Debug, PartialEq)]
pub struct LogicalTensor {
    spec: TensorSpec,
    data: TensorData,
}

impl LogicalTensor {
    pub fn from_bytes(spec: TensorSpec, bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() != spec.num_bytes() {
            return Err(BridgeError::InvalidArgument {
                op: "from_bytes".to_string(),
                detail: format!("{spec} needs {} bytes, got {}", spec.num_bytes(), bytes.len()),
            });
        }
        Ok(Self {
            spec,
            data: TensorData::Host(bytes),
        })
    }

    pub fn from_vec<T: DTypeOfPrimitive>(data: Vec<T>, shape: impl Into<Vec<u64>>) -> Result<Self> {
        let spec = TensorSpec::new(shape, T::DTYPE);
        let bytes: Vec<u8> = bytemuck::cast_slice(&data).to_vec();
        Self::from_bytes(spec, bytes)
    }

    pub fn from_device(spec: TensorSpec, handle: DeviceHandle) -> Self {
        Self {
            spec,
            data: TensorData::Device(handle),
        }
    }

    pub fn spec(&self) -> &TensorSpec {
        &self.spec
    }

    pub fn shape(&self) -> &[u64] {
        &self.spec.shape
    }

    pub fn rank(&self) -> usize {
        self.spec.rank()
    }

    pub fn dtype(&self) -> DType {
        self.spec.dtype
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn device_handle(&self) -> Option<DeviceHandle> {
        match &self.data {
            TensorData::Device(handle) => Some(*handle),
            TensorData::Host(_) => None,
        }
    }

    pub fn host_bytes(&self) -> Option<&[u8]> {
        match &self.data {
            TensorData::Host(bytes) => Some(bytes),
            TensorData::Device(_) => None,
        }
    }

    /// Reads a host-resident tensor back into primitives.
    pub fn to_vec<T: DTypeOfPrimitive>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype() {
            return Err(BridgeError::InvalidArgument {
                op: "to_vec".to_string(),
                detail: format!("cannot read {} elements as {}", self.dtype(), T::DTYPE),
            });
        }
        match self.host_bytes() {
            Some(bytes) => Ok(bytemuck::pod_collect_to_vec(bytes)),
            None => Err(BridgeError::InvalidArgument {
                op: "to_vec".to_string(),
                detail: "tensor is device-resident, read it through the bridge".to_string(),
            }),
        }
    }
}
