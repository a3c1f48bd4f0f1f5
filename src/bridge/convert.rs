use super::{Bridge, InspectOptions, Target, dims, type_map};
use crate::capability::OpName;
use crate::dtype::DTypeOfPrimitive;
use crate::error::{BridgeError, Result};
use crate::inspect;
use crate::tensor::{Deallocation, DeviceHandle, LogicalTensor, TensorData, TensorSpec};

impl Bridge {
    /// The device handle behind `t`. Host data is uploaded to the default device
    /// and the caller owns the new handle.
    pub fn from_logical(&self, t: &LogicalTensor) -> Result<DeviceHandle> {
        if let Some(handle) = t.device_handle() {
            return Ok(handle);
        }
        let x = self.operand(t)?;
        let device = self.device_of(&x)?;
        Ok(DeviceHandle {
            device,
            native: x.into_raw(),
        })
    }

    /// Wraps an engine handle as a host tensor described by `spec`.
    pub fn to_logical(&self, handle: DeviceHandle, spec: &TensorSpec) -> Result<LogicalTensor> {
        if self.config.check_shape_and_type {
            let shape = self.engine.shape(handle.native)?;
            let scalar_type = self.engine.scalar_type(handle.native)?;
            let expected = type_map::to_scalar_type(spec.dtype)?;
            if shape != spec.shape_i64() || scalar_type != expected {
                return Err(BridgeError::InternalMismatch(format!(
                    "engine returned {scalar_type}{shape:?} where {spec} was expected"
                )));
            }
        }
        Ok(LogicalTensor::from_device(spec.clone(), handle))
    }

    /// Row-major bytes of at most `limit` elements of `t`.
    pub fn to_binary(&self, t: &LogicalTensor, limit: Option<usize>) -> Result<Vec<u8>> {
        self.gate(OpName::ToBinary)?;
        match t.data() {
            TensorData::Host(bytes) => {
                let len = limit.map_or(bytes.len(), |n| n.saturating_mul(t.dtype().size()).min(bytes.len()));
                Ok(bytes[..len].to_vec())
            }
            TensorData::Device(handle) => Ok(self.engine.to_blob(handle.native, limit)?),
        }
    }

    pub fn to_vec<T: DTypeOfPrimitive>(&self, t: &LogicalTensor) -> Result<Vec<T>> {
        if T::DTYPE != t.dtype() {
            return Err(BridgeError::invalid(
                OpName::ToBinary,
                format!("cannot read {} elements as {}", t.dtype(), T::DTYPE),
            ));
        }
        let bytes = self.to_binary(t, None)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    /// Copies `t` to `target`, leaving the source untouched.
    pub fn backend_copy(&self, t: &LogicalTensor, target: Target) -> Result<LogicalTensor> {
        self.gate(OpName::BackendCopy)?;
        self.copy_to(t, target)
    }

    /// Copies `t` to `target` and releases the source's device storage.
    pub fn backend_transfer(&self, t: LogicalTensor, target: Target) -> Result<LogicalTensor> {
        self.gate(OpName::BackendTransfer)?;
        let moved = self.copy_to(&t, target)?;
        self.release(&t)?;
        Ok(moved)
    }

    /// Releases the device storage behind `t`. Repeated calls are harmless.
    pub fn backend_deallocate(&self, t: &LogicalTensor) -> Result<Deallocation> {
        self.gate(OpName::BackendDeallocate)?;
        self.release(t)
    }

    pub(crate) fn release(&self, t: &LogicalTensor) -> Result<Deallocation> {
        match t.device_handle() {
            Some(handle) if self.engine.delete(handle.native)? => Ok(Deallocation::Released),
            _ => Ok(Deallocation::AlreadyReleased),
        }
    }

    fn copy_to(&self, t: &LogicalTensor, target: Target) -> Result<LogicalTensor> {
        match target {
            Target::Host => {
                let bytes: Vec<u8> = match t.data() {
                    TensorData::Host(bytes) => bytes.to_vec(),
                    TensorData::Device(handle) => self.engine.to_blob(handle.native, None)?,
                };
                LogicalTensor::from_bytes(t.spec().clone(), bytes)
            }
            Target::Device(device) => {
                let native = match t.data() {
                    TensorData::Host(bytes) => {
                        let scalar_type = type_map::to_scalar_type(t.dtype())?;
                        self.engine.from_blob(bytes, &dims(t.shape()), scalar_type, device)?
                    }
                    TensorData::Device(handle) => self.engine.to_device(handle.native, device)?,
                };
                let copy = self.scoped(native);
                let handle = DeviceHandle {
                    device: self.device_of(&copy)?,
                    native: copy.get(),
                };
                let tensor = self.to_logical(handle, t.spec())?;
                copy.into_raw();
                Ok(tensor)
            }
        }
    }

    /// Renders `t` for display. Tensors off the CPU get an advisory instead of
    /// their contents.
    pub fn inspect(&self, t: &LogicalTensor, options: &InspectOptions) -> Result<String> {
        self.gate(OpName::Inspect)?;
        let limit = options.limit.unwrap_or(self.config.inspect_limit);
        let body = match t.data() {
            TensorData::Device(handle) if !handle.device.is_cpu() => {
                log::warn!("refusing to read {} back from {}", t.spec(), handle.device);
                format!("{}\n{}", t.spec(), inspect::device_advisory(handle.device.kind))
            }
            _ => {
                let bytes = self.to_binary(t, Some(limit))?;
                let values = inspect::format_elements(t.dtype(), &bytes);
                inspect::render(t.dtype(), t.shape(), &values)
            }
        };
        if !self.config.add_backend_on_inspect {
            return Ok(body);
        }
        let location = match t.data() {
            TensorData::Host(_) => "host".to_string(),
            TensorData::Device(handle) => format!("{}({})", self.engine.name(), handle.device),
        };
        Ok(format!("{location}\n{body}"))
    }
}
