use super::{Bridge, ScopedRef, dims};
use crate::capability::OpName;
use crate::device::DeviceSelector;
use crate::engine::{ScalarType, UnaryKind};
use crate::error::{BridgeError, Result};
use crate::tensor::{LogicalTensor, Scalar, TensorSpec};

impl Bridge {
    pub fn constant(&self, out: &TensorSpec, value: impl Into<Scalar>, device: DeviceSelector) -> Result<LogicalTensor> {
        self.gate(OpName::Constant)?;
        let scalar_type = self.out_type(out)?;
        let r = self.scoped(self.engine.full(&out.shape_i64(), value.into(), scalar_type, device)?);
        self.finish(out, r)
    }

    /// Identity over the last two axes, repeated across any leading ones.
    pub fn eye(&self, out: &TensorSpec, device: DeviceSelector) -> Result<LogicalTensor> {
        self.gate(OpName::Eye)?;
        let scalar_type = self.out_type(out)?;
        let rank = out.rank();
        if rank < 2 {
            return Err(BridgeError::invalid(OpName::Eye, format!("{out} has fewer than two axes")));
        }
        let (n, m) = (out.shape[rank - 2] as i64, out.shape[rank - 1] as i64);
        let eye = self.scoped(self.engine.eye(n, m, scalar_type, device)?);
        if rank == 2 {
            return self.finish(out, eye);
        }
        let r = self.scoped(self.engine.broadcast_to(eye.get(), &out.shape_i64())?);
        self.finish(out, r)
    }

    /// Counts up along `axis`, or through the flattened tensor when `axis` is `None`.
    pub fn iota(&self, out: &TensorSpec, axis: Option<usize>, device: DeviceSelector) -> Result<LogicalTensor> {
        self.gate(OpName::Iota)?;
        let scalar_type = self.out_type(out)?;
        let r = match axis {
            None => {
                let count = out.num_elements() as i64;
                let ramp = self.scoped(self.engine.arange(0, count, 1, scalar_type, device)?);
                self.reshape_ref(&ramp, &out.shape)?
            }
            Some(axis) if axis < out.rank() => self.iota_along(&out.shape, axis, scalar_type, device)?,
            Some(axis) => {
                return Err(BridgeError::invalid(OpName::Iota, format!("axis {axis} is out of range for {out}")));
            }
        };
        self.finish(out, r)
    }

    pub(crate) fn iota_along(
        &self,
        shape: &[u64],
        axis: usize,
        scalar_type: ScalarType,
        device: DeviceSelector,
    ) -> Result<ScopedRef<'_>> {
        let ramp = self.scoped(self.engine.arange(0, shape[axis] as i64, 1, scalar_type, device)?);
        let mut view = vec![1u64; shape.len()];
        view[axis] = shape[axis];
        let ramp = self.reshape_ref(&ramp, &view)?;
        Ok(self.scoped(self.engine.broadcast_to(ramp.get(), &dims(shape))?))
    }

    /// Uniform samples in `[min, max)`. Integer templates take the floor of a
    /// double precision draw.
    pub fn random_uniform(
        &self,
        out: &TensorSpec,
        min: impl Into<Scalar>,
        max: impl Into<Scalar>,
        device: DeviceSelector,
    ) -> Result<LogicalTensor> {
        self.gate(OpName::RandomUniform)?;
        let scalar_type = self.out_type(out)?;
        let (min, max) = (min.into().as_f64(), max.into().as_f64());
        if scalar_type.is_floating_point() {
            let r = self.scoped(self.engine.rand_uniform(min, max, &out.shape_i64(), scalar_type, device)?);
            return self.finish(out, r);
        }
        let draw = self.scoped(self.engine.rand_uniform(min, max, &out.shape_i64(), ScalarType::Double, device)?);
        let r = self.scoped(self.engine.unary(UnaryKind::Floor, draw.get())?);
        self.finish(out, r)
    }

    pub fn random_normal(
        &self,
        out: &TensorSpec,
        mean: impl Into<Scalar>,
        std: impl Into<Scalar>,
        device: DeviceSelector,
    ) -> Result<LogicalTensor> {
        self.gate(OpName::RandomNormal)?;
        let scalar_type = self.out_type(out)?;
        let sample_type = if scalar_type.is_floating_point() {
            scalar_type
        } else {
            ScalarType::Double
        };
        let (mean, std) = (mean.into().as_f64(), std.into().as_f64());
        let r = self.scoped(self.engine.rand_normal(mean, std, &out.shape_i64(), sample_type, device)?);
        self.finish(out, r)
    }

    pub fn from_binary(&self, out: &TensorSpec, bytes: &[u8], device: DeviceSelector) -> Result<LogicalTensor> {
        self.gate(OpName::FromBinary)?;
        let scalar_type = self.out_type(out)?;
        if bytes.len() != out.num_bytes() {
            return Err(BridgeError::invalid(
                OpName::FromBinary,
                format!("{out} needs {} bytes, got {}", out.num_bytes(), bytes.len()),
            ));
        }
        let r = self.scoped(self.engine.from_blob(bytes, &out.shape_i64(), scalar_type, device)?);
        self.finish(out, r)
    }
}
