use super::{Bridge, ScopedRef, axes_i64, dims};
use crate::capability::OpName;
use crate::error::{BridgeError, Result};
use crate::tensor::{LogicalTensor, Scalar, TensorSpec};

impl Bridge {
    pub fn reshape(&self, out: &TensorSpec, t: &LogicalTensor) -> Result<LogicalTensor> {
        self.gate(OpName::Reshape)?;
        self.out_type(out)?;
        if out.num_elements() != t.spec().num_elements() {
            return Err(BridgeError::invalid(OpName::Reshape, format!("cannot reshape {} into {out}", t.spec())));
        }
        let x = self.operand(t)?;
        let r = self.reshape_ref(&x, &out.shape)?;
        self.finish(out, r)
    }

    pub fn squeeze(&self, out: &TensorSpec, t: &LogicalTensor, axes: &[usize]) -> Result<LogicalTensor> {
        self.gate(OpName::Squeeze)?;
        self.out_type(out)?;
        if let Some(axis) = axes.iter().find(|a| t.shape().get(**a) != Some(&1)) {
            return Err(BridgeError::invalid(
                OpName::Squeeze,
                format!("axis {axis} of {} does not have size 1", t.spec()),
            ));
        }
        let x = self.operand(t)?;
        if axes.is_empty() {
            return self.finish(out, x);
        }
        let r = self.scoped(self.engine.squeeze(x.get(), &axes_i64(axes))?);
        self.finish(out, r)
    }

    /// Broadcasts `t` into `out`, mapping axis `i` of `t` onto axis `axes[i]` of the result.
    pub fn broadcast(&self, out: &TensorSpec, t: &LogicalTensor, axes: &[usize]) -> Result<LogicalTensor> {
        self.gate(OpName::Broadcast)?;
        self.out_type(out)?;
        if axes.len() != t.rank() || axes.iter().any(|a| *a >= out.rank()) {
            return Err(BridgeError::invalid(
                OpName::Broadcast,
                format!("axes {axes:?} do not place {} inside {out}", t.spec()),
            ));
        }
        let mut order: Vec<usize> = (0..axes.len()).collect();
        order.sort_by_key(|i| axes[*i]);
        let x = self.operand(t)?;
        let x = if order.iter().enumerate().any(|(i, o)| i != *o) {
            self.scoped(self.engine.permute(x.get(), &axes_i64(&order))?)
        } else {
            x
        };
        let mut view = vec![1u64; out.rank()];
        for &source in &order {
            view[axes[source]] = t.shape()[source];
        }
        let x = self.reshape_ref(&x, &view)?;
        let r = self.scoped(self.engine.broadcast_to(x.get(), &out.shape_i64())?);
        self.finish(out, r)
    }

    pub fn transpose(&self, out: &TensorSpec, t: &LogicalTensor, axes: &[usize]) -> Result<LogicalTensor> {
        self.gate(OpName::Transpose)?;
        self.out_type(out)?;
        let x = self.operand(t)?;
        let r = self.scoped(self.engine.permute(x.get(), &axes_i64(axes))?);
        self.finish(out, r)
    }

    pub fn reverse(&self, out: &TensorSpec, t: &LogicalTensor, axes: &[usize]) -> Result<LogicalTensor> {
        self.gate(OpName::Reverse)?;
        self.out_type(out)?;
        let x = self.operand(t)?;
        let r = self.scoped(self.engine.flip(x.get(), &axes_i64(axes))?);
        self.finish(out, r)
    }

    pub fn concatenate(&self, out: &TensorSpec, tensors: &[LogicalTensor], axis: usize) -> Result<LogicalTensor> {
        self.gate(OpName::Concatenate)?;
        let scalar_type = self.out_type(out)?;
        if tensors.is_empty() {
            return Err(BridgeError::invalid(OpName::Concatenate, "nothing to concatenate"));
        }
        let parts = tensors
            .iter()
            .map(|t| self.operand_as(t, scalar_type))
            .collect::<Result<Vec<_>>>()?;
        let r = self.cat_refs(&parts, axis)?;
        self.finish(out, r)
    }

    /// Joins equally shaped tensors along a new axis.
    pub fn stack(&self, out: &TensorSpec, tensors: &[LogicalTensor], axis: usize) -> Result<LogicalTensor> {
        self.gate(OpName::Stack)?;
        let scalar_type = self.out_type(out)?;
        let Some(first) = tensors.first() else {
            return Err(BridgeError::invalid(OpName::Stack, "nothing to stack"));
        };
        if axis > first.rank() {
            return Err(BridgeError::invalid(OpName::Stack, format!("axis {axis} is out of range")));
        }
        let mut expanded = first.shape().to_vec();
        expanded.insert(axis, 1);
        let mut parts = Vec::with_capacity(tensors.len());
        for t in tensors {
            let x = self.operand_as(t, scalar_type)?;
            parts.push(self.reshape_ref(&x, &expanded)?);
        }
        let r = self.cat_refs(&parts, axis)?;
        self.finish(out, r)
    }

    pub(crate) fn cat_refs(&self, parts: &[ScopedRef<'_>], axis: usize) -> Result<ScopedRef<'_>> {
        let refs: Vec<_> = parts.iter().map(ScopedRef::get).collect();
        Ok(self.scoped(self.engine.cat(&refs, axis as i64)?))
    }

    /// `config` holds `(low, high, interior)` per axis. Negative edges crop.
    pub fn pad(&self, out: &TensorSpec, t: &LogicalTensor, value: impl Into<Scalar>, config: &[(i64, i64, i64)]) -> Result<LogicalTensor> {
        self.gate(OpName::Pad)?;
        self.out_type(out)?;
        if config.len() != t.rank() {
            return Err(BridgeError::invalid(
                OpName::Pad,
                format!("{} padding entries for {}", config.len(), t.spec()),
            ));
        }
        if config.iter().any(|(_, _, interior)| *interior != 0) {
            return Err(BridgeError::UnsupportedOption {
                op: OpName::Pad,
                option: "interior padding".to_string(),
            });
        }
        let pads: Vec<(i64, i64)> = config.iter().map(|(low, high, _)| (*low, *high)).collect();
        let x = self.operand(t)?;
        let r = self.scoped(self.engine.constant_pad(x.get(), &pads, value.into())?);
        self.finish(out, r)
    }

    /// Converts `t` to the template's dtype. Floats truncate toward zero.
    pub fn as_type(&self, out: &TensorSpec, t: &LogicalTensor) -> Result<LogicalTensor> {
        self.gate(OpName::AsType)?;
        self.out_type(out)?;
        if out.shape != t.shape() {
            return Err(BridgeError::invalid(
                OpName::AsType,
                format!("{out} does not match the shape of {}", t.spec()),
            ));
        }
        let x = self.operand(t)?;
        self.finish(out, x)
    }

    pub(crate) fn flatten(&self, x: &ScopedRef<'_>, shape: &[u64]) -> Result<ScopedRef<'_>> {
        self.reshape_ref(x, &[shape.iter().product()])
    }

    pub(crate) fn broadcast_ref(&self, x: &ScopedRef<'_>, shape: &[u64]) -> Result<ScopedRef<'_>> {
        Ok(self.scoped(self.engine.broadcast_to(x.get(), &dims(shape))?))
    }
}
