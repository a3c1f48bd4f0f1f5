use super::{Bridge, ScopedRef};
use crate::capability::OpName;
use crate::device::DeviceSelector;
use crate::engine::{BinaryKind, ScalarType};
use crate::error::{BridgeError, Result};
use crate::tensor::{LogicalTensor, Scalar, TensorSpec};

/// Row-major element strides of `shape`.
fn row_major_strides(shape: &[u64]) -> Vec<i64> {
    let mut strides = vec![1i64; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1] as i64;
    }
    strides
}

fn with_trailing(shape: &[u64], last: u64) -> Vec<u64> {
    let mut shape = shape.to_vec();
    shape.push(last);
    shape
}

impl Bridge {
    pub(crate) fn long_tensor(&self, values: &[i64], device: DeviceSelector) -> Result<ScopedRef<'_>> {
        let bytes: &[u8] = bytemuck::cast_slice(values);
        Ok(self.scoped(self.engine.from_blob(bytes, &[values.len() as i64], ScalarType::Long, device)?))
    }

    /// A `[..shape, rank]` tensor holding each position's coordinates plus `origin`.
    pub(crate) fn coordinate_grid(&self, shape: &[u64], origin: &[u64], device: DeviceSelector) -> Result<ScopedRef<'_>> {
        let expanded = with_trailing(shape, 1);
        let mut columns = Vec::with_capacity(shape.len());
        for (axis, &start) in origin.iter().enumerate() {
            let ramp = self.iota_along(shape, axis, ScalarType::Long, device)?;
            let ramp = if start == 0 {
                ramp
            } else {
                let offset = self.scoped(self.engine.full(&[], Scalar::Int(start as i64), ScalarType::Long, device)?);
                self.scoped(self.engine.binary(BinaryKind::Add, ramp.get(), offset.get())?)
            };
            columns.push(self.reshape_ref(&ramp, &expanded)?);
        }
        self.cat_refs(&columns, shape.len())
    }

    /// Collapses the last axis of `coords`, holding the first `k` coordinates
    /// into a tensor of `shape`, to flat element offsets.
    pub(crate) fn linearize(&self, coords: &ScopedRef<'_>, shape: &[u64], k: usize, device: DeviceSelector) -> Result<ScopedRef<'_>> {
        let strides = row_major_strides(shape);
        let strides = self.long_tensor(&strides[..k], device)?;
        let rank = self.engine.shape(coords.get())?.len() as i64;
        Ok(self.scoped(self.engine.tensordot(coords.get(), strides.get(), &[rank - 1], &[0])?))
    }

    /// Reads `x` (shaped `shape`) at `coords`, whose last axis holds `k`
    /// leading coordinates, and reshapes to `out`.
    fn gather_ref<'a>(
        &'a self,
        x: &ScopedRef<'a>,
        shape: &[u64],
        coords: &ScopedRef<'a>,
        coords_shape: &[u64],
        out: &TensorSpec,
    ) -> Result<ScopedRef<'a>> {
        let device = self.device_of(x)?;
        let (k, batch) = match coords_shape.split_last() {
            Some((&k, batch)) if k > 0 && k as usize <= shape.len() => (k as usize, batch),
            _ => {
                return Err(BridgeError::invalid(
                    OpName::Gather,
                    format!("index shape {coords_shape:?} cannot address a tensor of shape {shape:?}"),
                ));
            }
        };
        let offsets = self.linearize(coords, shape, k, device)?;
        let inner: u64 = shape[k..].iter().product();
        let offsets = if k < shape.len() {
            let column = self.reshape_ref(&offsets, &with_trailing(batch, 1))?;
            let ramp = self.scoped(self.engine.arange(0, inner as i64, 1, ScalarType::Long, device)?);
            self.scoped(self.engine.binary(BinaryKind::Add, column.get(), ramp.get())?)
        } else {
            offsets
        };
        let count = batch.iter().product::<u64>() * inner;
        let offsets = self.reshape_ref(&offsets, &[count])?;
        let flat = self.flatten(x, shape)?;
        let picked = self.scoped(self.engine.gather(flat.get(), 0, offsets.get())?);
        self.reshape_ref(&picked, &out.shape)
    }

    /// Reads slices of `t` at coordinates held in the last axis of `indices`.
    pub fn gather(&self, out: &TensorSpec, t: &LogicalTensor, indices: &LogicalTensor) -> Result<LogicalTensor> {
        self.gate(OpName::Gather)?;
        self.out_type(out)?;
        let x = self.operand(t)?;
        let coords = self.operand_as(indices, ScalarType::Long)?;
        let r = self.gather_ref(&x, t.shape(), &coords, indices.shape(), out)?;
        self.finish(out, r)
    }

    /// Picks entries of `t` along `axis`, replacing that axis with the shape of `indices`.
    pub fn take(&self, out: &TensorSpec, t: &LogicalTensor, indices: &LogicalTensor, axis: usize) -> Result<LogicalTensor> {
        self.gate(OpName::Take)?;
        self.out_type(out)?;
        let rank = t.rank();
        if axis >= rank {
            return Err(BridgeError::invalid(OpName::Take, format!("axis {axis} is out of range for {}", t.spec())));
        }
        let index_shape = indices.shape();
        let taken: Vec<u64> = [&t.shape()[..axis], index_shape, &t.shape()[axis + 1..]].concat();
        let x = self.operand(t)?;
        let device = self.device_of(&x)?;
        let index = self.operand_as(indices, ScalarType::Long)?;
        let expanded = with_trailing(&taken, 1);
        let mut columns = Vec::with_capacity(rank);
        for source_axis in 0..rank {
            let column = if source_axis == axis {
                let mut view = vec![1u64; taken.len()];
                view[axis..axis + index_shape.len()].copy_from_slice(index_shape);
                let placed = self.reshape_ref(&index, &view)?;
                self.broadcast_ref(&placed, &taken)?
            } else {
                let along = if source_axis < axis {
                    source_axis
                } else {
                    source_axis - 1 + index_shape.len()
                };
                self.iota_along(&taken, along, ScalarType::Long, device)?
            };
            columns.push(self.reshape_ref(&column, &expanded)?);
        }
        let coords = self.cat_refs(&columns, taken.len())?;
        let r = self.gather_ref(&x, t.shape(), &coords, &with_trailing(&taken, rank as u64), out)?;
        self.finish(out, r)
    }

    /// Picks one entry along `axis` for every position of `indices`, which has `t`'s rank.
    pub fn take_along_axis(&self, out: &TensorSpec, t: &LogicalTensor, indices: &LogicalTensor, axis: usize) -> Result<LogicalTensor> {
        self.gate(OpName::TakeAlongAxis)?;
        self.out_type(out)?;
        let rank = t.rank();
        if axis >= rank || indices.rank() != rank {
            return Err(BridgeError::invalid(
                OpName::TakeAlongAxis,
                format!("indices {} cannot index {} along axis {axis}", indices.spec(), t.spec()),
            ));
        }
        let shape = indices.shape();
        let x = self.operand(t)?;
        let device = self.device_of(&x)?;
        let index = self.operand_as(indices, ScalarType::Long)?;
        let expanded = with_trailing(shape, 1);
        let mut columns = Vec::with_capacity(rank);
        for source_axis in 0..rank {
            let column = if source_axis == axis {
                self.reshape_ref(&index, &expanded)?
            } else {
                let ramp = self.iota_along(shape, source_axis, ScalarType::Long, device)?;
                self.reshape_ref(&ramp, &expanded)?
            };
            columns.push(column);
        }
        let coords = self.cat_refs(&columns, rank)?;
        let r = self.gather_ref(&x, t.shape(), &coords, &with_trailing(shape, rank as u64), out)?;
        self.finish(out, r)
    }

    /// Adds `updates` into a copy of `t` at full coordinates; duplicates accumulate.
    pub fn indexed_add(&self, out: &TensorSpec, t: &LogicalTensor, indices: &LogicalTensor, updates: &LogicalTensor) -> Result<LogicalTensor> {
        self.indexed_write(OpName::IndexedAdd, out, t, indices, updates, true)
    }

    /// Writes `updates` into a copy of `t` at full coordinates.
    pub fn indexed_put(&self, out: &TensorSpec, t: &LogicalTensor, indices: &LogicalTensor, updates: &LogicalTensor) -> Result<LogicalTensor> {
        self.indexed_write(OpName::IndexedPut, out, t, indices, updates, false)
    }

    fn indexed_write(
        &self,
        op: OpName,
        out: &TensorSpec,
        t: &LogicalTensor,
        indices: &LogicalTensor,
        updates: &LogicalTensor,
        accumulate: bool,
    ) -> Result<LogicalTensor> {
        self.gate(op)?;
        let scalar_type = self.out_type(out)?;
        let rank = t.rank();
        let count = match indices.shape() {
            [n, k] if *k as usize == rank && rank > 0 => *n,
            other => {
                return Err(BridgeError::invalid(
                    op,
                    format!("indices of shape {other:?} do not hold full coordinates into {}", t.spec()),
                ));
            }
        };
        if updates.spec().num_elements() != count {
            return Err(BridgeError::invalid(
                op,
                format!("{} updates for {count} indices", updates.spec().num_elements()),
            ));
        }
        let x = self.operand_as(t, scalar_type)?;
        let device = self.device_of(&x)?;
        let coords = self.operand_as(indices, ScalarType::Long)?;
        let offsets = self.linearize(&coords, t.shape(), rank, device)?;
        let values = self.operand_as(updates, scalar_type)?;
        let values = self.reshape_ref(&values, &[count])?;
        let flat = self.flatten(&x, t.shape())?;
        let written = self.scoped(self.engine.scatter(flat.get(), 0, offsets.get(), values.get(), accumulate)?);
        let r = self.reshape_ref(&written, &out.shape)?;
        self.finish(out, r)
    }
}
