use super::{Bridge, Leftover, ScopedRef};
use crate::capability::OpName;
use crate::error::{BridgeError, Result};
use crate::tensor::{LogicalTensor, TensorSpec};

/// Row-major element strides of a window of `lengths` picked every `steps` elements.
fn window_strides(lengths: &[u64], steps: &[u64]) -> Vec<i64> {
    let mut strides = vec![0i64; lengths.len()];
    let mut running = 1i64;
    for i in (0..lengths.len()).rev() {
        strides[i] = running * steps[i] as i64;
        running *= lengths[i] as i64;
    }
    strides
}

/// Start positions are clamped so the window fits inside the tensor.
fn clamp_starts(op: OpName, shape: &[u64], starts: &[u64], lengths: &[u64]) -> Result<Vec<u64>> {
    if starts.len() != shape.len() || lengths.len() != shape.len() {
        return Err(BridgeError::invalid(op, format!("expected {} start indices and lengths", shape.len())));
    }
    shape
        .iter()
        .zip(starts.iter().zip(lengths))
        .enumerate()
        .map(|(axis, (&dim, (&start, &len)))| {
            if len > dim {
                Err(BridgeError::invalid(op, format!("length {len} exceeds size {dim} of axis {axis}")))
            } else {
                Ok(start.min(dim - len))
            }
        })
        .collect()
}

impl Bridge {
    /// Takes `lengths` elements from `starts`, keeping every `strides[i]`-th one.
    pub fn slice(
        &self,
        out: &TensorSpec,
        t: &LogicalTensor,
        starts: &[u64],
        lengths: &[u64],
        strides: &[u64],
    ) -> Result<LogicalTensor> {
        self.gate(OpName::Slice)?;
        self.out_type(out)?;
        let shape = t.shape();
        let starts = clamp_starts(OpName::Slice, shape, starts, lengths)?;
        if strides.len() != shape.len() || strides.contains(&0) {
            return Err(BridgeError::invalid(OpName::Slice, format!("invalid strides {strides:?}")));
        }
        let mut x = self.operand(t)?;
        for (axis, (&start, &len)) in starts.iter().zip(lengths).enumerate() {
            if start == 0 && len == shape[axis] {
                continue;
            }
            x = self.scoped(self.engine.narrow(x.get(), axis as i64, start as i64, len as i64)?);
        }
        if strides.iter().any(|s| *s != 1) {
            let sizes: Vec<i64> = lengths
                .iter()
                .zip(strides)
                .map(|(len, step)| len.div_ceil(*step) as i64)
                .collect();
            x = self.scoped(self.engine.as_strided(x.get(), &sizes, &window_strides(lengths, strides), 0)?);
        }
        self.finish(out, x)
    }

    /// Writes `slice` into a copy of `t` at `starts`.
    pub fn put_slice(&self, out: &TensorSpec, t: &LogicalTensor, starts: &[u64], slice: &LogicalTensor) -> Result<LogicalTensor> {
        self.gate(OpName::PutSlice)?;
        let scalar_type = self.out_type(out)?;
        let starts = clamp_starts(OpName::PutSlice, t.shape(), starts, slice.shape())?;
        let x = self.operand_as(t, scalar_type)?;
        let src = self.operand_as(slice, scalar_type)?;
        if t.rank() == 0 {
            return self.finish(out, src);
        }
        let device = self.device_of(&x)?;
        let coords = self.coordinate_grid(slice.shape(), &starts, device)?;
        let offsets = self.linearize(&coords, t.shape(), t.rank(), device)?;
        let offsets = self.flatten(&offsets, slice.shape())?;
        let flat = self.flatten(&x, t.shape())?;
        let src = self.flatten(&src, slice.shape())?;
        let written = self.scoped(self.engine.scatter(flat.get(), 0, offsets.get(), src.get(), false)?);
        let r = self.reshape_ref(&written, &out.shape)?;
        self.finish(out, r)
    }

    /// Splits `t` along its first axis into batches shaped like `out`.
    pub fn to_batched(&self, out: &TensorSpec, t: &LogicalTensor, leftover: Leftover) -> Result<Vec<LogicalTensor>> {
        self.gate(OpName::ToBatched)?;
        self.out_type(out)?;
        let (Some(&total), Some(&batch)) = (t.shape().first(), out.shape.first()) else {
            return Err(BridgeError::invalid(OpName::ToBatched, "cannot batch a scalar"));
        };
        if batch == 0 || out.shape[1..] != t.shape()[1..] {
            return Err(BridgeError::invalid(
                OpName::ToBatched,
                format!("{out} is not a batch of {}", t.spec()),
            ));
        }
        if total == 0 {
            return Ok(Vec::new());
        }
        let remainder = total % batch;
        let x = self.operand(t)?;
        let x = if remainder != 0 && leftover == Leftover::Repeat {
            self.wrap_to_multiple(x, total, batch - remainder)?
        } else {
            x
        };
        let mut chunks: Vec<ScopedRef<'_>> = self
            .engine
            .split(x.get(), batch as i64, 0)?
            .into_iter()
            .map(|c| self.scoped(c))
            .collect();
        if remainder != 0 && leftover == Leftover::Discard {
            chunks.pop();
        }
        self.finish_all(chunks.into_iter().map(|c| (out, c)).collect())
    }

    /// Appends `missing` rows taken from the start of `x`, cycling if needed.
    fn wrap_to_multiple<'a>(&'a self, x: ScopedRef<'a>, total: u64, mut missing: u64) -> Result<ScopedRef<'a>> {
        let mut parts = vec![x];
        while missing > 0 {
            let take = missing.min(total);
            let head = self.scoped(self.engine.narrow(parts[0].get(), 0, 0, take as i64)?);
            parts.push(head);
            missing -= take;
        }
        self.cat_refs(&parts, 0)
    }
}
