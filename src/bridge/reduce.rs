use super::{ArgReduceOptions, Bridge, CumulativeOptions, ReduceOptions, ScopedRef, SortDirection, SortOptions, TieBreak, axes_i64, type_map};
use crate::capability::OpName;
use crate::engine::{CumulativeKind, EngineResult, NativeRef, TensorEngine};
use crate::error::{BridgeError, Result};
use crate::tensor::{LogicalTensor, TensorSpec};

const WIDE_UNSIGNED_HINT: &str =
    "Cast the tensor to a signed type with as_type before reducing, the sum would otherwise need a wider unsigned type";

type SingleAxisReduce = fn(&dyn TensorEngine, NativeRef, Option<i64>, bool) -> EngineResult<NativeRef>;

impl Bridge {
    pub fn sum(&self, out: &TensorSpec, t: &LogicalTensor, options: &ReduceOptions) -> Result<LogicalTensor> {
        self.gate(OpName::Sum)?;
        type_map::to_scalar_type_with_hint(t.dtype(), WIDE_UNSIGNED_HINT)?;
        type_map::to_scalar_type_with_hint(out.dtype, WIDE_UNSIGNED_HINT)?;
        self.reduce_all_at_once(out, t, options, |engine, x, dims, keep| engine.sum(x, dims, keep))
    }

    pub fn product(&self, out: &TensorSpec, t: &LogicalTensor, options: &ReduceOptions) -> Result<LogicalTensor> {
        self.gate(OpName::Product)?;
        type_map::to_scalar_type_with_hint(t.dtype(), WIDE_UNSIGNED_HINT)?;
        type_map::to_scalar_type_with_hint(out.dtype, WIDE_UNSIGNED_HINT)?;
        self.reduce_axis_by_axis(out, t, options, |engine, x, dim, keep| engine.prod(x, dim, keep))
    }

    pub fn reduce_max(&self, out: &TensorSpec, t: &LogicalTensor, options: &ReduceOptions) -> Result<LogicalTensor> {
        self.gate(OpName::ReduceMax)?;
        self.out_type(out)?;
        self.reduce_all_at_once(out, t, options, |engine, x, dims, keep| engine.amax(x, dims, keep))
    }

    pub fn reduce_min(&self, out: &TensorSpec, t: &LogicalTensor, options: &ReduceOptions) -> Result<LogicalTensor> {
        self.gate(OpName::ReduceMin)?;
        self.out_type(out)?;
        self.reduce_all_at_once(out, t, options, |engine, x, dims, keep| engine.amin(x, dims, keep))
    }

    pub fn all(&self, out: &TensorSpec, t: &LogicalTensor, options: &ReduceOptions) -> Result<LogicalTensor> {
        self.gate(OpName::All)?;
        self.out_type(out)?;
        self.reduce_axis_by_axis(out, t, options, |engine, x, dim, keep| engine.all(x, dim, keep))
    }

    pub fn any(&self, out: &TensorSpec, t: &LogicalTensor, options: &ReduceOptions) -> Result<LogicalTensor> {
        self.gate(OpName::Any)?;
        self.out_type(out)?;
        self.reduce_axis_by_axis(out, t, options, |engine, x, dim, keep| engine.any(x, dim, keep))
    }

    /// For engine reductions that accept a list of dims.
    fn reduce_all_at_once(
        &self,
        out: &TensorSpec,
        t: &LogicalTensor,
        options: &ReduceOptions,
        f: impl Fn(&dyn TensorEngine, NativeRef, &[i64], bool) -> EngineResult<NativeRef>,
    ) -> Result<LogicalTensor> {
        let x = self.operand(t)?;
        let r = match options.axes.as_deref() {
            Some([]) => return self.finish(out, x),
            Some(axes) => self.scoped(f(self.engine(), x.get(), &axes_i64(axes), options.keep_axes)?),
            None => {
                let r = self.scoped(f(self.engine(), x.get(), &[], options.keep_axes)?);
                self.keep_reduced_axes(out, r, options.keep_axes)?
            }
        };
        self.finish(out, r)
    }

    /// For engine reductions limited to a single dim: reduces the highest axis
    /// first so the remaining indices stay valid.
    fn reduce_axis_by_axis(
        &self,
        out: &TensorSpec,
        t: &LogicalTensor,
        options: &ReduceOptions,
        f: SingleAxisReduce,
    ) -> Result<LogicalTensor> {
        let x = self.operand(t)?;
        let r = match &options.axes {
            None => {
                let r = self.scoped(f(self.engine(), x.get(), None, false)?);
                self.keep_reduced_axes(out, r, options.keep_axes)?
            }
            Some(axes) => {
                let mut axes = axes.clone();
                axes.sort_unstable();
                axes.dedup();
                let mut current = x;
                for axis in axes.into_iter().rev() {
                    current = self.scoped(f(self.engine(), current.get(), Some(axis as i64), options.keep_axes)?);
                }
                current
            }
        };
        self.finish(out, r)
    }

    /// A full reduction yields a scalar; restores the unit axes if asked to.
    fn keep_reduced_axes<'a>(&'a self, out: &TensorSpec, r: ScopedRef<'a>, keep: bool) -> Result<ScopedRef<'a>> {
        if keep && out.rank() > 0 {
            self.reshape_ref(&r, &out.shape)
        } else {
            Ok(r)
        }
    }

    pub fn argmax(&self, out: &TensorSpec, t: &LogicalTensor, options: &ArgReduceOptions) -> Result<LogicalTensor> {
        self.arg_reduce(OpName::Argmax, out, t, options, |engine, x, dim, keep| engine.argmax(x, dim, keep))
    }

    pub fn argmin(&self, out: &TensorSpec, t: &LogicalTensor, options: &ArgReduceOptions) -> Result<LogicalTensor> {
        self.arg_reduce(OpName::Argmin, out, t, options, |engine, x, dim, keep| engine.argmin(x, dim, keep))
    }

    fn arg_reduce(
        &self,
        op: OpName,
        out: &TensorSpec,
        t: &LogicalTensor,
        options: &ArgReduceOptions,
        f: SingleAxisReduce,
    ) -> Result<LogicalTensor> {
        self.gate(op)?;
        self.out_type(out)?;
        if options.tie_break == TieBreak::High {
            return Err(BridgeError::UnsupportedOption {
                op,
                option: format!("tie_break: {}", options.tie_break),
            });
        }
        let x = self.operand(t)?;
        let dim = options.axis.map(|a| a as i64);
        let r = self.scoped(f(self.engine(), x.get(), dim, options.keep_axis && dim.is_some())?);
        let r = if dim.is_none() {
            self.keep_reduced_axes(out, r, options.keep_axis)?
        } else {
            r
        };
        self.finish(out, r)
    }

    pub fn cumulative_sum(&self, out: &TensorSpec, t: &LogicalTensor, options: &CumulativeOptions) -> Result<LogicalTensor> {
        self.cumulative_op(OpName::CumulativeSum, CumulativeKind::Cumsum, out, t, options)
    }

    pub fn cumulative_product(&self, out: &TensorSpec, t: &LogicalTensor, options: &CumulativeOptions) -> Result<LogicalTensor> {
        self.cumulative_op(OpName::CumulativeProduct, CumulativeKind::Cumprod, out, t, options)
    }

    pub fn cumulative_max(&self, out: &TensorSpec, t: &LogicalTensor, options: &CumulativeOptions) -> Result<LogicalTensor> {
        self.cumulative_op(OpName::CumulativeMax, CumulativeKind::Cummax, out, t, options)
    }

    pub fn cumulative_min(&self, out: &TensorSpec, t: &LogicalTensor, options: &CumulativeOptions) -> Result<LogicalTensor> {
        self.cumulative_op(OpName::CumulativeMin, CumulativeKind::Cummin, out, t, options)
    }

    fn cumulative_op(
        &self,
        op: OpName,
        kind: CumulativeKind,
        out: &TensorSpec,
        t: &LogicalTensor,
        options: &CumulativeOptions,
    ) -> Result<LogicalTensor> {
        self.gate(op)?;
        self.out_type(out)?;
        let x = self.operand(t)?;
        let axis = options.axis as i64;
        if !options.reverse {
            let r = self.scoped(self.engine.cumulative(kind, x.get(), axis)?);
            return self.finish(out, r);
        }
        let flipped = self.scoped(self.engine.flip(x.get(), &[axis])?);
        let scanned = self.scoped(self.engine.cumulative(kind, flipped.get(), axis)?);
        let r = self.scoped(self.engine.flip(scanned.get(), &[axis])?);
        self.finish(out, r)
    }

    pub fn sort(&self, out: &TensorSpec, t: &LogicalTensor, options: &SortOptions) -> Result<LogicalTensor> {
        self.gate(OpName::Sort)?;
        self.out_type(out)?;
        let x = self.operand(t)?;
        let descending = options.direction == SortDirection::Descending;
        let r = self.scoped(self.engine.sort(x.get(), options.axis as i64, descending)?);
        self.finish(out, r)
    }

    /// Indices that would sort `t` along the axis; equal elements keep their order.
    pub fn argsort(&self, out: &TensorSpec, t: &LogicalTensor, options: &SortOptions) -> Result<LogicalTensor> {
        self.gate(OpName::Argsort)?;
        self.out_type(out)?;
        let x = self.operand(t)?;
        let descending = options.direction == SortDirection::Descending;
        let r = self.scoped(self.engine.argsort(x.get(), options.axis as i64, descending)?);
        self.finish(out, r)
    }
}
