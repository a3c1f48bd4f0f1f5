use super::{Bridge, QrMode, ScopedRef, Transform, TriangularSolveOptions, axes_i64};
use crate::capability::OpName;
use crate::engine::ScalarType;
use crate::error::{BridgeError, Result};
use crate::tensor::{LogicalTensor, TensorSpec};

fn size_of(shape: &[u64], axes: &[usize]) -> u64 {
    axes.iter().map(|a| shape[*a]).product()
}

/// Axes of a tensor of `rank` in neither `contract` nor `batch`, in order.
fn free_axes(rank: usize, contract: &[usize], batch: &[usize]) -> Vec<usize> {
    (0..rank).filter(|a| !contract.contains(a) && !batch.contains(a)).collect()
}

/// Splits a stack of square matrices into `(batch, n)`.
fn square_batch(op: OpName, t: &LogicalTensor) -> Result<(u64, u64)> {
    match t.shape() {
        [batch @ .., n, m] if n == m => Ok((batch.iter().product(), *n)),
        _ => Err(BridgeError::invalid(op, format!("{} is not a stack of square matrices", t.spec()))),
    }
}

impl Bridge {
    /// Contracts `contract_a` of `a` against `contract_b` of `b`, pairing
    /// `batch_a` with `batch_b`. Batch axes lead the result.
    #[allow(clippy::too_many_arguments)]
    pub fn dot(
        &self,
        out: &TensorSpec,
        a: &LogicalTensor,
        contract_a: &[usize],
        batch_a: &[usize],
        b: &LogicalTensor,
        contract_b: &[usize],
        batch_b: &[usize],
    ) -> Result<LogicalTensor> {
        self.gate(OpName::Dot)?;
        let scalar_type = self.out_type(out)?;
        if contract_a.len() != contract_b.len() || batch_a.len() != batch_b.len() {
            return Err(BridgeError::invalid(OpName::Dot, "contracting and batch axes must pair up"));
        }
        let x = self.operand_as(a, scalar_type)?;
        let y = self.operand_as(b, scalar_type)?;
        if batch_a.is_empty() {
            let r = self.scoped(self.engine.tensordot(x.get(), y.get(), &axes_i64(contract_a), &axes_i64(contract_b))?);
            let r = self.reshape_ref(&r, &out.shape)?;
            return self.finish(out, r);
        }
        let free_a = free_axes(a.rank(), contract_a, batch_a);
        let free_b = free_axes(b.rank(), contract_b, batch_b);
        let batch = size_of(a.shape(), batch_a);
        let m = size_of(a.shape(), &free_a);
        let k = size_of(a.shape(), contract_a);
        let n = size_of(b.shape(), &free_b);
        let lhs = self.to_matrix_stack(&x, &[batch_a, free_a.as_slice(), contract_a].concat(), &[batch, m, k])?;
        let rhs = self.to_matrix_stack(&y, &[batch_b, contract_b, free_b.as_slice()].concat(), &[batch, k, n])?;
        let product = self.scoped(self.engine.matmul(lhs.get(), rhs.get())?);
        let r = self.reshape_ref(&product, &out.shape)?;
        self.finish(out, r)
    }

    fn to_matrix_stack<'a>(&'a self, x: &ScopedRef<'a>, order: &[usize], shape: &[u64]) -> Result<ScopedRef<'a>> {
        let permuted = self.scoped(self.engine.permute(x.get(), &axes_i64(order))?);
        self.reshape_ref(&permuted, shape)
    }

    /// Lower triangular factor `l` with `l @ lᵀ = t`.
    pub fn cholesky(&self, out: &TensorSpec, t: &LogicalTensor) -> Result<LogicalTensor> {
        self.gate(OpName::Cholesky)?;
        let scalar_type = self.out_type(out)?;
        let x = self.operand_as(t, scalar_type)?;
        let r = self.scoped(self.engine.cholesky(x.get(), false)?);
        self.finish(out, r)
    }

    pub fn qr(&self, out_q: &TensorSpec, out_r: &TensorSpec, t: &LogicalTensor, mode: QrMode) -> Result<(LogicalTensor, LogicalTensor)> {
        self.gate(OpName::Qr)?;
        let scalar_type = self.out_type(out_q)?;
        self.out_type(out_r)?;
        let x = self.operand_as(t, scalar_type)?;
        let (q, r) = self.engine.qr(x.get(), mode == QrMode::Reduced)?;
        let (q, r) = (self.scoped(q), self.scoped(r));
        let mut results = self.finish_all(vec![(out_q, q), (out_r, r)])?.into_iter();
        match (results.next(), results.next()) {
            (Some(q), Some(r)) => Ok((q, r)),
            _ => Err(BridgeError::InternalMismatch("qr produced fewer than two results".to_string())),
        }
    }

    /// Returns `(p, l, u)` with `p @ l @ u = t`.
    pub fn lu(
        &self,
        out_p: &TensorSpec,
        out_l: &TensorSpec,
        out_u: &TensorSpec,
        t: &LogicalTensor,
    ) -> Result<(LogicalTensor, LogicalTensor, LogicalTensor)> {
        self.gate(OpName::Lu)?;
        self.out_type(out_p)?;
        let scalar_type = self.out_type(out_l)?;
        self.out_type(out_u)?;
        let x = self.operand_as(t, scalar_type)?;
        let (p, l, u) = self.engine.lu(x.get())?;
        let (p, l, u) = (self.scoped(p), self.scoped(l), self.scoped(u));
        let mut results = self.finish_all(vec![(out_p, p), (out_l, l), (out_u, u)])?.into_iter();
        match (results.next(), results.next(), results.next()) {
            (Some(p), Some(l), Some(u)) => Ok((p, l, u)),
            _ => Err(BridgeError::InternalMismatch("lu produced fewer than three results".to_string())),
        }
    }

    /// Fails with [`BridgeError::SingularMatrix`] if any matrix in the `[B, n, n]`
    /// stack `a` has a determinant within the configured epsilon of zero.
    fn ensure_nonsingular(&self, op: OpName, a: &ScopedRef<'_>) -> Result<()> {
        let det = self.scoped(self.engine.determinant(a.get())?);
        let det = self.scoped(self.engine.to_type(det.get(), ScalarType::Double)?);
        let values: Vec<f64> = bytemuck::pod_collect_to_vec(&self.engine.to_blob(det.get(), None)?);
        let epsilon = self.config.singularity_epsilon;
        if values.iter().any(|d| d.is_nan() || d.abs() <= epsilon) {
            log::debug!("{op}: determinant within {epsilon} of zero");
            return Err(BridgeError::SingularMatrix { op });
        }
        Ok(())
    }

    /// Canonicalises `a` to `[B, n, n]` and `b` to `[B, n, k]`, treating a `b`
    /// one rank short of `a` as a stack of vectors.
    fn solve_operands<'a>(
        &'a self,
        op: OpName,
        scalar_type: ScalarType,
        a: &LogicalTensor,
        b: &LogicalTensor,
    ) -> Result<(ScopedRef<'a>, ScopedRef<'a>)> {
        let (batch, n) = square_batch(op, a)?;
        let columns = if b.rank() + 1 == a.rank() {
            1
        } else if b.rank() == a.rank() {
            b.shape()[b.rank() - 1]
        } else {
            return Err(BridgeError::invalid(op, format!("{} cannot be solved against {}", b.spec(), a.spec())));
        };
        let x = self.operand_as(a, scalar_type)?;
        let x = self.reshape_ref(&x, &[batch, n, n])?;
        let y = self.operand_as(b, scalar_type)?;
        let y = self.reshape_ref(&y, &[batch, n, columns])?;
        Ok((x, y))
    }

    /// Solves `op(a) x = b` for triangular `a`.
    pub fn triangular_solve(
        &self,
        out: &TensorSpec,
        a: &LogicalTensor,
        b: &LogicalTensor,
        options: &TriangularSolveOptions,
    ) -> Result<LogicalTensor> {
        self.gate(OpName::TriangularSolve)?;
        let scalar_type = self.out_type(out)?;
        if !options.left_side {
            return Err(BridgeError::UnsupportedOption {
                op: OpName::TriangularSolve,
                option: "left_side: false".to_string(),
            });
        }
        let (x, y) = self.solve_operands(OpName::TriangularSolve, scalar_type, a, b)?;
        self.ensure_nonsingular(OpName::TriangularSolve, &x)?;
        let transpose = options.transform_a == Transform::Transpose;
        let solved = self.scoped(self.engine.triangular_solve(x.get(), y.get(), transpose, !options.lower)?);
        let r = self.reshape_ref(&solved, &out.shape)?;
        self.finish(out, r)
    }

    pub fn determinant(&self, out: &TensorSpec, t: &LogicalTensor) -> Result<LogicalTensor> {
        self.gate(OpName::Determinant)?;
        let scalar_type = self.out_type(out)?;
        square_batch(OpName::Determinant, t)?;
        let x = self.operand_as(t, scalar_type)?;
        let r = self.scoped(self.engine.determinant(x.get())?);
        self.finish(out, r)
    }

    /// Solves `a x = b` for square `a`.
    pub fn solve(&self, out: &TensorSpec, a: &LogicalTensor, b: &LogicalTensor) -> Result<LogicalTensor> {
        self.gate(OpName::Solve)?;
        let scalar_type = self.out_type(out)?;
        let (x, y) = self.solve_operands(OpName::Solve, scalar_type, a, b)?;
        self.ensure_nonsingular(OpName::Solve, &x)?;
        let solved = self.scoped(self.engine.solve(x.get(), y.get())?);
        let r = self.reshape_ref(&solved, &out.shape)?;
        self.finish(out, r)
    }
}
