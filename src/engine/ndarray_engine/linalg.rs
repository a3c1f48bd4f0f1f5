use crate::engine::{EngineError, EngineResult};
use ndarray::{Array2, ArrayD, ArrayView2, Axis, CowArray, Ix3, IxDyn, s};

const PIVOT_EPS: f64 = 0.0;

pub(crate) fn cholesky(a: ArrayView2<f64>, upper: bool) -> Result<Array2<f64>, String> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(format!("expected a square matrix, got {:?}", a.shape()));
    }
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || sum.is_nan() {
                    return Err("matrix is not positive-definite".to_string());
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Ok(if upper { l.t().to_owned() } else { l })
}

/// Partial-pivot decomposition returning `(p, l, u)` with `a = p @ l @ u`.
pub(crate) fn lu(a: ArrayView2<f64>) -> Result<(Array2<f64>, Array2<f64>, Array2<f64>), String> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(format!("expected a square matrix, got {:?}", a.shape()));
    }
    let mut u = a.to_owned();
    let mut l = Array2::<f64>::eye(n);
    let mut perm: Vec<usize> = (0..n).collect();
    for k in 0..n {
        let pivot = (k..n)
            .max_by(|i, j| u[[*i, k]].abs().total_cmp(&u[[*j, k]].abs()))
            .unwrap_or(k);
        if pivot != k {
            for c in 0..n {
                u.swap([k, c], [pivot, c]);
            }
            for c in 0..k {
                l.swap([k, c], [pivot, c]);
            }
            perm.swap(k, pivot);
        }
        if u[[k, k]].abs() <= PIVOT_EPS {
            continue;
        }
        for i in (k + 1)..n {
            let factor = u[[i, k]] / u[[k, k]];
            l[[i, k]] = factor;
            for c in k..n {
                u[[i, c]] -= factor * u[[k, c]];
            }
        }
    }
    // perm[i] is the source row of row i of `p^T a`
    let mut p = Array2::<f64>::zeros((n, n));
    for (i, src) in perm.iter().enumerate() {
        p[[*src, i]] = 1.0;
    }
    Ok((p, l, u))
}

pub(crate) fn determinant(a: ArrayView2<f64>) -> Result<f64, String> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(format!("expected a square matrix, got {:?}", a.shape()));
    }
    let mut m = a.to_owned();
    let mut det = 1.0;
    for k in 0..n {
        let pivot = (k..n)
            .max_by(|i, j| m[[*i, k]].abs().total_cmp(&m[[*j, k]].abs()))
            .unwrap_or(k);
        if m[[pivot, k]] == 0.0 {
            return Ok(0.0);
        }
        if pivot != k {
            for c in 0..n {
                m.swap([k, c], [pivot, c]);
            }
            det = -det;
        }
        det *= m[[k, k]];
        for i in (k + 1)..n {
            let factor = m[[i, k]] / m[[k, k]];
            for c in k..n {
                m[[i, c]] -= factor * m[[k, c]];
            }
        }
    }
    Ok(det)
}

/// Householder QR. Reduced mode returns `q: m x k`, `r: k x n` with `k = min(m, n)`.
pub(crate) fn qr(a: ArrayView2<f64>, reduced: bool) -> (Array2<f64>, Array2<f64>) {
    let (m, n) = a.dim();
    let mut r = a.to_owned();
    let mut q = Array2::<f64>::eye(m);
    for k in 0..n.min(m.saturating_sub(1)) {
        let x = r.slice(s![k.., k]).to_owned();
        let norm = x.dot(&x).sqrt();
        if norm == 0.0 {
            continue;
        }
        let alpha = if x[0] > 0.0 { -norm } else { norm };
        let mut v = x;
        v[0] -= alpha;
        let v_norm = v.dot(&v).sqrt();
        if v_norm == 0.0 {
            continue;
        }
        v.mapv_inplace(|e| e / v_norm);
        // r = (I - 2vv^T) r, q = q (I - 2vv^T)
        for c in 0..n {
            let proj: f64 = (k..m).map(|i| v[i - k] * r[[i, c]]).sum();
            for i in k..m {
                r[[i, c]] -= 2.0 * v[i - k] * proj;
            }
        }
        for row in 0..m {
            let proj: f64 = (k..m).map(|i| q[[row, i]] * v[i - k]).sum();
            for i in k..m {
                q[[row, i]] -= 2.0 * proj * v[i - k];
            }
        }
    }
    // Keep the diagonal of r non-negative
    for k in 0..m.min(n) {
        if r[[k, k]] < 0.0 {
            r.row_mut(k).mapv_inplace(|e| -e);
            q.column_mut(k).mapv_inplace(|e| -e);
        }
    }
    for i in 0..m {
        for j in 0..n.min(i) {
            r[[i, j]] = 0.0;
        }
    }
    if reduced {
        let k = m.min(n);
        (q.slice(s![.., ..k]).to_owned(), r.slice(s![..k, ..]).to_owned())
    } else {
        (q, r)
    }
}

pub(crate) fn triangular_solve(a: ArrayView2<f64>, b: ArrayView2<f64>, transpose: bool, upper: bool) -> Result<Array2<f64>, String> {
    let n = a.nrows();
    if a.ncols() != n || b.nrows() != n {
        return Err(format!("cannot solve {:?} against {:?}", a.shape(), b.shape()));
    }
    let a = if transpose { a.reversed_axes() } else { a };
    let upper = upper != transpose;
    if (0..n).any(|i| a[[i, i]] == 0.0) {
        return Err("the diagonal element is zero, the matrix is singular".to_string());
    }
    let mut x = b.to_owned();
    for c in 0..x.ncols() {
        let rows: Box<dyn Iterator<Item = usize>> = if upper { Box::new((0..n).rev()) } else { Box::new(0..n) };
        for i in rows {
            let mut sum = x[[i, c]];
            let known: Box<dyn Iterator<Item = usize>> = if upper { Box::new((i + 1)..n) } else { Box::new(0..i) };
            for j in known {
                sum -= a[[i, j]] * x[[j, c]];
            }
            x[[i, c]] = sum / a[[i, i]];
        }
    }
    Ok(x)
}

pub(crate) fn solve(a: ArrayView2<f64>, b: ArrayView2<f64>) -> Result<Array2<f64>, String> {
    let n = a.nrows();
    if a.ncols() != n || b.nrows() != n {
        return Err(format!("cannot solve {:?} against {:?}", a.shape(), b.shape()));
    }
    let mut m = a.to_owned();
    let mut x = b.to_owned();
    for k in 0..n {
        let pivot = (k..n)
            .max_by(|i, j| m[[*i, k]].abs().total_cmp(&m[[*j, k]].abs()))
            .unwrap_or(k);
        if m[[pivot, k]] == 0.0 {
            return Err("the matrix is singular".to_string());
        }
        if pivot != k {
            for c in 0..n {
                m.swap([k, c], [pivot, c]);
            }
            for c in 0..x.ncols() {
                x.swap([k, c], [pivot, c]);
            }
        }
        for i in (k + 1)..n {
            let factor = m[[i, k]] / m[[k, k]];
            for c in k..n {
                m[[i, c]] -= factor * m[[k, c]];
            }
            for c in 0..x.ncols() {
                x[[i, c]] -= factor * x[[k, c]];
            }
        }
    }
    triangular_solve(m.view(), x.view(), false, true)
}

fn split_batch<'a>(op: &str, x: &'a ArrayD<f64>) -> EngineResult<(Vec<usize>, CowArray<'a, f64, Ix3>)> {
    let rank = x.ndim();
    if rank < 2 {
        return Err(EngineError::invalid(
            op,
            format!("expected a matrix or a batch of matrices, got shape {:?}", x.shape()),
        ));
    }
    let batch_shape = x.shape()[..rank - 2].to_vec();
    let batch = batch_shape.iter().product();
    let flat = x.to_shape((batch, x.shape()[rank - 2], x.shape()[rank - 1]))?;
    Ok((batch_shape, flat))
}

fn stack(batch_shape: &[usize], mats: &[Array2<f64>]) -> EngineResult<ArrayD<f64>> {
    let (rows, cols) = mats.first().map_or((0, 0), |m| m.dim());
    let mut shape = batch_shape.to_vec();
    shape.extend([rows, cols]);
    let data: Vec<f64> = mats.iter().flat_map(|m| m.iter().copied()).collect();
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), data)?)
}

/// Applies `f` to every matrix of a `[..., m, n]` batch, producing `N` batches.
pub(crate) fn map_matrices<const N: usize>(
    op: &str,
    x: &ArrayD<f64>,
    f: impl Fn(ArrayView2<f64>) -> EngineResult<[Array2<f64>; N]>,
) -> EngineResult<[ArrayD<f64>; N]> {
    let (batch_shape, flat) = split_batch(op, x)?;
    let mut outputs: Vec<Vec<Array2<f64>>> = (0..N).map(|_| Vec::with_capacity(flat.len_of(Axis(0)))).collect();
    for matrix in flat.outer_iter() {
        for (slot, m) in outputs.iter_mut().zip(f(matrix)?) {
            slot.push(m);
        }
    }
    let stacked = outputs
        .iter()
        .map(|mats| stack(&batch_shape, mats))
        .collect::<EngineResult<Vec<_>>>()?;
    <[ArrayD<f64>; N]>::try_from(stacked).map_err(|_| EngineError::invalid(op, "unexpected output count"))
}

/// Applies `f` pairwise over two batches of matrices with identical batch shapes.
pub(crate) fn map_matrix_pairs(
    op: &str,
    a: &ArrayD<f64>,
    b: &ArrayD<f64>,
    f: impl Fn(ArrayView2<f64>, ArrayView2<f64>) -> EngineResult<Array2<f64>>,
) -> EngineResult<ArrayD<f64>> {
    let (batch_a, flat_a) = split_batch(op, a)?;
    let (batch_b, flat_b) = split_batch(op, b)?;
    if batch_a != batch_b {
        return Err(EngineError::invalid(
            op,
            format!("batch shapes {batch_a:?} and {batch_b:?} differ"),
        ));
    }
    let n = flat_a.shape()[1];
    if flat_a.shape()[2] != n || flat_b.shape()[1] != n {
        return Err(EngineError::invalid(
            op,
            format!("cannot solve {:?} against {:?}", a.shape(), b.shape()),
        ));
    }
    let mats = flat_a
        .outer_iter()
        .zip(flat_b.outer_iter())
        .map(|(x, y)| f(x, y))
        .collect::<EngineResult<Vec<_>>>()?;
    stack(&batch_a, &mats)
}
