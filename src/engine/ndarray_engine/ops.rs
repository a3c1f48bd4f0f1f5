use super::native_tensor::Element;
use crate::engine::{EngineError, EngineResult};
use ndarray::{ArcArray, Array, ArrayD, Axis, Dimension, Ix2, IxDyn, LinalgScalar, Slice, Zip};
use std::cmp::Ordering;

pub(crate) fn normalize_dim(op: &str, dim: i64, rank: usize) -> EngineResult<usize> {
    let rank_i = rank as i64;
    let d = if dim < 0 { dim + rank_i } else { dim };
    if d < 0 || d >= rank_i {
        return Err(EngineError::invalid(
            op,
            format!("dim {dim} is out of range for a tensor of rank {rank}"),
        ));
    }
    Ok(d as usize)
}

pub(crate) fn normalize_dims(op: &str, dims: &[i64], rank: usize) -> EngineResult<Vec<usize>> {
    let mut out = Vec::with_capacity(dims.len());
    for d in dims {
        let d = normalize_dim(op, *d, rank)?;
        if out.contains(&d) {
            return Err(EngineError::invalid(op, format!("dim {d} appears more than once")));
        }
        out.push(d);
    }
    Ok(out)
}

pub(crate) fn to_usize_shape(op: &str, shape: &[i64]) -> EngineResult<Vec<usize>> {
    shape
        .iter()
        .map(|d| {
            usize::try_from(*d).map_err(|_| EngineError::invalid(op, format!("negative size {d} in shape {shape:?}")))
        })
        .collect()
}

pub(crate) fn compare<T: Element>(a: T, b: T) -> Ordering {
    match a.partial_cmp(&b) {
        Some(o) => o,
        // NaN sorts above everything else
        None => a.is_nan().cmp(&b.is_nan()),
    }
}

pub(crate) fn reshape<T: Clone>(x: &ArcArray<T, IxDyn>, shape: &[usize]) -> EngineResult<ArcArray<T, IxDyn>> {
    let count: usize = shape.iter().product();
    if count != x.len() {
        return Err(EngineError::invalid(
            "reshape",
            format!("cannot reshape {:?} into {:?}", x.shape(), shape),
        ));
    }
    Ok(x.to_shape(shape.to_vec())?.to_shared())
}

pub(crate) fn broadcast_to<T: Clone>(x: &ArcArray<T, IxDyn>, shape: &[usize]) -> EngineResult<ArcArray<T, IxDyn>> {
    x.broadcast(IxDyn(shape))
        .map(|v| v.to_shared())
        .ok_or_else(|| EngineError::invalid("broadcast_to", format!("cannot broadcast {:?} to {:?}", x.shape(), shape)))
}

pub(crate) fn permute<T: Clone>(x: &ArcArray<T, IxDyn>, dims: &[usize]) -> EngineResult<ArcArray<T, IxDyn>> {
    let rank = x.ndim();
    let mut seen = vec![false; rank];
    if dims.len() != rank {
        return Err(EngineError::invalid("permute", format!("expected {rank} dims, got {}", dims.len())));
    }
    for d in dims {
        if *d >= rank || seen[*d] {
            return Err(EngineError::invalid("permute", format!("invalid permutation {dims:?}")));
        }
        seen[*d] = true;
    }
    Ok(x.view().permuted_axes(IxDyn(dims)).as_standard_layout().to_shared())
}

pub(crate) fn narrow<T: Clone>(x: &ArcArray<T, IxDyn>, dim: usize, start: i64, length: i64) -> EngineResult<ArcArray<T, IxDyn>> {
    let size = x.shape()[dim] as i64;
    if start < 0 || length < 0 || start + length > size {
        return Err(EngineError::invalid(
            "narrow",
            format!("window start={start} length={length} exceeds dim {dim} of size {size}"),
        ));
    }
    let (start, end) = (start as usize, (start + length) as usize);
    Ok(x.slice_axis(Axis(dim), Slice::from(start..end)).to_shared())
}

/// Reads the row-major buffer of `x` through an explicit size/stride pattern.
pub(crate) fn as_strided<T: Copy>(x: &ArcArray<T, IxDyn>, size: &[usize], strides: &[i64], offset: i64) -> EngineResult<ArrayD<T>> {
    if size.len() != strides.len() {
        return Err(EngineError::invalid("as_strided", "size and strides must have the same length"));
    }
    if offset < 0 || strides.iter().any(|s| *s < 0) {
        return Err(EngineError::invalid("as_strided", "negative strides and offsets are not supported"));
    }
    let storage: Vec<T> = x.iter().copied().collect();
    if size.iter().product::<usize>() > 0 {
        let last: i64 = offset + size.iter().zip(strides).map(|(n, s)| (*n as i64 - 1) * s).sum::<i64>();
        if last as usize >= storage.len() {
            return Err(EngineError::invalid(
                "as_strided",
                format!("pattern reaches element {last} of a storage of {} elements", storage.len()),
            ));
        }
    }
    Ok(Array::from_shape_fn(IxDyn(size), |pos| {
        let idx = offset + pos.slice().iter().zip(strides).map(|(p, s)| *p as i64 * s).sum::<i64>();
        storage[idx as usize]
    }))
}

pub(crate) fn cat<T: Clone>(xs: &[ArcArray<T, IxDyn>], dim: usize) -> EngineResult<ArrayD<T>> {
    let views: Vec<_> = xs.iter().map(|x| x.view()).collect();
    Ok(ndarray::concatenate(Axis(dim), &views)?)
}

pub(crate) fn flip<T: Clone>(x: &ArcArray<T, IxDyn>, dims: &[usize]) -> ArcArray<T, IxDyn> {
    let mut view = x.view();
    for d in dims {
        view.invert_axis(Axis(*d));
    }
    view.as_standard_layout().to_shared()
}

pub(crate) fn constant_pad<T: Copy>(x: &ArcArray<T, IxDyn>, pads: &[(i64, i64)], value: T) -> EngineResult<ArrayD<T>> {
    if pads.len() != x.ndim() {
        return Err(EngineError::invalid("constant_pad", format!("expected {} pad pairs, got {}", x.ndim(), pads.len())));
    }
    let mut out_shape = Vec::with_capacity(pads.len());
    for (n, (lo, hi)) in x.shape().iter().zip(pads) {
        let size = *n as i64 + lo + hi;
        if size < 0 {
            return Err(EngineError::invalid("constant_pad", format!("padding {pads:?} leaves a negative size")));
        }
        out_shape.push(size as usize);
    }
    let in_shape = x.shape().to_vec();
    Ok(Array::from_shape_fn(IxDyn(&out_shape), |pos| {
        let mut src = Vec::with_capacity(pos.ndim());
        for (d, p) in pos.slice().iter().enumerate() {
            let i = *p as i64 - pads[d].0;
            if i < 0 || i >= in_shape[d] as i64 {
                return value;
            }
            src.push(i as usize);
        }
        x[src.as_slice()]
    }))
}

pub(crate) fn broadcast_shape(op: &str, a: &[usize], b: &[usize]) -> EngineResult<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut out = vec![0; rank];
    for i in 0..rank {
        let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => {
                return Err(EngineError::invalid(op, format!("shapes {a:?} and {b:?} are not broadcastable")));
            }
        };
    }
    Ok(out)
}

pub(crate) fn zip_map<A: Copy, B: Copy, O>(
    op: &str,
    a: &ArcArray<A, IxDyn>,
    b: &ArcArray<B, IxDyn>,
    f: impl Fn(A, B) -> O,
) -> EngineResult<ArrayD<O>> {
    let shape = broadcast_shape(op, a.shape(), b.shape())?;
    let av = broadcast_to(a, &shape)?;
    let bv = broadcast_to(b, &shape)?;
    Ok(Zip::from(&av).and(&bv).map_collect(|x, y| f(*x, *y)))
}

pub(crate) fn zip_map3<C: Copy, A: Copy, O>(
    op: &str,
    c: &ArcArray<C, IxDyn>,
    a: &ArcArray<A, IxDyn>,
    b: &ArcArray<A, IxDyn>,
    f: impl Fn(C, A, A) -> O,
) -> EngineResult<ArrayD<O>> {
    let shape = broadcast_shape(op, c.shape(), a.shape())?;
    let shape = broadcast_shape(op, &shape, b.shape())?;
    let cv = broadcast_to(c, &shape)?;
    let av = broadcast_to(a, &shape)?;
    let bv = broadcast_to(b, &shape)?;
    Ok(Zip::from(&cv).and(&av).and(&bv).map_collect(|x, y, z| f(*x, *y, *z)))
}

/// Folds `dims` away (all dims when empty), optionally keeping them as size 1.
pub(crate) fn reduce_dims<A: Copy>(x: ArrayD<A>, dims: &[usize], keepdim: bool, init: A, f: impl Fn(A, A) -> A) -> ArrayD<A> {
    let mut dims: Vec<usize> = if dims.is_empty() { (0..x.ndim()).collect() } else { dims.to_vec() };
    dims.sort_unstable();
    let mut out = x;
    for d in dims.iter().rev() {
        out = out.fold_axis(Axis(*d), init, |acc, v| f(*acc, *v));
    }
    if keepdim {
        for d in dims {
            out = out.insert_axis(Axis(d));
        }
    }
    out
}

pub(crate) fn arg_reduce<T: Element>(
    x: &ArcArray<T, IxDyn>,
    dim: Option<usize>,
    keepdim: bool,
    better: impl Fn(T, T) -> bool,
) -> EngineResult<ArrayD<i64>> {
    let pick = |lane: &mut dyn Iterator<Item = T>| -> i64 {
        let mut best: Option<(i64, T)> = None;
        for (i, v) in lane.enumerate() {
            match best {
                Some((_, b)) if !better(v, b) => {}
                _ => best = Some((i as i64, v)),
            }
        }
        best.map_or(0, |(i, _)| i)
    };
    match dim {
        None => {
            if x.is_empty() {
                return Err(EngineError::invalid("argmax", "cannot reduce an empty tensor"));
            }
            let idx = pick(&mut x.iter().copied());
            let shape = if keepdim { vec![1; x.ndim()] } else { vec![] };
            Ok(ArrayD::from_elem(IxDyn(&shape), idx))
        }
        Some(d) => {
            let mut out = x.map_axis(Axis(d), |lane| pick(&mut lane.iter().copied()));
            if keepdim {
                out = out.insert_axis(Axis(d));
            }
            Ok(out)
        }
    }
}

pub(crate) fn argmax_better<T: Element>(candidate: T, best: T) -> bool {
    (candidate.is_nan() && !best.is_nan()) || candidate > best
}

pub(crate) fn argmin_better<T: Element>(candidate: T, best: T) -> bool {
    (candidate.is_nan() && !best.is_nan()) || candidate < best
}

pub(crate) fn accumulate<A: Copy>(mut x: ArrayD<A>, dim: usize, f: impl Fn(A, A) -> A) -> ArrayD<A> {
    x.accumulate_axis_inplace(Axis(dim), |prev, curr| *curr = f(*prev, *curr));
    x
}

/// Sorts every lane along `dim`, returning values and source indices. Stable.
pub(crate) fn sort_lanes<T: Element>(x: &ArcArray<T, IxDyn>, dim: usize, descending: bool) -> EngineResult<(ArrayD<T>, ArrayD<i64>)> {
    let rank = x.ndim();
    let n = x.shape()[dim];
    if n == 0 || x.is_empty() {
        return Ok((x.to_owned(), ArrayD::zeros(x.raw_dim())));
    }
    let mut perm: Vec<usize> = (0..rank).filter(|d| *d != dim).collect();
    perm.push(dim);
    let mut inverse = vec![0; rank];
    for (i, p) in perm.iter().enumerate() {
        inverse[*p] = i;
    }
    let moved: Vec<T> = x.view().permuted_axes(IxDyn(&perm)).iter().copied().collect();
    let mut values = Vec::with_capacity(moved.len());
    let mut indices = Vec::with_capacity(moved.len());
    for lane in moved.chunks(n) {
        let mut order: Vec<usize> = (0..n).collect();
        if descending {
            order.sort_by(|i, j| compare(lane[*j], lane[*i]));
        } else {
            order.sort_by(|i, j| compare(lane[*i], lane[*j]));
        }
        values.extend(order.iter().map(|i| lane[*i]));
        indices.extend(order.iter().map(|i| *i as i64));
    }
    let moved_shape: Vec<usize> = perm.iter().map(|p| x.shape()[*p]).collect();
    let values = ArrayD::from_shape_vec(IxDyn(&moved_shape), values)?
        .permuted_axes(IxDyn(&inverse))
        .as_standard_layout()
        .into_owned();
    let indices = ArrayD::from_shape_vec(IxDyn(&moved_shape), indices)?
        .permuted_axes(IxDyn(&inverse))
        .as_standard_layout()
        .into_owned();
    Ok((values, indices))
}

fn check_index_shape(op: &str, x_shape: &[usize], index_shape: &[usize], dim: usize) -> EngineResult<()> {
    if index_shape.len() != x_shape.len() {
        return Err(EngineError::invalid(
            op,
            format!("index rank {} does not match input rank {}", index_shape.len(), x_shape.len()),
        ));
    }
    for (d, (i, n)) in index_shape.iter().zip(x_shape).enumerate() {
        if d != dim && i > n {
            return Err(EngineError::invalid(op, format!("index shape {index_shape:?} exceeds input shape {x_shape:?}")));
        }
    }
    Ok(())
}

fn check_index_values(index: &ArrayD<i64>, size: usize) -> EngineResult<()> {
    match index.iter().find(|i| **i < 0 || **i >= size as i64) {
        Some(i) => Err(EngineError::IndexOutOfBounds { index: *i, size }),
        None => Ok(()),
    }
}

/// `out[p] = x[p with p[dim] = index[p]]`; index has the same rank as `x`.
pub(crate) fn gather<T: Copy>(x: &ArcArray<T, IxDyn>, dim: usize, index: &ArrayD<i64>) -> EngineResult<ArrayD<T>> {
    check_index_shape("gather", x.shape(), index.shape(), dim)?;
    check_index_values(index, x.shape()[dim])?;
    Ok(Array::from_shape_fn(index.raw_dim(), |pos| {
        let mut src = pos.slice().to_vec();
        src[dim] = index[pos.slice()] as usize;
        x[src.as_slice()]
    }))
}

/// Writes (or accumulates) `src[p]` into `x[p with p[dim] = index[p]]`.
pub(crate) fn scatter<T: Element>(
    x: &ArcArray<T, IxDyn>,
    dim: usize,
    index: &ArrayD<i64>,
    src: &ArcArray<T, IxDyn>,
    accumulate: bool,
) -> EngineResult<ArrayD<T>> {
    check_index_shape("scatter", x.shape(), index.shape(), dim)?;
    check_index_values(index, x.shape()[dim])?;
    let src = broadcast_to(src, index.shape())?;
    let mut out = x.to_owned();
    for (pos, i) in index.indexed_iter() {
        let mut dst = pos.slice().to_vec();
        dst[dim] = *i as usize;
        let v = src[pos.slice()];
        let slot = &mut out[dst.as_slice()];
        *slot = if accumulate { add_elements(*slot, v) } else { v };
    }
    Ok(out)
}

fn add_elements<T: Element>(a: T, b: T) -> T {
    if T::SCALAR_TYPE.is_floating_point() {
        T::from_f64(a.to_f64() + b.to_f64())
    } else {
        T::from_i64(a.to_i64().wrapping_add(b.to_i64()))
    }
}

/// Contracts `dims_a` of `a` against `dims_b` of `b`; free dims of `a` come first.
pub(crate) fn tensordot<A: LinalgScalar>(a: &ArrayD<A>, b: &ArrayD<A>, dims_a: &[usize], dims_b: &[usize]) -> EngineResult<ArrayD<A>> {
    if dims_a.len() != dims_b.len() {
        return Err(EngineError::invalid("tensordot", "both operands must contract the same number of dims"));
    }
    for (da, db) in dims_a.iter().zip(dims_b) {
        if a.shape()[*da] != b.shape()[*db] {
            return Err(EngineError::invalid(
                "tensordot",
                format!("contracted dims have sizes {} and {}", a.shape()[*da], b.shape()[*db]),
            ));
        }
    }
    let free_a: Vec<usize> = (0..a.ndim()).filter(|d| !dims_a.contains(d)).collect();
    let free_b: Vec<usize> = (0..b.ndim()).filter(|d| !dims_b.contains(d)).collect();
    let m: usize = free_a.iter().map(|d| a.shape()[*d]).product();
    let n: usize = free_b.iter().map(|d| b.shape()[*d]).product();
    let k: usize = dims_a.iter().map(|d| a.shape()[*d]).product();

    let perm_a: Vec<usize> = free_a.iter().chain(dims_a).copied().collect();
    let perm_b: Vec<usize> = dims_b.iter().chain(&free_b).copied().collect();
    let a2 = a.view().permuted_axes(IxDyn(&perm_a)).to_shape((m, k))?.into_owned();
    let b2 = b.view().permuted_axes(IxDyn(&perm_b)).to_shape((k, n))?.into_owned();
    let c = a2.dot(&b2);

    let out_shape: Vec<usize> = free_a
        .iter()
        .map(|d| a.shape()[*d])
        .chain(free_b.iter().map(|d| b.shape()[*d]))
        .collect();
    Ok(c.into_shape_with_order(IxDyn(&out_shape))?)
}

pub(crate) fn batched_matmul<A: LinalgScalar>(a: &ArrayD<A>, b: &ArrayD<A>) -> EngineResult<ArrayD<A>> {
    if a.ndim() != 3 || b.ndim() != 3 || a.shape()[0] != b.shape()[0] || a.shape()[2] != b.shape()[1] {
        return Err(EngineError::invalid(
            "matmul",
            format!("cannot multiply {:?} by {:?}", a.shape(), b.shape()),
        ));
    }
    let (batch, m, n) = (a.shape()[0], a.shape()[1], b.shape()[2]);
    let mut out = ArrayD::<A>::zeros(IxDyn(&[batch, m, n]));
    for i in 0..batch {
        let lhs = a.index_axis(Axis(0), i).into_dimensionality::<Ix2>()?;
        let rhs = b.index_axis(Axis(0), i).into_dimensionality::<Ix2>()?;
        out.index_axis_mut(Axis(0), i).assign(&lhs.dot(&rhs).into_dyn());
    }
    Ok(out)
}

/// Abramowitz & Stegun 7.1.26, |error| < 1.5e-7.
pub(crate) fn erf(x: f64) -> f64 {
    if x.is_nan() {
        return x;
    }
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let y = 1.0
        - (((((1.061405429 * t - 1.453152027) * t) + 1.421413741) * t - 0.284496736) * t + 0.254829592)
            * t
            * (-x * x).exp();
    sign * y
}
