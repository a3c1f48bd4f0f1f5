//! The outbound interface: the operation set the external tensor engine exposes.
//!
//! Everything here is expressed in the engine's own vocabulary: scalar type
//! tokens instead of host dtypes, `i64` dims, and opaque [`NativeRef`]s into the
//! engine's allocator instead of host tensors.

pub mod ndarray_engine;

use crate::device::DeviceSelector;
use crate::tensor::Scalar;
use serde::{Deserialize, Serialize};

pub use ndarray_engine::NDArrayEngine;

/// Opaque reference into the engine's allocator table.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct NativeRef(pub u64);

/// The engine's scalar type tokens.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize, strum_macros::Display, strum_macros::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ScalarType {
    Byte,
    Char,
    Short,
    Int,
    Long,
    Half,
    BFloat16,
    Float,
    Double,
    Bool,
}

impl ScalarType {
    pub fn bits(&self) -> usize {
        match self {
            ScalarType::Byte | ScalarType::Char | ScalarType::Bool => 8,
            ScalarType::Short | ScalarType::Half | ScalarType::BFloat16 => 16,
            ScalarType::Int | ScalarType::Float => 32,
            ScalarType::Long | ScalarType::Double => 64,
        }
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(
            self,
            ScalarType::Half | ScalarType::BFloat16 | ScalarType::Float | ScalarType::Double
        )
    }

    pub fn is_integral(&self) -> bool {
        !self.is_floating_point() && *self != ScalarType::Bool
    }

    /// Result type of a binary kernel over operands of types `a` and `b`.
    pub fn promote(a: ScalarType, b: ScalarType) -> ScalarType {
        use ScalarType::*;
        if a == b {
            return a;
        }
        match (a, b) {
            (Bool, x) | (x, Bool) => x,
            (Half, BFloat16) | (BFloat16, Half) => Float,
            (x, y) if x.is_floating_point() && y.is_floating_point() => {
                if x.bits() >= y.bits() { x } else { y }
            }
            (x, _) if x.is_floating_point() => x,
            (_, y) if y.is_floating_point() => y,
            (Byte, Char) | (Char, Byte) => Short,
            (x, y) => {
                if x.bits() >= y.bits() { x } else { y }
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum UnaryKind {
    Exp,
    Expm1,
    Log,
    Log1p,
    Sigmoid,
    Sin,
    Cos,
    Tan,
    Sinh,
    Cosh,
    Tanh,
    Asin,
    Acos,
    Atan,
    Asinh,
    Acosh,
    Atanh,
    Sqrt,
    Rsqrt,
    Cbrt,
    Erf,
    Erfc,
    Abs,
    Neg,
    Sign,
    Floor,
    Ceil,
    Round,
    BitwiseNot,
    LogicalNot,
    IsNan,
    IsInf,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BinaryKind {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Fmod,
    TruncDiv,
    Atan2,
    Minimum,
    Maximum,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LeftShift,
    RightShift,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
}

impl BinaryKind {
    pub fn is_bitwise(&self) -> bool {
        matches!(self, BinaryKind::BitwiseAnd | BinaryKind::BitwiseOr | BinaryKind::BitwiseXor)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CumulativeKind {
    Cumsum,
    Cumprod,
    Cummax,
    Cummin,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Unknown tensor reference {0:?}")]
    UnknownRef(NativeRef),
    #[error("Device {0} is not available")]
    DeviceUnavailable(DeviceSelector),
    #[error("Expected all tensors to be on the same device, found {0} and {1}")]
    DeviceMismatch(DeviceSelector, DeviceSelector),
    #[error("{op} is not implemented for scalar type {scalar_type}")]
    UnsupportedScalarType { op: String, scalar_type: ScalarType },
    #[error("{op}: {detail}")]
    InvalidArgument { op: String, detail: String },
    #[error("Index {index} is out of bounds for dimension of size {size}")]
    IndexOutOfBounds { index: i64, size: usize },
    #[error("Blob of {got} bytes does not hold {expected} bytes")]
    BlobSize { expected: usize, got: usize },
    #[error("{op}: {detail}")]
    Linalg { op: String, detail: String },
    /// Raised where a native runtime would abort the process rather than throw.
    #[error("native abort in {op}: {detail}")]
    NativeAbort { op: String, detail: String },
    #[error(transparent)]
    ShapeError(#[from] ndarray::ShapeError),
}

impl EngineError {
    pub(crate) fn invalid(op: &str, detail: impl Into<String>) -> Self {
        EngineError::InvalidArgument {
            op: op.to_string(),
            detail: detail.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// A tensor engine the bridge can target.
///
/// Every call is synchronous and every tensor-producing call returns a fresh
/// reference which must eventually be released through [`TensorEngine::delete`].
pub trait TensorEngine: Send + Sync {
    fn name(&self) -> &'static str;

    // Creation
    fn from_blob(&self, blob: &[u8], shape: &[i64], scalar_type: ScalarType, device: DeviceSelector) -> EngineResult<NativeRef>;
    fn full(&self, shape: &[i64], value: Scalar, scalar_type: ScalarType, device: DeviceSelector) -> EngineResult<NativeRef>;
    fn arange(&self, start: i64, end: i64, step: i64, scalar_type: ScalarType, device: DeviceSelector) -> EngineResult<NativeRef>;
    fn eye(&self, n: i64, m: i64, scalar_type: ScalarType, device: DeviceSelector) -> EngineResult<NativeRef>;
    fn rand_uniform(&self, low: f64, high: f64, shape: &[i64], scalar_type: ScalarType, device: DeviceSelector) -> EngineResult<NativeRef>;
    fn rand_normal(&self, mean: f64, std: f64, shape: &[i64], scalar_type: ScalarType, device: DeviceSelector) -> EngineResult<NativeRef>;

    // Introspection and memory
    fn shape(&self, t: NativeRef) -> EngineResult<Vec<i64>>;
    fn scalar_type(&self, t: NativeRef) -> EngineResult<ScalarType>;
    fn device(&self, t: NativeRef) -> EngineResult<DeviceSelector>;
    /// Row-major bytes of at most `limit` elements.
    fn to_blob(&self, t: NativeRef, limit: Option<usize>) -> EngineResult<Vec<u8>>;
    fn to_device(&self, t: NativeRef, device: DeviceSelector) -> EngineResult<NativeRef>;
    /// Returns `false` if the reference was already released.
    fn delete(&self, t: NativeRef) -> EngineResult<bool>;

    // Shape
    fn reshape(&self, t: NativeRef, shape: &[i64]) -> EngineResult<NativeRef>;
    fn broadcast_to(&self, t: NativeRef, shape: &[i64]) -> EngineResult<NativeRef>;
    fn permute(&self, t: NativeRef, dims: &[i64]) -> EngineResult<NativeRef>;
    fn squeeze(&self, t: NativeRef, dims: &[i64]) -> EngineResult<NativeRef>;
    fn narrow(&self, t: NativeRef, dim: i64, start: i64, length: i64) -> EngineResult<NativeRef>;
    fn as_strided(&self, t: NativeRef, size: &[i64], strides: &[i64], offset: i64) -> EngineResult<NativeRef>;
    fn cat(&self, tensors: &[NativeRef], dim: i64) -> EngineResult<NativeRef>;
    /// Splits into chunks of `split_size`; the last chunk may be smaller.
    fn split(&self, t: NativeRef, split_size: i64, dim: i64) -> EngineResult<Vec<NativeRef>>;
    fn flip(&self, t: NativeRef, dims: &[i64]) -> EngineResult<NativeRef>;
    /// `pads` holds one `(before, after)` pair per dim; negative values crop.
    fn constant_pad(&self, t: NativeRef, pads: &[(i64, i64)], value: Scalar) -> EngineResult<NativeRef>;
    fn to_type(&self, t: NativeRef, scalar_type: ScalarType) -> EngineResult<NativeRef>;

    // Elementwise
    fn unary(&self, op: UnaryKind, t: NativeRef) -> EngineResult<NativeRef>;
    fn binary(&self, op: BinaryKind, a: NativeRef, b: NativeRef) -> EngineResult<NativeRef>;
    fn where_self(&self, condition: NativeRef, a: NativeRef, b: NativeRef) -> EngineResult<NativeRef>;
    fn clamp(&self, t: NativeRef, min: NativeRef, max: NativeRef) -> EngineResult<NativeRef>;

    // Reductions
    /// An empty `dims` reduces over every dim.
    fn sum(&self, t: NativeRef, dims: &[i64], keepdim: bool) -> EngineResult<NativeRef>;
    fn amax(&self, t: NativeRef, dims: &[i64], keepdim: bool) -> EngineResult<NativeRef>;
    fn amin(&self, t: NativeRef, dims: &[i64], keepdim: bool) -> EngineResult<NativeRef>;
    fn prod(&self, t: NativeRef, dim: Option<i64>, keepdim: bool) -> EngineResult<NativeRef>;
    fn all(&self, t: NativeRef, dim: Option<i64>, keepdim: bool) -> EngineResult<NativeRef>;
    fn any(&self, t: NativeRef, dim: Option<i64>, keepdim: bool) -> EngineResult<NativeRef>;
    /// Ties resolve to the lowest index.
    fn argmax(&self, t: NativeRef, dim: Option<i64>, keepdim: bool) -> EngineResult<NativeRef>;
    fn argmin(&self, t: NativeRef, dim: Option<i64>, keepdim: bool) -> EngineResult<NativeRef>;
    fn cumulative(&self, op: CumulativeKind, t: NativeRef, dim: i64) -> EngineResult<NativeRef>;
    fn sort(&self, t: NativeRef, dim: i64, descending: bool) -> EngineResult<NativeRef>;
    fn argsort(&self, t: NativeRef, dim: i64, descending: bool) -> EngineResult<NativeRef>;

    // Indexing and contraction
    fn gather(&self, t: NativeRef, dim: i64, index: NativeRef) -> EngineResult<NativeRef>;
    fn scatter(&self, t: NativeRef, dim: i64, index: NativeRef, src: NativeRef, accumulate: bool) -> EngineResult<NativeRef>;
    fn tensordot(&self, a: NativeRef, b: NativeRef, dims_a: &[i64], dims_b: &[i64]) -> EngineResult<NativeRef>;
    /// Batched `[B, M, K] x [B, K, N]`.
    fn matmul(&self, a: NativeRef, b: NativeRef) -> EngineResult<NativeRef>;

    // Linear algebra
    fn cholesky(&self, t: NativeRef, upper: bool) -> EngineResult<NativeRef>;
    fn qr(&self, t: NativeRef, reduced: bool) -> EngineResult<(NativeRef, NativeRef)>;
    /// Returns `(p, l, u)` with `a = p @ l @ u`.
    fn lu(&self, t: NativeRef) -> EngineResult<(NativeRef, NativeRef, NativeRef)>;
    /// Batched `a: [B, n, n]`, `b: [B, n, k]`.
    fn triangular_solve(&self, a: NativeRef, b: NativeRef, transpose: bool, upper: bool) -> EngineResult<NativeRef>;
    fn determinant(&self, t: NativeRef) -> EngineResult<NativeRef>;
    fn solve(&self, a: NativeRef, b: NativeRef) -> EngineResult<NativeRef>;
}
