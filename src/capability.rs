//! Static registry of host operations and how far the bridge can serve them.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

#[derive(
    Copy,
    Clone,
    Debug,
    Hash,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OpName {
    // Creation and memory
    Constant,
    Eye,
    Iota,
    RandomUniform,
    RandomNormal,
    FromBinary,
    ToBinary,
    BackendCopy,
    BackendTransfer,
    BackendDeallocate,
    Inspect,
    // Elementwise unary
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
    Negate,
    Sign,
    Floor,
    Ceil,
    Round,
    BitwiseNot,
    LogicalNot,
    IsNan,
    IsInfinity,
    // Elementwise binary
    Add,
    Subtract,
    Multiply,
    Divide,
    Pow,
    Remainder,
    Quotient,
    Atan2,
    Min,
    Max,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LeftShift,
    RightShift,
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    Select,
    Clip,
    // Reductions and ordering
    Sum,
    Product,
    ReduceMax,
    ReduceMin,
    All,
    Any,
    Argmax,
    Argmin,
    CumulativeSum,
    CumulativeProduct,
    CumulativeMax,
    CumulativeMin,
    Sort,
    Argsort,
    // Shape
    Reshape,
    Squeeze,
    Broadcast,
    Transpose,
    Reverse,
    Concatenate,
    Stack,
    Pad,
    AsType,
    Slice,
    PutSlice,
    ToBatched,
    // Indexing
    Gather,
    Take,
    TakeAlongAxis,
    IndexedAdd,
    IndexedPut,
    // Linear algebra
    Dot,
    Cholesky,
    Qr,
    Lu,
    TriangularSolve,
    Determinant,
    Solve,
    // The engine's model cannot express these
    Bitcast,
    Map,
    PopulationCount,
    CountLeadingZeros,
    Reduce,
    WindowReduce,
    // Not wired up yet
    Eigh,
    Svd,
    Fft,
    Ifft,
    Conv,
    WindowSum,
    WindowProduct,
    WindowMax,
    WindowMin,
    WindowScatterMax,
    WindowScatterMin,
    TopK,
    ErfInv,
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    Implemented,
    /// Cannot be expressed through the engine's operation set.
    Unsupported,
    /// Expressible, but the bridge has no translation for it yet.
    NotYetSupported,
}

impl OpName {
    pub fn capability(&self) -> Capability {
        use OpName::*;
        match self {
            Bitcast | Map | PopulationCount | CountLeadingZeros | Reduce | WindowReduce => Capability::Unsupported,
            Eigh | Svd | Fft | Ifft | Conv | WindowSum | WindowProduct | WindowMax | WindowMin | WindowScatterMax
            | WindowScatterMin | TopK | ErfInv => Capability::NotYetSupported,
            _ => Capability::Implemented,
        }
    }

    pub fn with_capability(capability: Capability) -> Vec<OpName> {
        OpName::iter().filter(|op| op.capability() == capability).collect()
    }

    pub fn implemented() -> Vec<OpName> {
        Self::with_capability(Capability::Implemented)
    }

    pub fn unsupported() -> Vec<OpName> {
        Self::with_capability(Capability::Unsupported)
    }

    pub fn not_yet_supported() -> Vec<OpName> {
        Self::with_capability(Capability::NotYetSupported)
    }
}
