use half::{bf16, f16};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize, strum_macros::Display)]
pub enum DTypeKind {
    Signed,
    Unsigned,
    Float,
    BrainFloat,
}

/// Host-side element type tag: a kind plus a bit width.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Serialize, Deserialize, strum_macros::EnumIter)]
pub enum DType {
    F64,
    F32,
    BF16,
    F16,
    U64,
    I64,
    U32,
    I32,
    U16,
    I16,
    U8,
    I8,
}

impl DType {
    pub fn size(&self) -> usize {
        self.bits() / 8
    }

    pub fn bits(&self) -> usize {
        match self {
            DType::F64 | DType::U64 | DType::I64 => 64,
            DType::F32 | DType::U32 | DType::I32 => 32,
            DType::BF16 | DType::F16 | DType::U16 | DType::I16 => 16,
            DType::U8 | DType::I8 => 8,
        }
    }

    pub fn kind(&self) -> DTypeKind {
        match self {
            DType::F64 | DType::F32 | DType::F16 => DTypeKind::Float,
            DType::BF16 => DTypeKind::BrainFloat,
            DType::U64 | DType::U32 | DType::U16 | DType::U8 => DTypeKind::Unsigned,
            DType::I64 | DType::I32 | DType::I16 | DType::I8 => DTypeKind::Signed,
        }
    }

    pub fn from_kind_bits(kind: DTypeKind, bits: usize) -> Option<DType> {
        Some(match (kind, bits) {
            (DTypeKind::Float, 64) => DType::F64,
            (DTypeKind::Float, 32) => DType::F32,
            (DTypeKind::Float, 16) => DType::F16,
            (DTypeKind::BrainFloat, 16) => DType::BF16,
            (DTypeKind::Unsigned, 64) => DType::U64,
            (DTypeKind::Unsigned, 32) => DType::U32,
            (DTypeKind::Unsigned, 16) => DType::U16,
            (DTypeKind::Unsigned, 8) => DType::U8,
            (DTypeKind::Signed, 64) => DType::I64,
            (DTypeKind::Signed, 32) => DType::I32,
            (DTypeKind::Signed, 16) => DType::I16,
            (DTypeKind::Signed, 8) => DType::I8,
            _ => return None,
        })
    }

    pub fn is_float(&self) -> bool {
        matches!(self.kind(), DTypeKind::Float | DTypeKind::BrainFloat)
    }

    pub fn is_integer(&self) -> bool {
        !self.is_float()
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.kind() {
            DTypeKind::Signed => "s",
            DTypeKind::Unsigned => "u",
            DTypeKind::Float => "f",
            DTypeKind::BrainFloat => "bf",
        };
        write!(f, "{}{}", prefix, self.bits())
    }
}

pub trait DTypeOfPrimitive: bytemuck::Pod {
    const DTYPE: DType;
}

impl DTypeOfPrimitive for f64 { const DTYPE: DType = DType::F64; }
impl DTypeOfPrimitive for f32 { const DTYPE: DType = DType::F32; }
impl DTypeOfPrimitive for bf16 { const DTYPE: DType = DType::BF16; }
impl DTypeOfPrimitive for f16 { const DTYPE: DType = DType::F16; }
impl DTypeOfPrimitive for i64 { const DTYPE: DType = DType::I64; }
impl DTypeOfPrimitive for u64 { const DTYPE: DType = DType::U64; }
impl DTypeOfPrimitive for i32 { const DTYPE: DType = DType::I32; }
impl DTypeOfPrimitive for u32 { const DTYPE: DType = DType::U32; }
impl DTypeOfPrimitive for i16 { const DTYPE: DType = DType::I16; }
impl DTypeOfPrimitive for u16 { const DTYPE: DType = DType::U16; }
impl DTypeOfPrimitive for i8 { const DTYPE: DType = DType::I8; }
impl DTypeOfPrimitive for u8 { const DTYPE: DType = DType::U8; }
