use crate::dtype::DType;
use crate::engine::ScalarType;
use crate::error::UnsupportedTypeError;

/// Maps a host dtype onto the engine's scalar type token.
///
/// Unsigned types wider than 8 bits have no engine representation.
pub fn to_scalar_type(dtype: DType) -> Result<ScalarType, UnsupportedTypeError> {
    Ok(match dtype {
        DType::U8 => ScalarType::Byte,
        DType::I8 => ScalarType::Char,
        DType::I16 => ScalarType::Short,
        DType::I32 => ScalarType::Int,
        DType::I64 => ScalarType::Long,
        DType::F16 => ScalarType::Half,
        DType::BF16 => ScalarType::BFloat16,
        DType::F32 => ScalarType::Float,
        DType::F64 => ScalarType::Double,
        DType::U16 | DType::U32 | DType::U64 => return Err(UnsupportedTypeError::new(dtype.bits())),
    })
}

pub fn to_scalar_type_with_hint(dtype: DType, hint: &str) -> Result<ScalarType, UnsupportedTypeError> {
    to_scalar_type(dtype).map_err(|e| e.with_hint(hint))
}

/// Maps an engine token back to a host dtype. `Byte` and `Bool` both become `U8`.
pub fn from_scalar_type(scalar_type: ScalarType) -> DType {
    match scalar_type {
        ScalarType::Byte | ScalarType::Bool => DType::U8,
        ScalarType::Char => DType::I8,
        ScalarType::Short => DType::I16,
        ScalarType::Int => DType::I32,
        ScalarType::Long => DType::I64,
        ScalarType::Half => DType::F16,
        ScalarType::BFloat16 => DType::BF16,
        ScalarType::Float => DType::F32,
        ScalarType::Double => DType::F64,
    }
}
