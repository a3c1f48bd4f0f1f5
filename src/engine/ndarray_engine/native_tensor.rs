use crate::engine::{EngineError, EngineResult, ScalarType};
use half::{bf16, f16};
use ndarray::{ArcArray, ArrayD, IxDyn};
use std::fmt::Debug;

/// Element types the reference engine stores natively.
pub trait Element: Copy + Default + PartialOrd + Debug + Send + Sync + 'static {
    const SCALAR_TYPE: ScalarType;

    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;
    fn to_i64(self) -> i64;
    /// Wrapping conversion, matching two's complement truncation.
    fn from_i64(v: i64) -> Self;
    fn read_blob(bytes: &[u8]) -> Vec<Self>;
    fn write_blob(values: &[Self], out: &mut Vec<u8>);

    fn convert<D: Element>(self) -> D {
        if Self::SCALAR_TYPE.is_floating_point() || D::SCALAR_TYPE.is_floating_point() {
            D::from_f64(self.to_f64())
        } else {
            D::from_i64(self.to_i64())
        }
    }

    fn is_nan(self) -> bool {
        #[allow(clippy::eq_op)]
        let nan = self != self;
        nan
    }
}

macro_rules! impl_int_element {
    ($t:ty, $st:ident) => {
        impl Element for $t {
            const SCALAR_TYPE: ScalarType = ScalarType::$st;
            fn to_f64(self) -> f64 { self as f64 }
            fn from_f64(v: f64) -> Self { v as $t }
            fn to_i64(self) -> i64 { self as i64 }
            fn from_i64(v: i64) -> Self { v as $t }
            fn read_blob(bytes: &[u8]) -> Vec<Self> { bytemuck::pod_collect_to_vec(bytes) }
            fn write_blob(values: &[Self], out: &mut Vec<u8>) {
                out.extend_from_slice(bytemuck::cast_slice(values))
            }
        }
    };
}

macro_rules! impl_float_element {
    ($t:ty, $st:ident, $from:expr, $to:expr) => {
        impl Element for $t {
            const SCALAR_TYPE: ScalarType = ScalarType::$st;
            fn to_f64(self) -> f64 { $to(self) }
            fn from_f64(v: f64) -> Self { $from(v) }
            fn to_i64(self) -> i64 { $to(self) as i64 }
            fn from_i64(v: i64) -> Self { $from(v as f64) }
            fn read_blob(bytes: &[u8]) -> Vec<Self> { bytemuck::pod_collect_to_vec(bytes) }
            fn write_blob(values: &[Self], out: &mut Vec<u8>) {
                out.extend_from_slice(bytemuck::cast_slice(values))
            }
        }
    };
}

impl_int_element!(u8, Byte);
impl_int_element!(i8, Char);
impl_int_element!(i16, Short);
impl_int_element!(i32, Int);
impl_int_element!(i64, Long);
impl_float_element!(f16, Half, f16::from_f64, f16::to_f64);
impl_float_element!(bf16, BFloat16, bf16::from_f64, bf16::to_f64);
impl_float_element!(f32, Float, |v: f64| v as f32, |v: f32| v as f64);
impl_float_element!(f64, Double, |v: f64| v, |v: f64| v);

impl Element for bool {
    const SCALAR_TYPE: ScalarType = ScalarType::Bool;
    fn to_f64(self) -> f64 { if self { 1.0 } else { 0.0 } }
    fn from_f64(v: f64) -> Self { v != 0.0 }
    fn to_i64(self) -> i64 { self as i64 }
    fn from_i64(v: i64) -> Self { v != 0 }
    fn read_blob(bytes: &[u8]) -> Vec<Self> { bytes.iter().map(|b| *b != 0).collect() }
    fn write_blob(values: &[Self], out: &mut Vec<u8>) {
        out.extend(values.iter().map(|v| *v as u8))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NativeTensor {
    Byte(ArcArray<u8, IxDyn>),
    Char(ArcArray<i8, IxDyn>),
    Short(ArcArray<i16, IxDyn>),
    Int(ArcArray<i32, IxDyn>),
    Long(ArcArray<i64, IxDyn>),
    Half(ArcArray<f16, IxDyn>),
    BFloat16(ArcArray<bf16, IxDyn>),
    Float(ArcArray<f32, IxDyn>),
    Double(ArcArray<f64, IxDyn>),
    Bool(ArcArray<bool, IxDyn>),
}

/// Runs `$body` with `$x` bound to the typed array inside a [`NativeTensor`].
macro_rules! with_native {
    ($t:expr, $x:ident => $body:expr) => {
        match $t {
            NativeTensor::Byte($x) => $body,
            NativeTensor::Char($x) => $body,
            NativeTensor::Short($x) => $body,
            NativeTensor::Int($x) => $body,
            NativeTensor::Long($x) => $body,
            NativeTensor::Half($x) => $body,
            NativeTensor::BFloat16($x) => $body,
            NativeTensor::Float($x) => $body,
            NativeTensor::Double($x) => $body,
            NativeTensor::Bool($x) => $body,
        }
    };
}
pub(crate) use with_native;

/// Like [`with_native!`], but binds a second tensor of the same scalar type.
macro_rules! with_native_pair {
    ($a:expr, $b:expr, $x:ident, $y:ident => $body:expr) => {
        match ($a, $b) {
            (NativeTensor::Byte($x), NativeTensor::Byte($y)) => Ok($body),
            (NativeTensor::Char($x), NativeTensor::Char($y)) => Ok($body),
            (NativeTensor::Short($x), NativeTensor::Short($y)) => Ok($body),
            (NativeTensor::Int($x), NativeTensor::Int($y)) => Ok($body),
            (NativeTensor::Long($x), NativeTensor::Long($y)) => Ok($body),
            (NativeTensor::Half($x), NativeTensor::Half($y)) => Ok($body),
            (NativeTensor::BFloat16($x), NativeTensor::BFloat16($y)) => Ok($body),
            (NativeTensor::Float($x), NativeTensor::Float($y)) => Ok($body),
            (NativeTensor::Double($x), NativeTensor::Double($y)) => Ok($body),
            (NativeTensor::Bool($x), NativeTensor::Bool($y)) => Ok($body),
            (a, b) => Err(EngineError::invalid(
                "binary kernel",
                format!("scalar type mismatch {} vs {}", a.scalar_type(), b.scalar_type()),
            )),
        }
    };
}
pub(crate) use with_native_pair;

macro_rules! impl_from_array {
    ($t:ty, $variant:ident) => {
        impl From<ArcArray<$t, IxDyn>> for NativeTensor {
            fn from(value: ArcArray<$t, IxDyn>) -> Self {
                NativeTensor::$variant(value)
            }
        }

        impl From<ArrayD<$t>> for NativeTensor {
            fn from(value: ArrayD<$t>) -> Self {
                NativeTensor::$variant(value.into_shared())
            }
        }
    };
}

impl_from_array!(u8, Byte);
impl_from_array!(i8, Char);
impl_from_array!(i16, Short);
impl_from_array!(i32, Int);
impl_from_array!(i64, Long);
impl_from_array!(f16, Half);
impl_from_array!(bf16, BFloat16);
impl_from_array!(f32, Float);
impl_from_array!(f64, Double);
impl_from_array!(bool, Bool);

/// Maps an `f64` array into the array of the given scalar type.
pub fn from_f64_array(values: ArrayD<f64>, scalar_type: ScalarType) -> NativeTensor {
    match scalar_type {
        ScalarType::Byte => values.mapv(u8::from_f64).into(),
        ScalarType::Char => values.mapv(i8::from_f64).into(),
        ScalarType::Short => values.mapv(i16::from_f64).into(),
        ScalarType::Int => values.mapv(i32::from_f64).into(),
        ScalarType::Long => values.mapv(i64::from_f64).into(),
        ScalarType::Half => values.mapv(f16::from_f64).into(),
        ScalarType::BFloat16 => values.mapv(bf16::from_f64).into(),
        ScalarType::Float => values.mapv(f32::from_f64).into(),
        ScalarType::Double => values.into(),
        ScalarType::Bool => values.mapv(bool::from_f64).into(),
    }
}

/// Maps an `i64` array into the array of the given scalar type, wrapping.
pub fn from_i64_array(values: ArrayD<i64>, scalar_type: ScalarType) -> NativeTensor {
    match scalar_type {
        ScalarType::Byte => values.mapv(u8::from_i64).into(),
        ScalarType::Char => values.mapv(i8::from_i64).into(),
        ScalarType::Short => values.mapv(i16::from_i64).into(),
        ScalarType::Int => values.mapv(i32::from_i64).into(),
        ScalarType::Long => values.into(),
        ScalarType::Half => values.mapv(f16::from_i64).into(),
        ScalarType::BFloat16 => values.mapv(bf16::from_i64).into(),
        ScalarType::Float => values.mapv(f32::from_i64).into(),
        ScalarType::Double => values.mapv(f64::from_i64).into(),
        ScalarType::Bool => values.mapv(bool::from_i64).into(),
    }
}

fn cast_array<T: Element>(x: &ArcArray<T, IxDyn>, scalar_type: ScalarType) -> NativeTensor {
    match scalar_type {
        ScalarType::Byte => x.mapv(|v| v.convert::<u8>()).into(),
        ScalarType::Char => x.mapv(|v| v.convert::<i8>()).into(),
        ScalarType::Short => x.mapv(|v| v.convert::<i16>()).into(),
        ScalarType::Int => x.mapv(|v| v.convert::<i32>()).into(),
        ScalarType::Long => x.mapv(|v| v.convert::<i64>()).into(),
        ScalarType::Half => x.mapv(|v| v.convert::<f16>()).into(),
        ScalarType::BFloat16 => x.mapv(|v| v.convert::<bf16>()).into(),
        ScalarType::Float => x.mapv(|v| v.convert::<f32>()).into(),
        ScalarType::Double => x.mapv(|v| v.convert::<f64>()).into(),
        ScalarType::Bool => x.mapv(|v| v.convert::<bool>()).into(),
    }
}

fn from_blob_typed<T: Element>(blob: &[u8], shape: &[usize]) -> EngineResult<NativeTensor>
where
    NativeTensor: From<ArrayD<T>>,
{
    let values = T::read_blob(blob);
    Ok(ArrayD::from_shape_vec(IxDyn(shape), values)?.into())
}

impl NativeTensor {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            NativeTensor::Byte(_) => ScalarType::Byte,
            NativeTensor::Char(_) => ScalarType::Char,
            NativeTensor::Short(_) => ScalarType::Short,
            NativeTensor::Int(_) => ScalarType::Int,
            NativeTensor::Long(_) => ScalarType::Long,
            NativeTensor::Half(_) => ScalarType::Half,
            NativeTensor::BFloat16(_) => ScalarType::BFloat16,
            NativeTensor::Float(_) => ScalarType::Float,
            NativeTensor::Double(_) => ScalarType::Double,
            NativeTensor::Bool(_) => ScalarType::Bool,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        with_native!(self, x => x.shape().to_vec())
    }

    pub fn rank(&self) -> usize {
        with_native!(self, x => x.ndim())
    }

    pub fn len(&self) -> usize {
        with_native!(self, x => x.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cast(&self, scalar_type: ScalarType) -> NativeTensor {
        if self.scalar_type() == scalar_type {
            return self.clone();
        }
        with_native!(self, x => cast_array(x, scalar_type))
    }

    pub fn to_f64_array(&self) -> ArrayD<f64> {
        with_native!(self, x => x.mapv(Element::to_f64))
    }

    pub fn to_i64_array(&self) -> ArrayD<i64> {
        with_native!(self, x => x.mapv(Element::to_i64))
    }

    pub fn from_blob(blob: &[u8], shape: &[usize], scalar_type: ScalarType) -> EngineResult<Self> {
        let expected = shape.iter().product::<usize>() * scalar_type.bits() / 8;
        if blob.len() != expected {
            return Err(EngineError::BlobSize {
                expected,
                got: blob.len(),
            });
        }
        match scalar_type {
            ScalarType::Byte => from_blob_typed::<u8>(blob, shape),
            ScalarType::Char => from_blob_typed::<i8>(blob, shape),
            ScalarType::Short => from_blob_typed::<i16>(blob, shape),
            ScalarType::Int => from_blob_typed::<i32>(blob, shape),
            ScalarType::Long => from_blob_typed::<i64>(blob, shape),
            ScalarType::Half => from_blob_typed::<f16>(blob, shape),
            ScalarType::BFloat16 => from_blob_typed::<bf16>(blob, shape),
            ScalarType::Float => from_blob_typed::<f32>(blob, shape),
            ScalarType::Double => from_blob_typed::<f64>(blob, shape),
            ScalarType::Bool => from_blob_typed::<bool>(blob, shape),
        }
    }

    /// Row-major bytes of the first `limit` elements.
    pub fn to_blob(&self, limit: Option<usize>) -> Vec<u8> {
        with_native!(self, x => {
            let count = limit.map_or(x.len(), |l| l.min(x.len()));
            let values: Vec<_> = x.iter().take(count).copied().collect();
            let mut out = Vec::with_capacity(count * Self::element_size(self.scalar_type()));
            Element::write_blob(values.as_slice(), &mut out);
            out
        })
    }

    fn element_size(scalar_type: ScalarType) -> usize {
        scalar_type.bits() / 8
    }
}
