use super::{Bridge, ScopedRef};
use crate::capability::OpName;
use crate::dtype::DType;
use crate::engine::{BinaryKind, ScalarType, UnaryKind};
use crate::error::Result;
use crate::tensor::{LogicalTensor, TensorSpec};

macro_rules! unary_ops {
    ($($(#[$meta:meta])* $name:ident => $op:ident, $kind:ident;)*) => {
        impl Bridge {
            $(
                $(#[$meta])*
                pub fn $name(&self, out: &TensorSpec, t: &LogicalTensor) -> Result<LogicalTensor> {
                    self.unary_op(OpName::$op, UnaryKind::$kind, out, t)
                }
            )*
        }
    };
}

macro_rules! binary_ops {
    ($($(#[$meta:meta])* $name:ident => $op:ident, $kind:ident;)*) => {
        impl Bridge {
            $(
                $(#[$meta])*
                pub fn $name(&self, out: &TensorSpec, a: &LogicalTensor, b: &LogicalTensor) -> Result<LogicalTensor> {
                    self.binary_op(OpName::$op, BinaryKind::$kind, out, a, b)
                }
            )*
        }
    };
}

unary_ops! {
    exp => Exp, Exp;
    expm1 => Expm1, Expm1;
    log => Log, Log;
    log1p => Log1p, Log1p;
    sigmoid => Sigmoid, Sigmoid;
    sin => Sin, Sin;
    cos => Cos, Cos;
    tan => Tan, Tan;
    sinh => Sinh, Sinh;
    cosh => Cosh, Cosh;
    tanh => Tanh, Tanh;
    asin => Asin, Asin;
    acos => Acos, Acos;
    atan => Atan, Atan;
    asinh => Asinh, Asinh;
    acosh => Acosh, Acosh;
    atanh => Atanh, Atanh;
    sqrt => Sqrt, Sqrt;
    rsqrt => Rsqrt, Rsqrt;
    cbrt => Cbrt, Cbrt;
    erf => Erf, Erf;
    erfc => Erfc, Erfc;
    abs => Abs, Abs;
    negate => Negate, Neg;
    sign => Sign, Sign;
    floor => Floor, Floor;
    ceil => Ceil, Ceil;
    /// Halves round to the nearest even value.
    round => Round, Round;
    bitwise_not => BitwiseNot, BitwiseNot;
    logical_not => LogicalNot, LogicalNot;
    is_nan => IsNan, IsNan;
    is_infinity => IsInfinity, IsInf;
}

binary_ops! {
    add => Add, Add;
    subtract => Subtract, Sub;
    multiply => Multiply, Mul;
    divide => Divide, Div;
    pow => Pow, Pow;
    /// Takes the sign of the dividend.
    remainder => Remainder, Fmod;
    /// Integer division truncating toward zero.
    quotient => Quotient, TruncDiv;
    atan2 => Atan2, Atan2;
    min => Min, Minimum;
    max => Max, Maximum;
    bitwise_and => BitwiseAnd, BitwiseAnd;
    bitwise_or => BitwiseOr, BitwiseOr;
    bitwise_xor => BitwiseXor, BitwiseXor;
    left_shift => LeftShift, LeftShift;
    right_shift => RightShift, RightShift;
    equal => Equal, Eq;
    not_equal => NotEqual, Ne;
    greater => Greater, Gt;
    less => Less, Lt;
    greater_equal => GreaterEqual, Ge;
    less_equal => LessEqual, Le;
    logical_and => LogicalAnd, LogicalAnd;
    logical_or => LogicalOr, LogicalOr;
    logical_xor => LogicalXor, LogicalXor;
}

impl Bridge {
    fn unary_op(&self, op: OpName, kind: UnaryKind, out: &TensorSpec, t: &LogicalTensor) -> Result<LogicalTensor> {
        self.gate(op)?;
        self.out_type(out)?;
        let x = self.operand(t)?;
        let r = self.scoped(self.engine.unary(kind, x.get())?);
        self.finish(out, r)
    }

    fn binary_op(
        &self,
        op: OpName,
        kind: BinaryKind,
        out: &TensorSpec,
        a: &LogicalTensor,
        b: &LogicalTensor,
    ) -> Result<LogicalTensor> {
        self.gate(op)?;
        self.out_type(out)?;
        let (x, y) = (self.operand(a)?, self.operand(b)?);
        let (x, y) = self.widen_lone_byte(a.dtype(), x, b.dtype(), y)?;
        let (x, y) = if kind.is_bitwise() {
            self.wider_first(x, y)?
        } else {
            (x, y)
        };
        let r = self.scoped(self.engine.binary(kind, x.get(), y.get())?);
        self.finish(out, r)
    }

    /// The engine has no unsigned type above 8 bits, so a `u8` operand meeting
    /// any other type is widened to `i16` before the call.
    fn widen_lone_byte<'a>(
        &'a self,
        a: DType,
        x: ScopedRef<'a>,
        b: DType,
        y: ScopedRef<'a>,
    ) -> Result<(ScopedRef<'a>, ScopedRef<'a>)> {
        match (a, b) {
            (DType::U8, DType::U8) => Ok((x, y)),
            (DType::U8, _) => Ok((self.cast(x, ScalarType::Short)?, y)),
            (_, DType::U8) => Ok((x, self.cast(y, ScalarType::Short)?)),
            _ => Ok((x, y)),
        }
    }

    /// Bitwise kernels require the first operand to be at least as wide as the second.
    fn wider_first<'a>(&'a self, x: ScopedRef<'a>, y: ScopedRef<'a>) -> Result<(ScopedRef<'a>, ScopedRef<'a>)> {
        let x_bits = self.engine.scalar_type(x.get())?.bits();
        let y_bits = self.engine.scalar_type(y.get())?.bits();
        Ok(if y_bits > x_bits { (y, x) } else { (x, y) })
    }

    /// Picks from `on_true` where `pred` is non-zero, else from `on_false`.
    pub fn select(
        &self,
        out: &TensorSpec,
        pred: &LogicalTensor,
        on_true: &LogicalTensor,
        on_false: &LogicalTensor,
    ) -> Result<LogicalTensor> {
        self.gate(OpName::Select)?;
        let scalar_type = self.out_type(out)?;
        let condition = self.operand_as(pred, ScalarType::Bool)?;
        let a = self.operand_as(on_true, scalar_type)?;
        let b = self.operand_as(on_false, scalar_type)?;
        let r = self.scoped(self.engine.where_self(condition.get(), a.get(), b.get())?);
        self.finish(out, r)
    }

    pub fn clip(&self, out: &TensorSpec, t: &LogicalTensor, min: &LogicalTensor, max: &LogicalTensor) -> Result<LogicalTensor> {
        self.gate(OpName::Clip)?;
        let scalar_type = self.out_type(out)?;
        let x = self.operand_as(t, scalar_type)?;
        let lo = self.operand_as(min, scalar_type)?;
        let hi = self.operand_as(max, scalar_type)?;
        let r = self.scoped(self.engine.clamp(x.get(), lo.get(), hi.get())?);
        self.finish(out, r)
    }
}
