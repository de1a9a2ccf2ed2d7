//! Element types accepted by the operator kernels.

use std::fmt;
use std::ops::Not;

use num_traits::{Float, NumOps, Signed};

/// Runtime tag of a tensor's element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 8-bit unsigned integer
    U8,
    /// Boolean
    Bool,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
            DType::U8 | DType::Bool => 1,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U8 => "uint8",
            DType::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// A value that can be stored in a [`Tensor`](crate::Tensor).
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Runtime tag of this type.
    const DTYPE: DType;
}

/// Element supporting `+ - * /`.
///
/// Kernels accumulate through the `wrapping_*` methods: integers wrap around
/// on overflow, floats use plain IEEE arithmetic.
pub trait NumElement: Element + NumOps + PartialOrd {
    /// Additive identity.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;

    /// `self + rhs`, wrapping for integers.
    fn wrapping_add(self, rhs: Self) -> Self;
    /// `self - rhs`, wrapping for integers.
    fn wrapping_sub(self, rhs: Self) -> Self;
    /// `self * rhs`, wrapping for integers.
    fn wrapping_mul(self, rhs: Self) -> Self;
}

/// Element with a sign (`abs`, `neg`).
pub trait SignedElement: NumElement + Signed {
    /// `-self`; the most negative integer maps to itself.
    fn wrapping_neg(self) -> Self;
    /// `|self|`; the most negative integer maps to itself.
    fn wrapping_abs(self) -> Self;
}

/// Floating-point element.
pub trait FloatElement: NumElement + Float {
    /// Lossy conversion from `f64`.
    fn from_f64(v: f64) -> Self;
    /// Widening conversion to `f64`.
    fn as_f64(self) -> f64;
}

/// Element supporting bitwise (or, for `bool`, logical) negation.
pub trait IntegerElement: Element + Not<Output = Self> {}

macro_rules! impl_element {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(impl Element for $ty {
            const DTYPE: DType = DType::$tag;
        })*
    };
}

macro_rules! impl_num_float {
    ($($ty:ty),*) => {
        $(impl NumElement for $ty {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;

            #[inline(always)]
            fn wrapping_add(self, rhs: Self) -> Self {
                self + rhs
            }

            #[inline(always)]
            fn wrapping_sub(self, rhs: Self) -> Self {
                self - rhs
            }

            #[inline(always)]
            fn wrapping_mul(self, rhs: Self) -> Self {
                self * rhs
            }
        }

        impl SignedElement for $ty {
            #[inline(always)]
            fn wrapping_neg(self) -> Self {
                -self
            }

            #[inline(always)]
            fn wrapping_abs(self) -> Self {
                self.abs()
            }
        })*
    };
}

// inherent `wrapping_*` methods take precedence over the trait's inside these impls
macro_rules! impl_num_int {
    ($($ty:ty),*) => {
        $(impl NumElement for $ty {
            const ZERO: Self = 0;
            const ONE: Self = 1;

            #[inline(always)]
            fn wrapping_add(self, rhs: Self) -> Self {
                <$ty>::wrapping_add(self, rhs)
            }

            #[inline(always)]
            fn wrapping_sub(self, rhs: Self) -> Self {
                <$ty>::wrapping_sub(self, rhs)
            }

            #[inline(always)]
            fn wrapping_mul(self, rhs: Self) -> Self {
                <$ty>::wrapping_mul(self, rhs)
            }
        })*
    };
}

macro_rules! impl_signed_int {
    ($($ty:ty),*) => {
        $(impl SignedElement for $ty {
            #[inline(always)]
            fn wrapping_neg(self) -> Self {
                <$ty>::wrapping_neg(self)
            }

            #[inline(always)]
            fn wrapping_abs(self) -> Self {
                <$ty>::wrapping_abs(self)
            }
        })*
    };
}

impl_element!(f32 => F32, f64 => F64, i32 => I32, i64 => I64, u8 => U8, bool => Bool);
impl_num_float!(f32, f64);
impl_num_int!(i32, i64, u8);
impl_signed_int!(i32, i64);

impl IntegerElement for i32 {}
impl IntegerElement for i64 {}
impl IntegerElement for u8 {}
impl IntegerElement for bool {}

impl FloatElement for f32 {
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl FloatElement for f64 {
    fn from_f64(v: f64) -> Self {
        v
    }

    fn as_f64(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_tags() {
        assert_eq!(f32::DTYPE, DType::F32);
        assert_eq!(bool::DTYPE, DType::Bool);
        assert_eq!(DType::F64.size_in_bytes(), 8);
        assert_eq!(DType::I32.to_string(), "int32");
    }

    #[test]
    fn test_integer_not() {
        assert_eq!(!5i32, -6);
        assert!(!false);
        assert_eq!(<u8 as NumElement>::ONE, 1);
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        assert_eq!(NumElement::wrapping_add(i32::MAX, 1), i32::MIN);
        assert_eq!(NumElement::wrapping_add(200u8, 100), 44);
        assert_eq!(NumElement::wrapping_sub(0u8, 1), 255);
        assert_eq!(NumElement::wrapping_mul(i64::MAX, 2), -2);
        assert_eq!(SignedElement::wrapping_neg(i32::MIN), i32::MIN);
        assert_eq!(SignedElement::wrapping_abs(i64::MIN), i64::MIN);
    }

    #[test]
    fn test_float_arithmetic_is_plain() {
        assert_eq!(NumElement::wrapping_add(f32::MAX, f32::MAX), f32::INFINITY);
        assert_eq!(NumElement::wrapping_mul(1.5f64, 2.0), 3.0);
        assert_eq!(SignedElement::wrapping_abs(-2.0f32), 2.0);
    }
}
