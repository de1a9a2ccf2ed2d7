//! Pointwise kernel bodies and the scalar functions they apply.
//!
//! Every body covers one execution unit: the flat output indices
//! `[pid * block_size, pid * block_size + dst.len())`, clipped at the end of
//! the tensor by the launcher.

use std::f64::consts::{FRAC_1_SQRT_2, FRAC_2_PI};
use std::str::FromStr;

use crate::dtype::{FloatElement, NumElement};
use crate::error::GemsError;
use crate::index::StridedIndexer;

/// Apply `f` to the unit's slice of `src`.
#[inline]
pub fn map_unit<A, B, F>(pid: usize, dst: &mut [B], src: &[A], block_size: usize, f: F)
where
    A: Copy,
    F: Fn(A) -> B,
{
    let offset = pid * block_size;
    let src = &src[offset..offset + dst.len()];
    for (out, &x) in dst.iter_mut().zip(src) {
        *out = f(x);
    }
}

/// Apply `f` to same-shape operands.
#[inline]
pub fn zip_unit<A, B, C, F>(pid: usize, dst: &mut [C], a: &[A], b: &[B], block_size: usize, f: F)
where
    A: Copy,
    B: Copy,
    F: Fn(A, B) -> C,
{
    let offset = pid * block_size;
    let end = offset + dst.len();
    for ((out, &x), &y) in dst.iter_mut().zip(&a[offset..end]).zip(&b[offset..end]) {
        *out = f(x, y);
    }
}

/// Apply `f` to operands read through broadcasting indexers.
#[allow(clippy::too_many_arguments)]
#[inline]
pub fn broadcast_unit<A, B, C, F>(
    pid: usize,
    dst: &mut [C],
    a: &[A],
    a_index: &StridedIndexer,
    b: &[B],
    b_index: &StridedIndexer,
    block_size: usize,
    f: F,
) where
    A: Copy,
    B: Copy,
    F: Fn(A, B) -> C,
{
    let offset = pid * block_size;
    for (i, out) in dst.iter_mut().enumerate() {
        let idx = offset + i;
        *out = f(a[a_index.offset(idx)], b[b_index.offset(idx)]);
    }
}

/// Upper-triangular copy over the last two dimensions.
///
/// Element `(row, col)` of every `rows x cols` matrix is kept when
/// `col - row >= diagonal` and zeroed otherwise.
pub fn triu_unit<T: NumElement>(
    pid: usize,
    dst: &mut [T],
    src: &[T],
    rows: usize,
    cols: usize,
    diagonal: i64,
    block_size: usize,
) {
    let offset = pid * block_size;
    for (i, out) in dst.iter_mut().enumerate() {
        let idx = offset + i;
        let col = (idx % cols) as i64;
        let row = (idx / cols % rows) as i64;
        *out = if col - row >= diagonal { src[idx] } else { T::ZERO };
    }
}

/// `max(x, 0)`, propagating NaN.
#[inline]
pub fn relu<T: FloatElement>(x: T) -> T {
    if x > T::zero() || x.is_nan() {
        x
    } else {
        T::zero()
    }
}

/// `1 / (1 + exp(-x))`.
#[inline]
pub fn sigmoid<T: FloatElement>(x: T) -> T {
    T::one() / (T::one() + (-x).exp())
}

/// `x * sigmoid(x)`.
#[inline]
pub fn silu<T: FloatElement>(x: T) -> T {
    x * sigmoid(x)
}

/// `1 / sqrt(x)`.
#[inline]
pub fn rsqrt<T: FloatElement>(x: T) -> T {
    x.sqrt().recip()
}

/// How `gelu` evaluates the Gaussian CDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeluApproximate {
    /// Exact, through the error function.
    #[default]
    None,
    /// The tanh approximation.
    Tanh,
}

impl FromStr for GeluApproximate {
    type Err = GemsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "tanh" => Ok(Self::Tanh),
            other => Err(GemsError::contract(format!(
                "gelu approximate must be 'none' or 'tanh', got '{other}'"
            ))),
        }
    }
}

/// `0.5 * x * (1 + erf(x / sqrt(2)))`.
#[inline]
pub fn gelu<T: FloatElement>(x: T) -> T {
    let v = x.as_f64();
    T::from_f64(0.5 * v * (1.0 + libm::erf(v * FRAC_1_SQRT_2)))
}

/// `0.5 * x * (1 + tanh(sqrt(2 / pi) * (x + 0.044715 * x^3)))`.
#[inline]
pub fn gelu_tanh<T: FloatElement>(x: T) -> T {
    let v = x.as_f64();
    let inner = FRAC_2_PI.sqrt() * (v + 0.044715 * v * v * v);
    T::from_f64(0.5 * v * (1.0 + inner.tanh()))
}

/// `a + alpha * b`.
#[inline]
pub fn add_scaled<T: NumElement>(a: T, b: T, alpha: T) -> T {
    if alpha == T::ONE {
        a.wrapping_add(b)
    } else {
        a.wrapping_add(alpha.wrapping_mul(b))
    }
}

/// `a - alpha * b`.
#[inline]
pub fn sub_scaled<T: NumElement>(a: T, b: T, alpha: T) -> T {
    if alpha == T::ONE {
        a.wrapping_sub(b)
    } else {
        a.wrapping_sub(alpha.wrapping_mul(b))
    }
}
