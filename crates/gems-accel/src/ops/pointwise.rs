//! Pointwise launchers: unary math, activations, predicates and broadcasting
//! binary arithmetic.

use crate::autotune::numel_bucket;
use crate::context::Gems;
use crate::dtype::{Element, FloatElement, IntegerElement, NumElement, SignedElement};
use crate::error::{GemsError, Result};
use crate::index::{broadcast_shapes, StridedIndexer};
use crate::kernels::elementwise::{
    add_scaled, broadcast_unit, gelu as gelu_fn, gelu_tanh, map_unit, relu as relu_fn, rsqrt as rsqrt_fn,
    sigmoid as sigmoid_fn, silu as silu_fn, sub_scaled, triu_unit, zip_unit, GeluApproximate,
};
use crate::tensor::Tensor;

use super::{check_devices, tuned_launch};

fn unary<A, B, F>(gems: &Gems, op: &'static str, x: &Tensor<A>, f: F) -> Result<Tensor<B>>
where
    A: Element,
    B: Element,
    F: Fn(A) -> B + Sync,
{
    gems.check_device(x)?;
    let mut out = gems.alloc::<B>(x.numel())?;
    let src = x.as_slice();
    let key = (op, numel_bucket(x.numel()));
    tuned_launch(gems, &gems.tune_cache().pointwise, key, out.as_mut_slice(), 1, |cfg, pid, block| {
        map_unit(pid, block, src, cfg.block_size, &f)
    })?;
    Ok(gems.wrap(out, x.shape().to_vec()))
}

fn binary<T, F>(gems: &Gems, op: &'static str, a: &Tensor<T>, b: &Tensor<T>, f: F) -> Result<Tensor<T>>
where
    T: Element,
    F: Fn(T, T) -> T + Sync,
{
    check_devices(gems, &[a, b])?;
    let shape = broadcast_shapes(a.shape(), b.shape())?;
    let numel = shape.iter().product();
    let mut out = gems.alloc::<T>(numel)?;
    let (lhs, rhs) = (a.as_slice(), b.as_slice());
    let key = (op, numel_bucket(numel));
    let tuner = &gems.tune_cache().pointwise;
    if a.shape() == b.shape() {
        tuned_launch(gems, tuner, key, out.as_mut_slice(), 1, |cfg, pid, block| {
            zip_unit(pid, block, lhs, rhs, cfg.block_size, &f)
        })?;
    } else {
        let ai = StridedIndexer::broadcast(a.shape(), &shape);
        let bi = StridedIndexer::broadcast(b.shape(), &shape);
        tuned_launch(gems, tuner, key, out.as_mut_slice(), 1, |cfg, pid, block| {
            broadcast_unit(pid, block, lhs, &ai, rhs, &bi, cfg.block_size, &f)
        })?;
    }
    Ok(gems.wrap(out, shape))
}

/// Element-wise `e^x`.
pub fn exp<T: FloatElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS EXP");
    unary(gems, "exp", x, T::exp)
}

/// Element-wise `e^x` written into `out`.
///
/// `out` must match `x` in shape and device. Its buffer is written in place
/// when no other tensor shares it; otherwise `out` is rebound to a fresh
/// buffer and the tensors sharing the old one are left untouched.
pub fn exp_out<T: FloatElement>(gems: &Gems, x: &Tensor<T>, out: &mut Tensor<T>) -> Result<()> {
    log::debug!("GEMS EXP_OUT");
    gems.check_device(x)?;
    gems.check_device(out)?;
    if out.shape() != x.shape() {
        return Err(GemsError::InvalidShape {
            expected: x.shape().to_vec(),
            actual: out.shape().to_vec(),
        });
    }
    let src = x.as_slice();
    let key = ("exp", numel_bucket(x.numel()));
    match out.storage_mut() {
        Some(dst) => tuned_launch(gems, &gems.tune_cache().pointwise, key, dst, 1, |cfg, pid, block| {
            map_unit(pid, block, src, cfg.block_size, T::exp)
        }),
        None => {
            *out = exp(gems, x)?;
            Ok(())
        }
    }
}

/// Element-wise sine.
pub fn sin<T: FloatElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS SIN");
    unary(gems, "sin", x, T::sin)
}

/// Element-wise cosine.
pub fn cos<T: FloatElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS COS");
    unary(gems, "cos", x, T::cos)
}

/// Element-wise hyperbolic tangent.
pub fn tanh<T: FloatElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS TANH");
    unary(gems, "tanh", x, T::tanh)
}

/// Element-wise `1 / x`.
pub fn reciprocal<T: FloatElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS RECIPROCAL");
    unary(gems, "reciprocal", x, T::recip)
}

/// Element-wise `1 / sqrt(x)`.
pub fn rsqrt<T: FloatElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS RSQRT");
    unary(gems, "rsqrt", x, rsqrt_fn)
}

/// Element-wise `max(x, 0)`.
pub fn relu<T: FloatElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS RELU");
    unary(gems, "relu", x, relu_fn)
}

/// Element-wise logistic function.
pub fn sigmoid<T: FloatElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS SIGMOID");
    unary(gems, "sigmoid", x, sigmoid_fn)
}

/// Element-wise `x * sigmoid(x)`.
pub fn silu<T: FloatElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS SILU");
    unary(gems, "silu", x, silu_fn)
}

/// Gaussian error linear unit, exact or tanh-approximated.
pub fn gelu<T: FloatElement>(gems: &Gems, x: &Tensor<T>, approximate: GeluApproximate) -> Result<Tensor<T>> {
    log::debug!("GEMS GELU");
    match approximate {
        GeluApproximate::None => unary(gems, "gelu", x, gelu_fn),
        GeluApproximate::Tanh => unary(gems, "gelu_tanh", x, gelu_tanh),
    }
}

/// Element-wise absolute value.
pub fn abs<T: SignedElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS ABS");
    unary(gems, "abs", x, |v: T| v.wrapping_abs())
}

/// Element-wise negation.
pub fn neg<T: SignedElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS NEG");
    unary(gems, "neg", x, |v: T| v.wrapping_neg())
}

/// Bitwise complement; logical not for `bool`.
pub fn bitwise_not<T: IntegerElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS BITWISE NOT");
    unary(gems, "bitwise_not", x, |v: T| !v)
}

/// Whether each element is positive or negative infinity.
pub fn isinf<T: FloatElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<bool>> {
    log::debug!("GEMS ISINF");
    unary(gems, "isinf", x, T::is_infinite)
}

/// Whether each element is NaN.
pub fn isnan<T: FloatElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<bool>> {
    log::debug!("GEMS ISNAN");
    unary(gems, "isnan", x, T::is_nan)
}

/// `a + alpha * b` with broadcasting.
pub fn add<T: NumElement>(gems: &Gems, a: &Tensor<T>, b: &Tensor<T>, alpha: T) -> Result<Tensor<T>> {
    log::debug!("GEMS ADD");
    binary(gems, "add", a, b, move |x, y| add_scaled(x, y, alpha))
}

/// `a - alpha * b` with broadcasting.
pub fn sub<T: NumElement>(gems: &Gems, a: &Tensor<T>, b: &Tensor<T>, alpha: T) -> Result<Tensor<T>> {
    log::debug!("GEMS SUB");
    binary(gems, "sub", a, b, move |x, y| sub_scaled(x, y, alpha))
}

/// `a * b` with broadcasting.
pub fn mul<T: NumElement>(gems: &Gems, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS MUL");
    binary(gems, "mul", a, b, T::wrapping_mul)
}

/// True division `a / b` with broadcasting.
pub fn div<T: FloatElement>(gems: &Gems, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS DIV");
    binary(gems, "div", a, b, |x, y| x / y)
}

/// `a ^ b` with broadcasting.
pub fn pow_tensor_tensor<T: FloatElement>(gems: &Gems, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS POW_TENSOR_TENSOR");
    binary(gems, "pow_tensor_tensor", a, b, T::powf)
}

/// `x + alpha * other` for a scalar `other`.
pub fn add_scalar<T: NumElement>(gems: &Gems, x: &Tensor<T>, other: T, alpha: T) -> Result<Tensor<T>> {
    log::debug!("GEMS ADD_SCALAR");
    unary(gems, "add_scalar", x, move |v| add_scaled(v, other, alpha))
}

/// `x * other` for a scalar `other`.
pub fn mul_scalar<T: NumElement>(gems: &Gems, x: &Tensor<T>, other: T) -> Result<Tensor<T>> {
    log::debug!("GEMS MUL_SCALAR");
    unary(gems, "mul_scalar", x, move |v: T| v.wrapping_mul(other))
}

/// `x ^ exponent`.
pub fn pow_tensor_scalar<T: FloatElement>(gems: &Gems, x: &Tensor<T>, exponent: T) -> Result<Tensor<T>> {
    log::debug!("GEMS POW_TENSOR_SCALAR");
    unary(gems, "pow_tensor_scalar", x, move |v: T| v.powf(exponent))
}

/// `base ^ x`.
pub fn pow_scalar<T: FloatElement>(gems: &Gems, base: T, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS POW_SCALAR");
    unary(gems, "pow_scalar", x, move |v: T| base.powf(v))
}

/// Upper triangle of the matrices in the last two dimensions.
///
/// Elements below the `diagonal`-th diagonal are zeroed; `diagonal = 0` keeps
/// the main diagonal, positive values move it up, negative values down.
pub fn triu<T: NumElement>(gems: &Gems, x: &Tensor<T>, diagonal: i64) -> Result<Tensor<T>> {
    log::debug!("GEMS TRIU");
    gems.check_device(x)?;
    let &[.., rows, cols] = x.shape() else {
        return Err(GemsError::contract(format!(
            "triu needs at least 2 dimensions, got shape {:?}",
            x.shape()
        )));
    };
    let mut out = gems.alloc::<T>(x.numel())?;
    let src = x.as_slice();
    let key = ("triu", numel_bucket(x.numel()));
    tuned_launch(gems, &gems.tune_cache().pointwise, key, out.as_mut_slice(), 1, |cfg, pid, block| {
        triu_unit(pid, block, src, rows, cols, diagonal, cfg.block_size)
    })?;
    Ok(gems.wrap(out, x.shape().to_vec()))
}
