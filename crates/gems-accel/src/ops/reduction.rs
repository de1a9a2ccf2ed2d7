//! Reduction and scan launchers.

use crate::allocator::Storage;
use crate::autotune::numel_bucket;
use crate::context::Gems;
use crate::dtype::{Element, FloatElement, NumElement};
use crate::error::{GemsError, Result};
use crate::kernels::reduction::{cumsum_unit, max_propagate, min_propagate, partial_unit};
use crate::launch::LaunchConfig;
use crate::tensor::Tensor;

use super::{split_at_dim, tuned_launch, wrap_dim};

/// Two-phase reduction; `None` for an empty tensor.
///
/// Each unit folds `block_size` elements into one partial on the accelerator,
/// then the partials are combined on the host.
fn reduce<T, F>(gems: &Gems, op: &'static str, x: &Tensor<T>, combine: F) -> Result<Option<T>>
where
    T: Element,
    F: Fn(T, T) -> T + Sync,
{
    gems.check_device(x)?;
    let src = x.as_slice();
    if src.is_empty() {
        return Ok(None);
    }
    let run = |cfg: LaunchConfig| -> Result<Storage<T>> {
        let mut partials = gems.alloc::<T>(cfg.grid(src.len()))?;
        let slots = LaunchConfig::new(1, cfg.lanes);
        gems.launch(partials.as_mut_slice(), slots, |pid, slot| {
            partial_unit(pid, slot, src, cfg.block_size, &combine)
        })?;
        Ok(partials)
    };
    let key = (op, numel_bucket(src.len()));
    let cfg = gems.tune_cache().reduction.select(key, |cfg| run(cfg).map(drop))?;
    let partials = run(cfg)?;
    Ok(partials.as_slice().iter().copied().reduce(&combine))
}

fn scalar_tensor<T: Element>(gems: &Gems, value: T) -> Result<Tensor<T>> {
    let mut out = gems.alloc::<T>(1)?;
    out.as_mut_slice()[0] = value;
    Ok(gems.wrap(out, Vec::new()))
}

/// Sum of all elements as a 0-dimensional tensor; zero when empty.
pub fn sum<T: NumElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS SUM");
    let total = reduce(gems, "sum", x, T::wrapping_add)?.unwrap_or(T::ZERO);
    scalar_tensor(gems, total)
}

/// Mean of all elements as a 0-dimensional tensor; NaN when empty.
pub fn mean<T: FloatElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS MEAN");
    let value = match reduce(gems, "sum", x, |a, b| a + b)? {
        Some(total) => total / T::from_f64(x.numel() as f64),
        None => T::nan(),
    };
    scalar_tensor(gems, value)
}

/// Smallest element; NaN if any element is NaN.
///
/// # Errors
///
/// An empty tensor has no minimum and is a contract violation.
pub fn amin<T: NumElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS AMIN");
    let value = reduce(gems, "amin", x, min_propagate)?
        .ok_or_else(|| GemsError::contract("amin of an empty tensor has no identity"))?;
    scalar_tensor(gems, value)
}

/// Largest element; NaN if any element is NaN.
///
/// # Errors
///
/// An empty tensor has no maximum and is a contract violation.
pub fn amax<T: NumElement>(gems: &Gems, x: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS AMAX");
    let value = reduce(gems, "amax", x, max_propagate)?
        .ok_or_else(|| GemsError::contract("amax of an empty tensor has no identity"))?;
    scalar_tensor(gems, value)
}

/// Inclusive cumulative sum along `dim`; negative dims count from the end.
pub fn cumsum<T: NumElement>(gems: &Gems, x: &Tensor<T>, dim: isize) -> Result<Tensor<T>> {
    log::debug!("GEMS CUMSUM");
    gems.check_device(x)?;
    let dim = wrap_dim(dim, x.ndim())?;
    let (outer, dim_len, inner) = split_at_dim(x.shape(), dim);
    let mut out = gems.alloc::<T>(x.numel())?;
    let src = x.as_slice();
    let key = ("cumsum", outer, dim_len * inner);
    tuned_launch(
        gems,
        &gems.tune_cache().rowwise,
        key,
        out.as_mut_slice(),
        dim_len * inner,
        |cfg, pid, block| cumsum_unit(pid, block, src, dim_len, inner, cfg.block_size),
    )?;
    Ok(gems.wrap(out, x.shape().to_vec()))
}
