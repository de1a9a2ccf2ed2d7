//! Host-side launchers of the accelerated operators.
//!
//! Every launcher follows the same sequence: validate the call contract
//! (nothing is allocated when this fails), derive shapes, allocate the
//! destination on the accelerator, select a launch configuration through the
//! family's autotuner and run the kernel body over the resulting grid.

use std::fmt::Debug;
use std::hash::Hash;

use crate::autotune::Autotuner;
use crate::context::Gems;
use crate::dtype::Element;
use crate::error::{GemsError, Result};
use crate::launch::LaunchConfig;
use crate::tensor::Tensor;

pub mod matmul;
pub mod normalization;
pub mod pointwise;
pub mod random;
pub mod reduction;
pub mod resize;

/// Autotune on `key` and launch `kernel` over `dst`.
///
/// One work item covers `item_len` destination elements (1 for flat kernels,
/// a row for row-wise ones); a unit owns `block_size` items. The kernel gets
/// the chosen configuration, its program id and its block. An empty
/// destination launches nothing and leaves the cache untouched.
pub(crate) fn tuned_launch<K, T, F>(
    gems: &Gems,
    tuner: &Autotuner<K>,
    key: K,
    dst: &mut [T],
    item_len: usize,
    kernel: F,
) -> Result<()>
where
    K: Eq + Hash + Clone + Debug,
    T: Send,
    F: Fn(LaunchConfig, usize, &mut [T]) + Sync,
{
    if dst.is_empty() {
        return Ok(());
    }
    let run = |dst: &mut [T], cfg: LaunchConfig| {
        let unit_len = cfg.block_size * item_len;
        gems.launch(dst, LaunchConfig::new(unit_len, cfg.lanes), |pid, block| kernel(cfg, pid, block))
    };
    let cfg = tuner.select(key, |cfg| run(&mut *dst, cfg))?;
    run(dst, cfg)
}

/// Validate that every tensor lives on the context device.
pub(crate) fn check_devices<T: Element>(gems: &Gems, tensors: &[&Tensor<T>]) -> Result<()> {
    tensors.iter().try_for_each(|t| gems.check_device(t))
}

/// Wrap a possibly negative dimension into `[0, ndim)`.
pub(crate) fn wrap_dim(dim: isize, ndim: usize) -> Result<usize> {
    let rank = ndim.max(1) as isize;
    let wrapped = if dim < 0 { dim + rank } else { dim };
    if !(0..rank).contains(&wrapped) {
        return Err(GemsError::contract(format!(
            "dimension {dim} out of range for a tensor of rank {ndim}"
        )));
    }
    Ok(wrapped as usize)
}

/// Split `shape` around `dim` into `(outer, dim_len, inner)`.
pub(crate) fn split_at_dim(shape: &[usize], dim: usize) -> (usize, usize, usize) {
    if shape.is_empty() {
        return (1, 1, 1);
    }
    let outer = shape[..dim].iter().product();
    let inner = shape[dim + 1..].iter().product();
    (outer, shape[dim], inner)
}
