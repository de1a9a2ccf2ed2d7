//! Row-wise launchers: softmax and layer normalisation.

use crate::context::Gems;
use crate::dtype::FloatElement;
use crate::error::{GemsError, Result};
use crate::kernels::normalization::{layer_norm_apply_unit, layer_norm_stats_unit, softmax_unit};
use crate::launch::LaunchConfig;
use crate::tensor::Tensor;

use super::{split_at_dim, tuned_launch, wrap_dim};

/// Softmax along `dim`, subtracting the maximum before exponentiating.
pub fn softmax<T: FloatElement>(gems: &Gems, x: &Tensor<T>, dim: isize) -> Result<Tensor<T>> {
    log::debug!("GEMS SOFTMAX");
    gems.check_device(x)?;
    let dim = wrap_dim(dim, x.ndim())?;
    let (outer, dim_len, inner) = split_at_dim(x.shape(), dim);
    let mut out = gems.alloc::<T>(x.numel())?;
    let src = x.as_slice();
    let key = ("softmax", outer, dim_len * inner);
    tuned_launch(
        gems,
        &gems.tune_cache().rowwise,
        key,
        out.as_mut_slice(),
        dim_len * inner,
        |cfg, pid, block| softmax_unit(pid, block, src, dim_len, inner, cfg.block_size),
    )?;
    Ok(gems.wrap(out, x.shape().to_vec()))
}

fn check_affine<T: FloatElement>(gems: &Gems, param: Option<&Tensor<T>>, normalized_shape: &[usize]) -> Result<()> {
    if let Some(p) = param {
        gems.check_device(p)?;
        if p.shape() != normalized_shape {
            return Err(GemsError::InvalidShape {
                expected: normalized_shape.to_vec(),
                actual: p.shape().to_vec(),
            });
        }
    }
    Ok(())
}

/// Layer normalisation over the trailing `normalized_shape` dimensions.
///
/// Returns `(out, mean, rstd)`, where `mean` and `rstd` have the shape of the
/// leading dimensions and `rstd = 1 / sqrt(var + eps)` with the biased variance.
/// Statistics and normalisation run as two launches.
pub fn layer_norm<T: FloatElement>(
    gems: &Gems,
    x: &Tensor<T>,
    normalized_shape: &[usize],
    weight: Option<&Tensor<T>>,
    bias: Option<&Tensor<T>>,
    eps: f64,
) -> Result<(Tensor<T>, Tensor<T>, Tensor<T>)> {
    log::debug!("GEMS LAYERNORM");
    gems.check_device(x)?;
    if !x.shape().ends_with(normalized_shape) {
        return Err(GemsError::contract(format!(
            "normalized_shape {normalized_shape:?} does not match the trailing dimensions of {:?}",
            x.shape()
        )));
    }
    check_affine(gems, weight, normalized_shape)?;
    check_affine(gems, bias, normalized_shape)?;

    let leading = x.shape()[..x.ndim() - normalized_shape.len()].to_vec();
    let rows: usize = leading.iter().product();
    let row_len: usize = normalized_shape.iter().product();
    let mut out = gems.alloc::<T>(x.numel())?;
    let mut mean = gems.alloc::<T>(rows)?;
    let mut rstd = gems.alloc::<T>(rows)?;

    if row_len == 0 {
        mean.as_mut_slice().fill(T::nan());
        rstd.as_mut_slice().fill(T::nan());
    } else if rows > 0 {
        let src = x.as_slice();
        let (w, b) = (weight.map(Tensor::as_slice), bias.map(Tensor::as_slice));
        let run = |cfg: LaunchConfig, out: &mut [T], mean: &mut [T], rstd: &mut [T]| -> Result<()> {
            let rows_per_unit = cfg.block_size;
            gems.launch_pair(mean, rows_per_unit, rstd, rows_per_unit, cfg.lanes, |pid, m, s| {
                layer_norm_stats_unit(pid, m, s, src, row_len, rows_per_unit, eps)
            })?;
            let (mean, rstd) = (&*mean, &*rstd);
            let unit = LaunchConfig::new(rows_per_unit * row_len, cfg.lanes);
            gems.launch(out, unit, |pid, block| {
                layer_norm_apply_unit(pid, block, src, mean, rstd, w, b, row_len, rows_per_unit)
            })
        };
        let key = ("layer_norm", rows, row_len);
        let cfg = gems.tune_cache().rowwise.select(key, |cfg| {
            run(cfg, out.as_mut_slice(), mean.as_mut_slice(), rstd.as_mut_slice())
        })?;
        run(cfg, out.as_mut_slice(), mean.as_mut_slice(), rstd.as_mut_slice())?;
    }

    Ok((
        gems.wrap(out, x.shape().to_vec()),
        gems.wrap(mean, leading.clone()),
        gems.wrap(rstd, leading),
    ))
}
