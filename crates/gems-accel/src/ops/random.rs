//! Random launchers.

use crate::autotune::numel_bucket;
use crate::context::Gems;
use crate::dtype::FloatElement;
use crate::error::{GemsError, Result};
use crate::kernels::dropout::dropout_unit;
use crate::launch::LaunchConfig;
use crate::tensor::Tensor;

/// Dropout returning the output and the keep mask.
///
/// Each element is zeroed with probability `p` and kept elements are scaled
/// by `1 / (1 - p)`. With `train == Some(false)` the input is returned
/// unchanged with an all-true mask. Every training call consumes `numel`
/// counters of the context's random stream, so repeated calls differ while
/// a fixed `GEMS_SEED` makes a sequence of calls reproducible.
pub fn native_dropout<T: FloatElement>(
    gems: &Gems,
    x: &Tensor<T>,
    p: f64,
    train: Option<bool>,
) -> Result<(Tensor<T>, Tensor<bool>)> {
    log::debug!("GEMS NATIVE DROPOUT");
    gems.check_device(x)?;
    if !(0.0..=1.0).contains(&p) {
        return Err(GemsError::contract(format!(
            "dropout probability has to be between 0 and 1, but got {p}"
        )));
    }
    let numel = x.numel();
    let mut mask = gems.alloc::<bool>(numel)?;

    if train == Some(false) {
        mask.as_mut_slice().fill(true);
        let out = gems.upload(x)?;
        return Ok((out, gems.wrap(mask, x.shape().to_vec())));
    }

    let mut out = gems.alloc::<T>(numel)?;
    if numel > 0 {
        let stream = gems.rng_stream(numel);
        let scale = if p < 1.0 { T::from_f64(1.0 / (1.0 - p)) } else { T::zero() };
        let src = x.as_slice();
        let run = |cfg: LaunchConfig, out: &mut [T], mask: &mut [bool]| {
            gems.launch_pair(out, cfg.block_size, mask, cfg.block_size, cfg.lanes, |pid, o, m| {
                dropout_unit(pid, o, m, src, p as f32, scale, stream, cfg.block_size)
            })
        };
        let key = ("native_dropout", numel_bucket(numel));
        let cfg = gems
            .tune_cache()
            .pointwise
            .select(key, |cfg| run(cfg, out.as_mut_slice(), mask.as_mut_slice()))?;
        run(cfg, out.as_mut_slice(), mask.as_mut_slice())?;
    }
    Ok((gems.wrap(out, x.shape().to_vec()), gems.wrap(mask, x.shape().to_vec())))
}
