//! Resize launchers: nearest, nearest-exact and bilinear 2D upsampling.

use crate::allocator::Storage;
use crate::context::Gems;
use crate::dtype::{Element, FloatElement};
use crate::error::{GemsError, Result};
use crate::kernels::resize::{
    bilinear_unit, nearest_unit, reciprocal_scale, same_extent, CoordinateMap, Identity, NearestExact,
    NearestFloor, ResizeParams,
};
use crate::tensor::Tensor;

use super::tuned_launch;

/// Validate an NCHW resize request and derive the launch parameters.
///
/// Shared by every resize backend; runs before anything is allocated. The
/// returned parameters always have a `total()` that fits in `usize`.
pub(crate) fn plan(
    shape: &[usize],
    output_size: &[usize],
    scale_h: Option<f64>,
    scale_w: Option<f64>,
) -> Result<ResizeParams> {
    let &[n, c, ih, iw] = shape else {
        return Err(GemsError::contract(format!(
            "the ndim of input must be 4, got shape {shape:?}"
        )));
    };
    let &[oh, ow] = output_size else {
        return Err(GemsError::contract(format!(
            "the len of output_size must be 2, got {output_size:?}"
        )));
    };
    if oh == 0 || ow == 0 {
        return Err(GemsError::contract(format!(
            "output size must be positive, got {output_size:?}"
        )));
    }
    if ih == 0 || iw == 0 {
        return Err(GemsError::contract(format!(
            "input spatial extents must be positive, got {shape:?}"
        )));
    }
    for scale in [scale_h, scale_w].into_iter().flatten() {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(GemsError::contract(format!(
                "scale factors must be finite and positive, got {scale}"
            )));
        }
    }
    [n, c, oh, ow]
        .into_iter()
        .try_fold(1usize, usize::checked_mul)
        .ok_or_else(|| {
            GemsError::OutOfMemory(format!(
                "output [{n}, {c}, {oh}, {ow}] has more elements than fit in usize"
            ))
        })?;
    Ok(ResizeParams {
        n,
        c,
        ih,
        iw,
        oh,
        ow,
        rh: reciprocal_scale(ih, oh, scale_h),
        rw: reciprocal_scale(iw, ow, scale_w),
    })
}

fn resize_params<T: Element>(
    gems: &Gems,
    input: &Tensor<T>,
    output_size: &[usize],
    scale_h: Option<f64>,
    scale_w: Option<f64>,
) -> Result<ResizeParams> {
    gems.check_device(input)?;
    plan(input.shape(), output_size, scale_h, scale_w)
}

fn launch_nearest<T, H, W>(
    gems: &Gems,
    mode: &'static str,
    flags: [bool; 2],
    dst: &mut Storage<T>,
    src: &[T],
    params: &ResizeParams,
) -> Result<()>
where
    T: Element,
    H: CoordinateMap,
    W: CoordinateMap,
{
    let key = (mode, params.out_shape(), flags);
    tuned_launch(gems, &gems.tune_cache().resize, key, dst.as_mut_slice(), 1, |cfg, pid, block| {
        nearest_unit::<T, H, W>(pid, block, src, params, cfg.block_size)
    })
}

/// Pick the kernel variant from the same-extent flags and launch it.
fn nearest<T: Element, P: CoordinateMap>(
    gems: &Gems,
    mode: &'static str,
    input: &Tensor<T>,
    params: ResizeParams,
) -> Result<Tensor<T>> {
    let mut out = gems.alloc::<T>(params.total())?;
    let flags = [
        same_extent(params.ih, params.oh),
        same_extent(params.iw, params.ow),
    ];
    let src = input.as_slice();
    match flags {
        [true, true] => launch_nearest::<T, Identity, Identity>(gems, mode, flags, &mut out, src, &params)?,
        [true, false] => launch_nearest::<T, Identity, P>(gems, mode, flags, &mut out, src, &params)?,
        [false, true] => launch_nearest::<T, P, Identity>(gems, mode, flags, &mut out, src, &params)?,
        [false, false] => launch_nearest::<T, P, P>(gems, mode, flags, &mut out, src, &params)?,
    }
    Ok(gems.wrap(out, params.out_shape().to_vec()))
}

/// Nearest-neighbour upsampling of an `[N, C, IH, IW]` tensor to `[N, C, OH, OW]`.
///
/// Source coordinates are `min(floor(o * r), in - 1)` per axis, where `r` is
/// `1 / scale` when a scale is given and `in / out` otherwise. Rounding is
/// always down, never to the nearest pixel centre.
///
/// # Arguments
///
/// * `input` - Source tensor on the accelerator, rank 4.
/// * `output_size` - Requested `[OH, OW]`.
/// * `scale_h`, `scale_w` - Optional explicit scale factors.
///
/// # Errors
///
/// Contract violations (wrong device, rank or size argument) are reported
/// before any allocation. An output with more elements than fit in `usize`
/// fails with [`GemsError::OutOfMemory`].
///
/// # Examples
///
/// ```
/// use gems_accel::{upsample_nearest2d, Gems};
///
/// let gems = Gems::default();
/// let x = gems.tensor([1, 1, 2, 2], vec![1, 2, 3, 4]).unwrap();
/// let y = upsample_nearest2d(&gems, &x, &[4, 4], Some(2.0), Some(2.0)).unwrap();
/// assert_eq!(&y.to_vec()[..4], &[1, 1, 2, 2]);
/// ```
pub fn upsample_nearest2d<T: Element>(
    gems: &Gems,
    input: &Tensor<T>,
    output_size: &[usize],
    scale_h: Option<f64>,
    scale_w: Option<f64>,
) -> Result<Tensor<T>> {
    log::debug!("GEMS UPSAMPLE NEAREST2D");
    let params = resize_params(gems, input, output_size, scale_h, scale_w)?;
    nearest::<T, NearestFloor>(gems, "nearest", input, params)
}

/// Nearest-neighbour upsampling sampling at pixel centres.
///
/// Source coordinates are `min(floor((o + 0.5) * r), in - 1)`; otherwise as
/// [`upsample_nearest2d`].
pub fn upsample_nearest_exact2d<T: Element>(
    gems: &Gems,
    input: &Tensor<T>,
    output_size: &[usize],
    scale_h: Option<f64>,
    scale_w: Option<f64>,
) -> Result<Tensor<T>> {
    log::debug!("GEMS UPSAMPLE NEAREST EXACT2D");
    let params = resize_params(gems, input, output_size, scale_h, scale_w)?;
    nearest::<T, NearestExact>(gems, "nearest_exact", input, params)
}

/// Bilinear upsampling of an `[N, C, IH, IW]` float tensor.
///
/// With `align_corners` the corner pixels of input and output are aligned and
/// the scale arguments are ignored; otherwise pixel centres are aligned.
pub fn upsample_bilinear2d<T: FloatElement>(
    gems: &Gems,
    input: &Tensor<T>,
    output_size: &[usize],
    align_corners: bool,
    scale_h: Option<f64>,
    scale_w: Option<f64>,
) -> Result<Tensor<T>> {
    log::debug!("GEMS UPSAMPLE BILINEAR2D");
    let mut params = resize_params(gems, input, output_size, scale_h, scale_w)?;
    let mode = if align_corners {
        let corner = |i: usize, o: usize| if o > 1 { (i - 1) as f32 / (o - 1) as f32 } else { 0.0 };
        params.rh = corner(params.ih, params.oh);
        params.rw = corner(params.iw, params.ow);
        "bilinear_align_corners"
    } else {
        "bilinear"
    };

    let mut out = gems.alloc::<T>(params.total())?;
    let src = input.as_slice();
    let key = (mode, params.out_shape(), [false, false]);
    tuned_launch(gems, &gems.tune_cache().resize, key, out.as_mut_slice(), 1, |cfg, pid, block| {
        bilinear_unit(pid, block, src, &params, align_corners, cfg.block_size)
    })?;
    Ok(gems.wrap(out, params.out_shape().to_vec()))
}
