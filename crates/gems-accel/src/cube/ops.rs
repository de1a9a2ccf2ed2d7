//! Host-side launchers for the CubeCL kernels.
//!
//! Each launcher validates its buffers, picks the grid and enqueues the
//! kernel; reductions additionally read their partials back and finish on
//! the host.

use cubecl::prelude::*;

use crate::autotune::{Autotuner, ResizeKey, TuneSettings};
use crate::config::GemsConfig;
use crate::error::{GemsError, Result};
use crate::index::cdiv;
use crate::kernels::resize::{same_extent, CoordinateMap, NearestFloor};
use crate::launch::LaunchConfig;
use crate::ops::resize::plan;

use super::kernels::{
    add_kernel, div_kernel, mul_kernel, partial_max_kernel, partial_min_kernel, partial_sum_kernel, sub_kernel,
    upsample_nearest2d_kernel,
};
use super::memory::{allocate, to_cpu, to_device};
use super::runtime::{GpuBuffer, RuntimeContext};

/// Units per lane; a cube runs `lanes * WARP` units.
const WARP: usize = 32;
/// Threads per cube for one-element-per-thread kernels.
const THREADS_PER_BLOCK: u32 = 256;
/// Elements folded by one unit in the first reduction phase.
const REDUCE_BLOCK: usize = 1024;

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        GemsError::UnsupportedOperation(format!("{what} {value} exceeds the 32-bit device index range"))
    })
}

/// Resize autotuner for device launches, with candidates taken from `config`.
///
/// Device timings are not comparable with host ones, so the device keeps its
/// own cache instead of sharing [`TuneCache::resize`](crate::TuneCache).
pub fn resize_tuner(config: &GemsConfig) -> Autotuner<ResizeKey> {
    Autotuner::new(
        "cube_resize",
        LaunchConfig::cross(&config.block_sizes, &config.lanes),
        TuneSettings::from(config),
    )
}

fn index_table<P: CoordinateMap>(in_extent: usize, out_extent: usize, reciprocal: f32) -> Vec<u32> {
    if same_extent(in_extent, out_extent) {
        (0..out_extent as u32).collect()
    } else {
        (0..out_extent)
            .map(|o| P::source(o, in_extent, reciprocal) as u32)
            .collect()
    }
}

/// Nearest-neighbour upsampling of an `[N, C, IH, IW]` device buffer.
///
/// Same contract and coordinates as [`upsample_nearest2d`](crate::upsample_nearest2d).
/// The launch configuration is picked by `tuner`, synchronising after each
/// candidate so the timing covers execution, not just enqueueing.
pub fn upsample_nearest2d_execute<R, F>(
    input: &GpuBuffer<R>,
    output_size: &[usize],
    scale_h: Option<f64>,
    scale_w: Option<f64>,
    tuner: &Autotuner<ResizeKey>,
    runtime: &RuntimeContext<R>,
) -> Result<GpuBuffer<R>>
where
    R: Runtime,
    F: Float + CubeElement,
{
    log::debug!("GEMS UPSAMPLE NEAREST2D (cube {})", runtime.backend_name());
    let params = plan(input.shape(), output_size, scale_h, scale_w)?;
    to_u32(input.len(), "input length")?;
    let total = to_u32(params.total(), "output length")?;
    let flags = [
        same_extent(params.ih, params.oh),
        same_extent(params.iw, params.ow),
    ];

    let h_index = index_table::<NearestFloor>(params.ih, params.oh, params.rh);
    let w_index = index_table::<NearestFloor>(params.iw, params.ow, params.rw);
    let h_index = to_device(&h_index, vec![params.oh], runtime)?;
    let w_index = to_device(&w_index, vec![params.ow], runtime)?;
    let output = allocate::<R, F>(params.out_shape().to_vec(), runtime)?;

    let launch = |cfg: LaunchConfig| -> Result<()> {
        let block_size = to_u32(cfg.block_size, "block size")?;
        let units = to_u32(cfg.lanes.saturating_mul(WARP).min(cfg.block_size), "cube size")?;
        let cube_count = CubeCount::Static(to_u32(cdiv(params.total(), cfg.block_size), "cube count")?, 1, 1);
        let cube_dim = CubeDim::new(units, 1, 1);

        unsafe {
            upsample_nearest2d_kernel::launch_unchecked::<F, R>(
                runtime.client(),
                cube_count,
                cube_dim,
                ArrayArg::from_raw_parts::<F>(input.handle(), input.len(), 1),
                ArrayArg::from_raw_parts::<F>(output.handle(), output.len(), 1),
                ArrayArg::from_raw_parts::<u32>(h_index.handle(), h_index.len(), 1),
                ArrayArg::from_raw_parts::<u32>(w_index.handle(), w_index.len(), 1),
                ScalarArg::new(params.ih as u32),
                ScalarArg::new(params.iw as u32),
                ScalarArg::new(params.oh as u32),
                ScalarArg::new(params.ow as u32),
                ScalarArg::new(block_size),
            );
        }
        Ok(())
    };

    if total == 0 {
        return Ok(output);
    }
    let key = ("nearest", params.out_shape(), flags);
    let cfg = tuner.select(key, |cfg| {
        launch(cfg)?;
        runtime.sync();
        Ok(())
    })?;
    launch(cfg)?;
    Ok(output)
}

/// Grid for a one-thread-per-element kernel, `None` when there is nothing to do.
fn elementwise_grid<R: Runtime>(
    a: &GpuBuffer<R>,
    b: &GpuBuffer<R>,
    output: &GpuBuffer<R>,
) -> Result<Option<(CubeCount, CubeDim)>> {
    if a.shape() != b.shape() {
        return Err(GemsError::InvalidShape {
            expected: a.shape().to_vec(),
            actual: b.shape().to_vec(),
        });
    }
    if a.shape() != output.shape() {
        return Err(GemsError::InvalidShape {
            expected: a.shape().to_vec(),
            actual: output.shape().to_vec(),
        });
    }
    let len = to_u32(a.len(), "length")?;
    if len == 0 {
        return Ok(None);
    }
    Ok(Some((
        CubeCount::Static(len.div_ceil(THREADS_PER_BLOCK), 1, 1),
        CubeDim::new(THREADS_PER_BLOCK, 1, 1),
    )))
}

/// `output = a + alpha * b` over same-shape buffers.
pub fn add_execute<R: Runtime, F: Float + CubeElement>(
    a: &GpuBuffer<R>,
    b: &GpuBuffer<R>,
    alpha: F,
    output: &GpuBuffer<R>,
    runtime: &RuntimeContext<R>,
) -> Result<()> {
    log::debug!("GEMS ADD (cube)");
    let Some((cube_count, cube_dim)) = elementwise_grid(a, b, output)? else {
        return Ok(());
    };
    unsafe {
        add_kernel::launch_unchecked::<F, R>(
            runtime.client(),
            cube_count,
            cube_dim,
            ArrayArg::from_raw_parts::<F>(a.handle(), a.len(), 1),
            ArrayArg::from_raw_parts::<F>(b.handle(), b.len(), 1),
            ScalarArg::new(alpha),
            ArrayArg::from_raw_parts::<F>(output.handle(), output.len(), 1),
        );
    }
    Ok(())
}

/// `output = a - alpha * b` over same-shape buffers.
pub fn sub_execute<R: Runtime, F: Float + CubeElement>(
    a: &GpuBuffer<R>,
    b: &GpuBuffer<R>,
    alpha: F,
    output: &GpuBuffer<R>,
    runtime: &RuntimeContext<R>,
) -> Result<()> {
    log::debug!("GEMS SUB (cube)");
    let Some((cube_count, cube_dim)) = elementwise_grid(a, b, output)? else {
        return Ok(());
    };
    unsafe {
        sub_kernel::launch_unchecked::<F, R>(
            runtime.client(),
            cube_count,
            cube_dim,
            ArrayArg::from_raw_parts::<F>(a.handle(), a.len(), 1),
            ArrayArg::from_raw_parts::<F>(b.handle(), b.len(), 1),
            ScalarArg::new(alpha),
            ArrayArg::from_raw_parts::<F>(output.handle(), output.len(), 1),
        );
    }
    Ok(())
}

/// `output = a * b` over same-shape buffers.
pub fn mul_execute<R: Runtime, F: Float + CubeElement>(
    a: &GpuBuffer<R>,
    b: &GpuBuffer<R>,
    output: &GpuBuffer<R>,
    runtime: &RuntimeContext<R>,
) -> Result<()> {
    log::debug!("GEMS MUL (cube)");
    let Some((cube_count, cube_dim)) = elementwise_grid(a, b, output)? else {
        return Ok(());
    };
    unsafe {
        mul_kernel::launch_unchecked::<F, R>(
            runtime.client(),
            cube_count,
            cube_dim,
            ArrayArg::from_raw_parts::<F>(a.handle(), a.len(), 1),
            ArrayArg::from_raw_parts::<F>(b.handle(), b.len(), 1),
            ArrayArg::from_raw_parts::<F>(output.handle(), output.len(), 1),
        );
    }
    Ok(())
}

/// `output = a / b` over same-shape buffers.
pub fn div_execute<R: Runtime, F: Float + CubeElement>(
    a: &GpuBuffer<R>,
    b: &GpuBuffer<R>,
    output: &GpuBuffer<R>,
    runtime: &RuntimeContext<R>,
) -> Result<()> {
    log::debug!("GEMS DIV (cube)");
    let Some((cube_count, cube_dim)) = elementwise_grid(a, b, output)? else {
        return Ok(());
    };
    unsafe {
        div_kernel::launch_unchecked::<F, R>(
            runtime.client(),
            cube_count,
            cube_dim,
            ArrayArg::from_raw_parts::<F>(a.handle(), a.len(), 1),
            ArrayArg::from_raw_parts::<F>(b.handle(), b.len(), 1),
            ArrayArg::from_raw_parts::<F>(output.handle(), output.len(), 1),
        );
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Fold {
    Sum,
    Min,
    Max,
}

/// First reduction phase: one partial per `REDUCE_BLOCK` elements, read back.
fn first_phase<R, F>(input: &GpuBuffer<R>, fold: Fold, runtime: &RuntimeContext<R>) -> Result<Vec<F>>
where
    R: Runtime,
    F: Float + CubeElement + bytemuck::Pod,
{
    to_u32(input.len(), "length")?;
    let slots = cdiv(input.len(), REDUCE_BLOCK);
    let partials = allocate::<R, F>(vec![slots], runtime)?;

    let units = to_u32(slots, "partial count")?;
    let cube_count = CubeCount::Static(units.div_ceil(THREADS_PER_BLOCK), 1, 1);
    let cube_dim = CubeDim::new(THREADS_PER_BLOCK, 1, 1);
    let block = REDUCE_BLOCK as u32;
    let client = runtime.client();

    unsafe {
        let src = ArrayArg::from_raw_parts::<F>(input.handle(), input.len(), 1);
        let dst = ArrayArg::from_raw_parts::<F>(partials.handle(), slots, 1);
        match fold {
            Fold::Sum => partial_sum_kernel::launch_unchecked::<F, R>(
                client,
                cube_count,
                cube_dim,
                src,
                dst,
                ScalarArg::new(block),
            ),
            Fold::Min => partial_min_kernel::launch_unchecked::<F, R>(
                client,
                cube_count,
                cube_dim,
                src,
                dst,
                ScalarArg::new(block),
            ),
            Fold::Max => partial_max_kernel::launch_unchecked::<F, R>(
                client,
                cube_count,
                cube_dim,
                src,
                dst,
                ScalarArg::new(block),
            ),
        }
    }
    to_cpu(&partials, runtime)
}

/// Sum of every element; zero for an empty buffer.
pub fn sum_execute<R, F>(input: &GpuBuffer<R>, runtime: &RuntimeContext<R>) -> Result<F>
where
    R: Runtime,
    F: Float + CubeElement + bytemuck::Pod,
{
    log::debug!("GEMS SUM (cube)");
    if input.is_empty() {
        return Ok(F::new(0.0));
    }
    let partials: Vec<F> = first_phase(input, Fold::Sum, runtime)?;
    Ok(partials.into_iter().fold(F::new(0.0), |acc, v| acc + v))
}

fn extremum<R, F>(input: &GpuBuffer<R>, fold: Fold, name: &str, runtime: &RuntimeContext<R>) -> Result<F>
where
    R: Runtime,
    F: Float + CubeElement + bytemuck::Pod,
{
    if input.is_empty() {
        return Err(GemsError::contract(format!(
            "{name}(): expected a non-empty input since it has no identity"
        )));
    }
    let partials: Vec<F> = first_phase(input, fold, runtime)?;
    let mut best = partials[0];
    for &v in &partials[1..] {
        let better = match fold {
            Fold::Min => v < best,
            _ => v > best,
        };
        if better {
            best = v;
        }
    }
    Ok(best)
}

/// Smallest element.
///
/// NaN ordering follows the device's float comparison, so unlike
/// [`amin`](crate::amin) a NaN is not guaranteed to win.
pub fn amin_execute<R, F>(input: &GpuBuffer<R>, runtime: &RuntimeContext<R>) -> Result<F>
where
    R: Runtime,
    F: Float + CubeElement + bytemuck::Pod,
{
    log::debug!("GEMS AMIN (cube)");
    extremum(input, Fold::Min, "amin", runtime)
}

/// Largest element; NaN ordering as for [`amin_execute`].
pub fn amax_execute<R, F>(input: &GpuBuffer<R>, runtime: &RuntimeContext<R>) -> Result<F>
where
    R: Runtime,
    F: Float + CubeElement + bytemuck::Pod,
{
    log::debug!("GEMS AMAX (cube)");
    extremum(input, Fold::Max, "amax", runtime)
}
