//! CubeCL device backend.
//!
//! Runs the resize, binary and reduction kernels on a CUDA or WGPU device.
//! Buffers are moved explicitly with [`to_device`] and [`to_cpu`]; every
//! `*_execute` function validates its arguments with the same contracts as
//! the host launchers before anything is allocated on the device.

pub mod kernels;
pub mod memory;
pub mod ops;
pub mod runtime;

pub use memory::{allocate, tensor_from_device, tensor_to_device, to_cpu, to_device};
pub use ops::{
    add_execute, amax_execute, amin_execute, div_execute, mul_execute, resize_tuner, sub_execute, sum_execute,
    upsample_nearest2d_execute,
};
pub use runtime::{CubeclRuntime, GpuBuffer, RuntimeContext};

#[cfg(feature = "cuda")]
pub use runtime::init_cuda_runtime;
#[cfg(feature = "wgpu")]
pub use runtime::init_wgpu_runtime;
