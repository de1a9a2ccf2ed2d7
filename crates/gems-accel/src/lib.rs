//! Accelerated tensor operator kernels with autotuned launches.
//!
//! Each operator is a data-parallel kernel with an explicit work partition:
//! the output is split into blocks, one per execution unit, and every unit
//! decomposes its flat indices into coordinates, maps them back to the
//! sources and writes its own disjoint block. Launch configurations
//! (`block_size`, `lanes`) are chosen per problem shape by measuring every
//! candidate once and caching the winner.
//!
//! The always-available accelerator runs units on rayon lane pools. With the
//! `cuda` or `wgpu` feature the [`cube`] module runs the same kernels through
//! CubeCL.
//!
//! # Feature Flags
//!
//! - `cuda`: CubeCL CUDA backend (NVIDIA GPUs)
//! - `wgpu`: CubeCL WGPU backend (Vulkan/Metal/DirectX12)
//!
//! # Examples
//!
//! ```
//! use gems_accel::{upsample_nearest2d, Gems, GemsConfig};
//!
//! let gems = Gems::new(GemsConfig::default());
//! let x = gems.tensor([1, 1, 4, 4], (0..16).map(|v| v as f32).collect()).unwrap();
//! let y = upsample_nearest2d(&gems, &x, &[2, 2], None, None).unwrap();
//! assert_eq!(y.to_vec(), vec![0.0, 2.0, 8.0, 10.0]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod allocator;
pub mod autotune;
pub mod config;
pub mod context;
pub mod device;
pub mod dtype;
pub mod error;
pub mod index;
pub mod kernels;
pub mod launch;
pub mod ops;
pub mod registry;
pub mod tensor;

#[cfg(feature = "gpu")]
pub mod cube;

pub use allocator::MemoryLedger;
pub use autotune::{Autotuner, TuneCache, TuneSettings};
pub use config::GemsConfig;
pub use context::Gems;
pub use device::{Backend, Device};
pub use dtype::{DType, Element, FloatElement, IntegerElement, NumElement, SignedElement};
pub use error::{GemsError, Result};
pub use kernels::elementwise::GeluApproximate;
pub use launch::LaunchConfig;
pub use registry::{enable, DispatchKey, DispatchTable, GemsScope, Kernel, Op, OperatorLibrary};
pub use tensor::Tensor;

pub use ops::matmul::{addmm, bmm, mm};
pub use ops::normalization::{layer_norm, softmax};
pub use ops::pointwise::{
    abs, add, add_scalar, bitwise_not, cos, div, exp, exp_out, gelu, isinf, isnan, mul, mul_scalar, neg,
    pow_scalar, pow_tensor_scalar, pow_tensor_tensor, reciprocal, relu, rsqrt, sigmoid, silu, sin, sub, tanh,
    triu,
};
pub use ops::random::native_dropout;
pub use ops::reduction::{amax, amin, cumsum, mean, sum};
pub use ops::resize::{upsample_bilinear2d, upsample_nearest2d, upsample_nearest_exact2d};
