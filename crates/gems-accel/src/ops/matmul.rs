//! Matrix multiply launchers.

use crate::allocator::Storage;
use crate::context::Gems;
use crate::dtype::NumElement;
use crate::error::{GemsError, Result};
use crate::index::{broadcast_shapes, StridedIndexer};
use crate::kernels::matmul::{matmul_unit, MatmulDims};
use crate::tensor::Tensor;

use super::{check_devices, tuned_launch};

fn launch_matmul<T, E>(gems: &Gems, a: &[T], b: &[T], dims: MatmulDims, epilogue: E) -> Result<Storage<T>>
where
    T: NumElement,
    E: Fn(usize, T) -> T + Sync,
{
    let mut out = gems.alloc::<T>(dims.batch * dims.m * dims.n)?;
    let key = [dims.batch, dims.m, dims.n, dims.k];
    tuned_launch(
        gems,
        &gems.tune_cache().matmul,
        key,
        out.as_mut_slice(),
        dims.n,
        |cfg, pid, block| matmul_unit(pid, block, a, b, dims, cfg.block_size, &epilogue),
    )?;
    Ok(out)
}

fn mm_dims<T: NumElement>(a: &Tensor<T>, b: &Tensor<T>) -> Result<MatmulDims> {
    match (a.shape(), b.shape()) {
        (&[m, k], &[k2, n]) if k == k2 => Ok(MatmulDims { batch: 1, m, n, k }),
        (sa, sb) => Err(GemsError::contract(format!(
            "mm expects [M, K] @ [K, N], got {sa:?} @ {sb:?}"
        ))),
    }
}

/// Matrix product `a @ b` of `[M, K]` and `[K, N]` matrices.
pub fn mm<T: NumElement>(gems: &Gems, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS MM");
    check_devices(gems, &[a, b])?;
    let dims = mm_dims(a, b)?;
    let out = launch_matmul(gems, a.as_slice(), b.as_slice(), dims, |_, acc| acc)?;
    Ok(gems.wrap(out, vec![dims.m, dims.n]))
}

/// Batched matrix product of `[B, M, K]` and `[B, K, N]` tensors.
pub fn bmm<T: NumElement>(gems: &Gems, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>> {
    log::debug!("GEMS BMM");
    check_devices(gems, &[a, b])?;
    let dims = match (a.shape(), b.shape()) {
        (&[batch, m, k], &[batch2, k2, n]) if batch == batch2 && k == k2 => MatmulDims { batch, m, n, k },
        (sa, sb) => {
            return Err(GemsError::contract(format!(
                "bmm expects [B, M, K] @ [B, K, N], got {sa:?} @ {sb:?}"
            )))
        }
    };
    let out = launch_matmul(gems, a.as_slice(), b.as_slice(), dims, |_, acc| acc)?;
    Ok(gems.wrap(out, vec![dims.batch, dims.m, dims.n]))
}

/// `beta * bias + alpha * (a @ b)`, with `bias` broadcastable to `[M, N]`.
///
/// When `beta` is zero the bias is not read, so NaN in it does not propagate.
pub fn addmm<T: NumElement>(
    gems: &Gems,
    bias: &Tensor<T>,
    a: &Tensor<T>,
    b: &Tensor<T>,
    beta: T,
    alpha: T,
) -> Result<Tensor<T>> {
    log::debug!("GEMS ADDMM");
    check_devices(gems, &[bias, a, b])?;
    let dims = mm_dims(a, b)?;
    let out_shape = [dims.m, dims.n];
    if broadcast_shapes(bias.shape(), &out_shape)? != out_shape {
        return Err(GemsError::contract(format!(
            "addmm bias {:?} does not broadcast to {out_shape:?}",
            bias.shape()
        )));
    }
    let bias_index = StridedIndexer::broadcast(bias.shape(), &out_shape);
    let bias = bias.as_slice();
    let out = launch_matmul(gems, a.as_slice(), b.as_slice(), dims, |idx, acc| {
        if beta == T::ZERO {
            alpha.wrapping_mul(acc)
        } else {
            beta.wrapping_mul(bias[bias_index.offset(idx)]).wrapping_add(alpha.wrapping_mul(acc))
        }
    })?;
    Ok(gems.wrap(out, out_shape.to_vec()))
}
