//! Batched matrix multiply kernel body.

use crate::dtype::NumElement;

/// Extents of a batched product `[B, M, K] @ [B, K, N] -> [B, M, N]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatmulDims {
    /// Batch count.
    pub batch: usize,
    /// Rows of the left operand and of the output.
    pub m: usize,
    /// Columns of the right operand and of the output.
    pub n: usize,
    /// Contracted extent.
    pub k: usize,
}

/// One tile of output rows.
///
/// Output rows are numbered across batches (`batch * m + row`); the unit owns
/// rows `[pid * tile_rows, pid * tile_rows + dst.len() / n)`. `epilogue`
/// receives the flat output index and the accumulated dot product.
pub fn matmul_unit<T, E>(
    pid: usize,
    dst: &mut [T],
    a: &[T],
    b: &[T],
    dims: MatmulDims,
    tile_rows: usize,
    epilogue: E,
) where
    T: NumElement,
    E: Fn(usize, T) -> T,
{
    let MatmulDims { m, n, k, .. } = dims;
    let first_row = pid * tile_rows;
    for (r, out) in dst.chunks_mut(n).enumerate() {
        let row = first_row + r;
        let batch = row / m;
        let lhs = &a[row * k..][..k];
        out.fill(T::ZERO);
        for (p, &av) in lhs.iter().enumerate() {
            let rhs = &b[(batch * k + p) * n..][..n];
            for (o, &bv) in out.iter_mut().zip(rhs) {
                *o = o.wrapping_add(av.wrapping_mul(bv));
            }
        }
        for (j, o) in out.iter_mut().enumerate() {
            *o = epilogue(row * n + j, *o);
        }
    }
}
